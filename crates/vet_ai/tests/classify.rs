use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use vet_ai::classify::{ClassifierConfig, EmergencyClassifier};
use vet_ai::embeddings::Embedder;
use vet_core::error::AppError;

/// Embeds text as [count('x'), count('y')] and counts every call.
struct CountXYEmbedder {
    calls: AtomicUsize,
}

impl CountXYEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountXYEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut x = 0u32;
        let mut y = 0u32;
        for ch in input.chars() {
            if ch == 'x' {
                x += 1;
            } else if ch == 'y' {
                y += 1;
            }
        }
        Ok(vec![x as f32, y as f32])
    }
}

fn config_with_exemplars(exemplars: &[&str], threshold: f32) -> ClassifierConfig {
    ClassifierConfig {
        exemplars: exemplars.iter().map(|s| s.to_string()).collect(),
        similarity_threshold: threshold,
        ..ClassifierConfig::default()
    }
}

#[test]
fn keyword_match_short_circuits_without_embedding() {
    let embedder = CountXYEmbedder::new();
    let config = config_with_exemplars(&["xxxx"], 0.7);
    let classifier = EmergencyClassifier::new(config, &embedder, "mock").expect("build");
    let after_setup = embedder.call_count();

    // Scenario: "My dog ate chocolate" trips the "chocolate" keyword.
    let flagged = classifier
        .is_emergency(&embedder, "mock", "My dog ate chocolate")
        .expect("classify");
    assert!(flagged);
    assert_eq!(embedder.call_count(), after_setup);
}

#[test]
fn keyword_match_is_case_insensitive_substring() {
    let embedder = CountXYEmbedder::new();
    let classifier =
        EmergencyClassifier::new(config_with_exemplars(&[], 0.7), &embedder, "mock")
            .expect("build");

    assert!(classifier.matches_keyword("HELP my cat is BLEEDING badly"));
    assert!(classifier.matches_keyword("puppy Not Breathing"));
    assert!(!classifier.matches_keyword("How often should I feed my cat?"));
}

#[test]
fn high_exemplar_similarity_flags_emergency() {
    let embedder = CountXYEmbedder::new();
    // Exemplar embeds to [4, 0]; a question full of 'x' points the same way.
    let classifier =
        EmergencyClassifier::new(config_with_exemplars(&["xxxx"], 0.7), &embedder, "mock")
            .expect("build");

    let flagged = classifier
        .is_emergency(&embedder, "mock", "xx something urgent xx")
        .expect("classify");
    assert!(flagged);
}

#[test]
fn low_exemplar_similarity_is_not_an_emergency() {
    let embedder = CountXYEmbedder::new();
    // Question embeds to [0, n]: orthogonal to the exemplar direction.
    let classifier =
        EmergencyClassifier::new(config_with_exemplars(&["xxxx"], 0.7), &embedder, "mock")
            .expect("build");

    let flagged = classifier
        .is_emergency(&embedder, "mock", "yyyy routine grooming yyyy")
        .expect("classify");
    assert!(!flagged);
}

#[test]
fn zero_norm_question_embedding_is_not_an_emergency() {
    let embedder = CountXYEmbedder::new();
    let classifier =
        EmergencyClassifier::new(config_with_exemplars(&["xxxx"], 0.7), &embedder, "mock")
            .expect("build");

    // Scenario: "How often should I feed my cat?" has no keyword and no
    // x/y mass, so the similarity stage cannot reach the threshold.
    let flagged = classifier
        .is_emergency(&embedder, "mock", "How often should I feed my cat?")
        .expect("classify");
    assert!(!flagged);
}

#[test]
fn threshold_is_configuration() {
    let embedder = CountXYEmbedder::new();
    // cos([1,1], [1,0]) ~= 0.707: above 0.6, below 0.8.
    let lenient =
        EmergencyClassifier::new(config_with_exemplars(&["xxxx"], 0.6), &embedder, "mock")
            .expect("build");
    let strict =
        EmergencyClassifier::new(config_with_exemplars(&["xxxx"], 0.8), &embedder, "mock")
            .expect("build");

    assert!(lenient.is_emergency(&embedder, "mock", "x then y").expect("classify"));
    assert!(!strict.is_emergency(&embedder, "mock", "x then y").expect("classify"));
}

#[test]
fn default_config_carries_the_stock_lists() {
    let config = ClassifierConfig::default();
    assert_eq!(config.keywords.len(), 8);
    assert!(config.keywords.iter().any(|k| k == "chocolate"));
    assert_eq!(config.exemplars.len(), 5);
    assert!((config.similarity_threshold - 0.7).abs() < f32::EPSILON);
}
