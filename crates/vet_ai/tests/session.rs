use pretty_assertions::assert_eq;
use vet_ai::answer::EMERGENCY_MARKER;
use vet_ai::classify::{ClassifierConfig, EmergencyClassifier};
use vet_ai::embeddings::Embedder;
use vet_ai::index::KnowledgeIndex;
use vet_ai::llm::Llm;
use vet_ai::retrieve::query_index;
use vet_ai::session::{ChatSession, SessionConfig};
use vet_core::error::AppError;
use vet_core::knowledge::KnowledgeEntry;

/// Embeds text as [count('a'), count('b')].
struct CountABEmbedder;

impl Embedder for CountABEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let mut a = 0u32;
        let mut b = 0u32;
        for ch in input.chars() {
            if ch == 'a' {
                a += 1;
            } else if ch == 'b' {
                b += 1;
            }
        }
        Ok(vec![a as f32, b as f32])
    }
}

struct MockLlm {
    out: String,
}

impl Llm for MockLlm {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, AppError> {
        Ok(self.out.clone())
    }
}

struct UnreachableLlm;

impl Llm for UnreachableLlm {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, AppError> {
        Err(
            AppError::new("AI_GENERATION_FAILED", "Failed to call generation endpoint")
                .with_details("connection refused"),
        )
    }
}

fn entry(id: &str, question: &str, answer: &str, urgency: &str, species: &str) -> KnowledgeEntry {
    KnowledgeEntry {
        id: id.to_string(),
        question: question.to_string(),
        answer: answer.to_string(),
        urgency: urgency.to_string(),
        species: species.to_string(),
        category: "general".to_string(),
    }
}

fn sample_entries() -> Vec<KnowledgeEntry> {
    vec![
        entry("1", "aaaa", "aaaa", "low", "cat"),
        entry("2", "aabb", "aabb", "medium", "dog"),
        entry("3", "abbb", "abbb", "high", "cat"),
        entry("4", "bbbb", "bbbb", "low", "dog"),
    ]
}

fn session_config() -> SessionConfig {
    SessionConfig {
        classifier: ClassifierConfig {
            // Exemplar embeds to [0, 4]; keyword list stays stock.
            exemplars: vec!["bbbb".to_string()],
            ..ClassifierConfig::default()
        },
        ..SessionConfig::default()
    }
}

fn build_session(dir: &std::path::Path, llm: Box<dyn Llm>) -> ChatSession {
    let index = KnowledgeIndex::open(dir.to_path_buf());
    let config = session_config();
    index
        .ensure_populated(
            &sample_entries(),
            &CountABEmbedder,
            &config.embedding_model,
            "2026-08-23T00:00:00Z",
        )
        .expect("populate");
    let classifier =
        EmergencyClassifier::new(config.classifier.clone(), &CountABEmbedder, &config.embedding_model)
            .expect("classifier");
    ChatSession::new(index, classifier, Box::new(CountABEmbedder), llm, config)
}

#[test]
fn keyword_question_is_flagged_as_emergency() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = build_session(
        dir.path(),
        Box::new(MockLlm {
            out: format!("{EMERGENCY_MARKER} Contact your veterinarian immediately."),
        }),
    );

    let output = session.chat("My dog ate chocolate").expect("chat");
    assert!(output.is_emergency);
    assert!(output.answer.starts_with(EMERGENCY_MARKER));
    assert!(output.generation_error.is_none());
}

#[test]
fn routine_question_gets_three_ordered_sources_and_no_marker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = build_session(
        dir.path(),
        Box::new(MockLlm {
            out: "Adult cats are typically fed twice a day. Consult a veterinarian if unsure."
                .to_string(),
        }),
    );

    // One 'a', zero 'b': no keyword, orthogonal to the exemplar.
    let output = session.chat("How often should I feed my cat?").expect("chat");
    assert!(!output.is_emergency);
    assert!(!output.answer.starts_with(EMERGENCY_MARKER));
    assert_eq!(output.sources.len(), 3);

    // The most 'a'-heavy entries rank first.
    assert_eq!(output.sources[0].question, "aaaa");
    assert_eq!(output.sources[0].urgency, "low");
    assert_eq!(output.sources[0].species, "cat");
    assert_eq!(output.sources[1].question, "aabb");
    assert_eq!(output.sources[2].question, "abbb");
}

#[test]
fn sources_mirror_retrieval_order_one_to_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = build_session(dir.path(), Box::new(MockLlm { out: "ok".to_string() }));

    let question = "aabb please";
    let output = session.chat(question).expect("chat");

    let index = KnowledgeIndex::open(dir.path().to_path_buf());
    let hits = query_index(&index, &CountABEmbedder, question, session.config().top_k)
        .expect("query");

    assert_eq!(output.sources.len(), hits.len());
    for (source, hit) in output.sources.iter().zip(hits.iter()) {
        assert_eq!(source.question, hit.meta.question);
        assert_eq!(source.urgency, hit.meta.urgency);
        assert_eq!(source.species, hit.meta.species);
    }
}

#[test]
fn generation_failure_degrades_without_losing_flag_or_sources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = build_session(dir.path(), Box::new(UnreachableLlm));

    let output = session.chat("My dog ate chocolate").expect("chat");
    assert!(output.is_emergency);
    assert_eq!(output.sources.len(), 3);
    assert!(output.answer.contains("Unable to generate an answer"));

    let err = output.generation_error.expect("typed error");
    assert_eq!(err.code, "AI_GENERATION_FAILED");
}

#[test]
fn blank_questions_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = build_session(dir.path(), Box::new(MockLlm { out: "ok".to_string() }));

    let err = session.chat("   ").expect_err("should fail");
    assert_eq!(err.code, "AI_CHAT_INVALID");
}

#[test]
fn repeated_calls_are_independent_and_identical() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = build_session(dir.path(), Box::new(MockLlm { out: "ok".to_string() }));

    let first = session.chat("aabb").expect("chat");
    let second = session.chat("aabb").expect("chat");
    assert_eq!(first.answer, second.answer);
    assert_eq!(first.is_emergency, second.is_emergency);
    assert_eq!(first.sources, second.sources);
}
