use serde::{Deserialize, Serialize};
use vet_core::error::AppError;

use crate::embeddings::Embedder;
use crate::retrieve::similarity;

fn default_keywords() -> Vec<String> {
    [
        "bleeding",
        "seizure",
        "chocolate",
        "collapsed",
        "not breathing",
        "choking",
        "vomiting",
        "diarrhea",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exemplars() -> Vec<String> {
    [
        "My dog ate chocolate",
        "My cat is vomiting and has diarrhea",
        "My pet is having a seizure",
        "My dog is choking",
        "My cat collapsed and is not breathing",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_threshold() -> f32 {
    0.7
}

/// Configuration for emergency detection. The keyword list, exemplar phrases,
/// and similarity threshold are tunables, not calibrated constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "default_exemplars")]
    pub exemplars: Vec<String>,
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            exemplars: default_exemplars(),
            similarity_threshold: default_threshold(),
        }
    }
}

struct Exemplar {
    vector: Vec<f32>,
    norm: f32,
}

/// Two-stage emergency detector: a cheap case-insensitive keyword match,
/// falling back to embedding similarity against a fixed exemplar set.
///
/// The OR-combination deliberately over-flags; an unnecessary urgency warning
/// costs far less than a missed emergency.
pub struct EmergencyClassifier {
    keywords: Vec<String>,
    exemplars: Vec<Exemplar>,
    threshold: f32,
}

impl EmergencyClassifier {
    /// Build the classifier, embedding every exemplar phrase once up front.
    pub fn new(
        config: ClassifierConfig,
        embedder: &dyn Embedder,
        model: &str,
    ) -> Result<Self, AppError> {
        let mut exemplars = Vec::with_capacity(config.exemplars.len());
        for phrase in &config.exemplars {
            let vector = embedder.embed(model, phrase)?;
            let norm = similarity::l2_norm(&vector);
            if norm == 0.0 {
                return Err(AppError::new(
                    "AI_EMBEDDINGS_FAILED",
                    "Exemplar embedding norm is zero",
                )
                .with_details(format!("phrase={phrase}")));
            }
            exemplars.push(Exemplar { vector, norm });
        }

        Ok(Self {
            keywords: config
                .keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            exemplars,
            threshold: config.similarity_threshold,
        })
    }

    /// Stage 1: any configured keyword appearing as a case-insensitive
    /// substring marks the question as an emergency without an embedding call.
    pub fn matches_keyword(&self, question: &str) -> bool {
        let lower = question.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Classify a question. Keyword hits short-circuit; otherwise the question
    /// is embedded and compared against every exemplar, flagging when the
    /// maximum similarity reaches the threshold.
    pub fn is_emergency(
        &self,
        embedder: &dyn Embedder,
        model: &str,
        question: &str,
    ) -> Result<bool, AppError> {
        if self.matches_keyword(question) {
            return Ok(true);
        }
        if self.exemplars.is_empty() {
            return Ok(false);
        }

        let qv = embedder.embed(model, question)?;
        let qnorm = similarity::l2_norm(&qv);
        if qnorm == 0.0 {
            return Ok(false);
        }

        let mut max_score = f32::MIN;
        for ex in &self.exemplars {
            if ex.vector.len() != qv.len() {
                return Err(AppError::new(
                    "AI_EMBEDDINGS_FAILED",
                    "Exemplar embedding dims do not match question embedding",
                )
                .with_details(format!(
                    "exemplar_dims={}; question_dims={}",
                    ex.vector.len(),
                    qv.len()
                )));
            }
            let score = similarity::cosine_similarity(&qv, &ex.vector, qnorm, ex.norm);
            if score > max_score {
                max_score = score;
            }
        }

        Ok(max_score >= self.threshold)
    }
}
