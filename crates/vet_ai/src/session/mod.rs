use log::warn;
use serde::{Deserialize, Serialize};
use vet_core::error::AppError;

use crate::answer::generate_answer;
use crate::classify::{ClassifierConfig, EmergencyClassifier};
use crate::embeddings::Embedder;
use crate::index::KnowledgeIndex;
use crate::llm::Llm;
use crate::retrieve::query_index;

fn default_top_k() -> u32 {
    3
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_generation_model() -> String {
    "llama3.2:3b".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            embedding_model: default_embedding_model(),
            generation_model: default_generation_model(),
            classifier: ClassifierConfig::default(),
        }
    }
}

/// One cited knowledge entry, in retrieval order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSource {
    pub question: String,
    pub urgency: String,
    pub species: String,
}

/// The structured result of one chat call. Owned by the caller; the pipeline
/// retains nothing.
///
/// When generation fails, `answer` carries a diagnostic message and
/// `generation_error` the typed error, while `is_emergency` and `sources`
/// still reflect the stages that succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutput {
    pub question: String,
    pub answer: String,
    pub is_emergency: bool,
    pub sources: Vec<ChatSource>,
    pub generation_error: Option<AppError>,
}

/// Orchestrates one question at a time: classify, retrieve, generate, assemble.
///
/// The session is the explicitly constructed context object that owns the
/// index handle, the classifier, and the service boundaries. It holds no
/// per-question state; every `chat` call is independent.
pub struct ChatSession {
    index: KnowledgeIndex,
    classifier: EmergencyClassifier,
    embedder: Box<dyn Embedder>,
    llm: Box<dyn Llm>,
    config: SessionConfig,
}

impl ChatSession {
    pub fn new(
        index: KnowledgeIndex,
        classifier: EmergencyClassifier,
        embedder: Box<dyn Embedder>,
        llm: Box<dyn Llm>,
        config: SessionConfig,
    ) -> Self {
        Self {
            index,
            classifier,
            embedder,
            llm,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Answer one question end to end.
    ///
    /// Classification and retrieval failures propagate as errors. A generation
    /// failure degrades into a diagnostic answer instead, so one unreachable
    /// model call never loses the emergency flag or the citations.
    pub fn chat(&self, question: &str) -> Result<ChatOutput, AppError> {
        let q = question.trim();
        if q.is_empty() {
            return Err(AppError::new("AI_CHAT_INVALID", "Question must not be empty"));
        }

        let is_emergency = self.classifier.is_emergency(
            self.embedder.as_ref(),
            &self.config.embedding_model,
            q,
        )?;

        let hits = query_index(&self.index, self.embedder.as_ref(), q, self.config.top_k)?;
        let context_docs: Vec<String> = hits.iter().map(|h| h.text.clone()).collect();

        let (answer, generation_error) = match generate_answer(
            self.llm.as_ref(),
            &self.config.generation_model,
            q,
            &context_docs,
        ) {
            Ok(text) => (text, None),
            Err(e) => {
                warn!("answer generation degraded: {e}");
                (format!("Unable to generate an answer: {}", e.message), Some(e))
            }
        };

        let sources = hits
            .iter()
            .map(|h| ChatSource {
                question: h.meta.question.clone(),
                urgency: h.meta.urgency.clone(),
                species: h.meta.species.clone(),
            })
            .collect();

        Ok(ChatOutput {
            question: q.to_string(),
            answer,
            is_emergency,
            sources,
            generation_error,
        })
    }
}
