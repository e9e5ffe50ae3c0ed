use vet_core::error::AppError;

/// Boundary for the embedding service: text in, fixed-dimension vector out.
///
/// Implementations must never fabricate a zero vector on failure; errors are
/// propagated so callers can decide what a missing embedding means.
pub trait Embedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;

    /// Embed a batch of texts. The default calls `embed` per text; a remote
    /// implementation may override this with a bulk endpoint.
    fn embed_batch(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        inputs.iter().map(|text| self.embed(model, text)).collect()
    }
}

pub mod ollama_embed;
