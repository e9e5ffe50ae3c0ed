use vet_core::error::AppError;

/// Boundary for the text-generation service: single-turn prompt in,
/// generated text out, synchronously.
pub trait Llm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError>;
}

pub mod ollama_llm;
