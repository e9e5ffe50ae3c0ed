use std::thread;
use std::time::Duration;

use log::warn;
use vet_core::error::AppError;

use crate::llm::Llm;

pub mod prompts;

/// Fixed prefix the generation model is instructed to put on emergency answers.
pub const EMERGENCY_MARKER: &str = "⚠️ EMERGENCY:";

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Build the prompt from the question and retrieved context, and delegate to
/// the generation service. The model output is returned as-is; no
/// post-processing or evaluation happens here.
///
/// A transient failure is retried once after a short backoff; everything else
/// surfaces promptly as a typed error for the caller to handle.
pub fn generate_answer(
    llm: &dyn Llm,
    model: &str,
    question: &str,
    context_docs: &[String],
) -> Result<String, AppError> {
    let context = prompts::context_block(context_docs);
    let prompt = prompts::assistant_prompt(question, &context);

    match llm.generate(model, &prompt) {
        Ok(text) => Ok(text),
        Err(e) if e.retryable => {
            warn!("generation failed, retrying once: {e}");
            thread::sleep(RETRY_BACKOFF);
            llm.generate(model, &prompt)
        }
        Err(e) => Err(e),
    }
}
