//! Prompt assembly and response generation

mod prompt;
mod responder;

pub use prompt::PromptBuilder;
pub use responder::{gate, Reply, Responder, GENERATION_FALLBACK, NO_INFORMATION, SAFETY_WARNING};
