//! Response generation with the finish-reason safety gate

use std::sync::Arc;

use crate::providers::{Generation, GenerationRequest, LlmProvider};

/// Shown when the model's output was suppressed by the safety filters
pub const SAFETY_WARNING: &str =
    "I'm sorry, but I can't provide a response to that because it was blocked by the content safety filters.";

/// Shown when the generation call itself failed
pub const GENERATION_FALLBACK: &str =
    "I apologize, but I'm experiencing technical difficulties. Please try again later.";

/// Shown when no context was found and generation was skipped
pub const NO_INFORMATION: &str = "Sorry, I don't have that information.";

/// User-facing outcome of one generation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Trimmed model text
    Answer(String),
    /// Output suppressed by policy
    SafetyBlocked,
    /// Nothing to answer from
    NoInformation,
    /// The remote call failed
    Failed(String),
}

impl Reply {
    /// Text to display
    pub fn text(&self) -> &str {
        match self {
            Reply::Answer(text) => text,
            Reply::SafetyBlocked => SAFETY_WARNING,
            Reply::NoInformation => NO_INFORMATION,
            Reply::Failed(_) => GENERATION_FALLBACK,
        }
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, Reply::Answer(_))
    }

    /// Error description for failed replies
    pub fn error(&self) -> Option<&str> {
        match self {
            Reply::Failed(reason) => Some(reason),
            Reply::SafetyBlocked => Some("Response blocked by safety filters"),
            _ => None,
        }
    }
}

/// Apply the safety gate to a raw generation
pub fn gate(generation: Generation) -> Reply {
    if generation.is_safety_block() {
        tracing::warn!(
            "Response blocked by safety filters (finish reason: {:?}, prompt block: {:?})",
            generation.finish_reason,
            generation.prompt_block_reason
        );
        return Reply::SafetyBlocked;
    }

    let text = generation.text.trim();
    if text.is_empty() {
        Reply::Failed("Model returned empty response".to_string())
    } else {
        Reply::Answer(text.to_string())
    }
}

/// Sends requests to the LLM and converts every outcome into a `Reply`
#[derive(Clone)]
pub struct Responder {
    llm: Arc<dyn LlmProvider>,
}

impl Responder {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Generate for a full request; never returns an error
    pub async fn respond(&self, request: &GenerationRequest) -> Reply {
        match self.llm.generate(request).await {
            Ok(generation) => gate(generation),
            Err(e) => {
                tracing::error!("Generation via {} failed: {}", self.llm.name(), e);
                Reply::Failed(e.to_string())
            }
        }
    }

    /// Generate for a single assembled prompt
    pub async fn respond_to_prompt(&self, prompt: &str) -> Reply {
        self.respond(&GenerationRequest::from_prompt(prompt)).await
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }
}
