//! Prompt screening: ask the generation model to classify user input as
//! SAFE or UNSAFE before it is answered.

use serde::Serialize;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::LlmProvider;

/// Shown when screening rejects the user's message
pub const SCREENING_BLOCKED: &str =
    "I'm sorry, but your message was flagged by our safety filters. Please rephrase your question and try again.";

/// Classifier verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Safe,
    Unsafe,
    /// Anything other than the two expected labels
    Unrecognized,
}

impl Verdict {
    pub fn parse(output: &str) -> Self {
        match output.trim().trim_end_matches('.').to_uppercase().as_str() {
            "SAFE" => Verdict::Safe,
            "UNSAFE" => Verdict::Unsafe,
            _ => Verdict::Unrecognized,
        }
    }
}

/// Metrics describing one screening run
#[derive(Debug, Clone, Serialize)]
pub struct ValidationMetrics {
    pub is_safe: bool,
    pub prompt_length: usize,
    pub word_count: usize,
    pub checked_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Screens prompts with the generation model
#[derive(Clone)]
pub struct SafetyValidator {
    llm: Arc<dyn LlmProvider>,
}

impl SafetyValidator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Whether the prompt may be processed
    ///
    /// Empty input is unsafe without a model call. Unexpected classifier
    /// output is treated as unsafe. A failed model call is an error.
    pub async fn validate_prompt_safety(&self, prompt: &str) -> Result<bool> {
        if prompt.trim().is_empty() {
            tracing::warn!("Empty prompt received for safety validation");
            return Ok(false);
        }

        let generation = self
            .llm
            .generate_text(&PromptBuilder::build_screening_prompt(prompt))
            .await
            .map_err(|e| Error::SafetyValidation(e.to_string()))?;

        if generation.is_safety_block() {
            tracing::warn!("Screening request itself was blocked by safety filters");
            return Ok(false);
        }

        match Verdict::parse(&generation.text) {
            Verdict::Safe => {
                tracing::info!("Prompt classified as SAFE: {}", preview(prompt));
                Ok(true)
            }
            Verdict::Unsafe => {
                tracing::warn!("Prompt classified as UNSAFE: {}", preview(prompt));
                Ok(false)
            }
            Verdict::Unrecognized => {
                tracing::error!(
                    "Unexpected safety classification: '{}'",
                    generation.text.trim()
                );
                Ok(false)
            }
        }
    }

    /// Screening result plus simple prompt statistics
    pub async fn validation_metrics(&self, prompt: &str) -> ValidationMetrics {
        let (is_safe, error) = match self.validate_prompt_safety(prompt).await {
            Ok(is_safe) => (is_safe, None),
            Err(e) => (false, Some(e.to_string())),
        };

        ValidationMetrics {
            is_safe,
            prompt_length: prompt.chars().count(),
            word_count: prompt.split_whitespace().count(),
            checked_at: chrono::Utc::now(),
            error,
        }
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.llm.health_check().await
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::{FinishReason, Generation};
    use crate::testing::FakeLlm;

    fn validator_with(llm: &Arc<FakeLlm>) -> SafetyValidator {
        SafetyValidator::new(llm.clone())
    }

    #[tokio::test]
    async fn test_safe_prompt() {
        let llm = Arc::new(FakeLlm::new());
        llm.push_text("SAFE");
        let validator = validator_with(&llm);

        assert!(validator
            .validate_prompt_safety("How do I get a snow removal permit?")
            .await
            .unwrap());
        assert_eq!(llm.calls(), 1);
        assert!(llm.prompts()[0].contains("How do I get a snow removal permit?"));
    }

    #[tokio::test]
    async fn test_unsafe_prompt() {
        let llm = Arc::new(FakeLlm::new());
        llm.push_text("UNSAFE");
        assert!(!validator_with(&llm)
            .validate_prompt_safety("How to create harmful substances?")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unexpected_output_defaults_unsafe() {
        let llm = Arc::new(FakeLlm::new());
        llm.push_text("MAYBE");
        assert!(!validator_with(&llm)
            .validate_prompt_safety("Unclear input")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_model_error_is_safety_validation_error() {
        let llm = Arc::new(FakeLlm::new());
        llm.push_err(Error::generation("Model error"));
        let result = validator_with(&llm).validate_prompt_safety("Test prompt").await;
        assert!(matches!(result, Err(Error::SafetyValidation(_))));
    }

    #[tokio::test]
    async fn test_empty_prompt_skips_model() {
        let llm = Arc::new(FakeLlm::new());
        let validator = validator_with(&llm);
        assert!(!validator.validate_prompt_safety("").await.unwrap());
        assert!(!validator.validate_prompt_safety("   ").await.unwrap());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_blocked_classification_is_unsafe() {
        let llm = Arc::new(FakeLlm::new());
        llm.push_generation(Generation::new("", FinishReason::Safety));
        assert!(!validator_with(&llm)
            .validate_prompt_safety("something")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_validation_metrics() {
        let llm = Arc::new(FakeLlm::new());
        llm.push_text("safe");
        let metrics = validator_with(&llm).validation_metrics("Test prompt").await;

        assert!(metrics.is_safe);
        assert_eq!(metrics.prompt_length, 11);
        assert_eq!(metrics.word_count, 2);
        assert!(metrics.error.is_none());
    }

    #[test]
    fn test_verdict_parse() {
        assert_eq!(Verdict::parse(" safe\n"), Verdict::Safe);
        assert_eq!(Verdict::parse("UNSAFE."), Verdict::Unsafe);
        assert_eq!(Verdict::parse("SAFE, probably"), Verdict::Unrecognized);
    }
}
