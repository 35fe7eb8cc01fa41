//! LLM provider trait and the request/response types shared by generation backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Harm categories that carry a blocking threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ];
}

/// Severity at or above which content is blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockLowAndAbove,
    BlockMediumAndAbove,
    BlockOnlyHigh,
    BlockNone,
}

/// One category/threshold pair sent with every generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// The same threshold for all four harm categories
pub fn safety_settings(threshold: HarmBlockThreshold) -> Vec<SafetySetting> {
    HarmCategory::ALL
        .iter()
        .map(|&category| SafetySetting {
            category,
            threshold,
        })
        .collect()
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Safety,
    Recitation,
    Blocklist,
    ProhibitedContent,
    Spii,
    Other,
    #[serde(other)]
    Unspecified,
}

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Model,
}

/// A role-tagged message fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// A generation request: an ordered list of messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
}

impl GenerationRequest {
    /// A single user turn carrying a fully assembled prompt
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
        }
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// Raw result of one generation call, before the safety gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Concatenated text of the first candidate (may be empty)
    pub text: String,
    /// Finish reason of the first candidate
    pub finish_reason: Option<FinishReason>,
    /// Set when the prompt itself was blocked and no candidate came back
    pub prompt_block_reason: Option<String>,
}

impl Generation {
    pub fn new(text: impl Into<String>, finish_reason: FinishReason) -> Self {
        Self {
            text: text.into(),
            finish_reason: Some(finish_reason),
            prompt_block_reason: None,
        }
    }

    /// Whether the output was suppressed by the safety filters
    pub fn is_safety_block(&self) -> bool {
        self.finish_reason == Some(FinishReason::Safety) || self.prompt_block_reason.is_some()
    }
}

/// Trait for text generation backends
///
/// Implementations:
/// - `GeminiClient`: Gemini developer API or Vertex AI
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a continuation of the given messages
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;

    /// Generate from a single assembled prompt
    async fn generate_text(&self, prompt: &str) -> Result<Generation> {
        self.generate(&GenerationRequest::from_prompt(prompt)).await
    }

    /// Check if the provider is configured and reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_settings_cover_all_categories() {
        let settings = safety_settings(HarmBlockThreshold::BlockMediumAndAbove);
        assert_eq!(settings.len(), 4);
        assert!(settings
            .iter()
            .all(|s| s.threshold == HarmBlockThreshold::BlockMediumAndAbove));

        let json = serde_json::to_value(&settings[0]).unwrap();
        assert_eq!(json["category"], "HARM_CATEGORY_HARASSMENT");
        assert_eq!(json["threshold"], "BLOCK_MEDIUM_AND_ABOVE");
    }

    #[test]
    fn test_finish_reason_parsing() {
        let reason: FinishReason = serde_json::from_str("\"SAFETY\"").unwrap();
        assert_eq!(reason, FinishReason::Safety);

        let reason: FinishReason = serde_json::from_str("\"FINISH_REASON_UNSPECIFIED\"").unwrap();
        assert_eq!(reason, FinishReason::Unspecified);
    }

    #[test]
    fn test_safety_block_detection() {
        assert!(Generation::new("text", FinishReason::Safety).is_safety_block());
        assert!(!Generation::new("text", FinishReason::Stop).is_safety_block());

        let blocked = Generation {
            text: String::new(),
            finish_reason: None,
            prompt_block_reason: Some("SAFETY".to_string()),
        };
        assert!(blocked.is_safety_block());
    }
}
