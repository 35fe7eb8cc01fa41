//! Gemini client for answer generation
//!
//! Talks to either the Gemini developer API (API key) or Vertex AI (service
//! account). Safety settings are attached to every request.

use async_trait::async_trait;
use std::sync::Arc;

use super::auth::GcpAuth;
use crate::error::{Error, Result};
use crate::providers::llm::{
    FinishReason, Generation, GenerationRequest, LlmProvider, Role, SafetySetting,
};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// How requests are authenticated
pub enum GeminiAuth {
    /// Gemini developer API key
    ApiKey(String),
    /// Vertex AI with an OAuth token
    Vertex { auth: Arc<GcpAuth>, location: String },
}

/// Sampling parameters sent as `generationConfig`
#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

/// Gemini client
pub struct GeminiClient {
    http: reqwest::Client,
    auth: GeminiAuth,
    model: String,
    safety_settings: Vec<SafetySetting>,
    sampling: SamplingConfig,
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// # Arguments
    /// * `http` - shared HTTP client (carries the request timeout)
    /// * `auth` - API key or Vertex AI credentials
    /// * `model` - Model name (e.g., "gemini-2.0-flash")
    /// * `safety_settings` - thresholds applied to every request
    pub fn new(
        http: reqwest::Client,
        auth: GeminiAuth,
        model: String,
        safety_settings: Vec<SafetySetting>,
        sampling: SamplingConfig,
    ) -> Result<Self> {
        if let GeminiAuth::ApiKey(key) = &auth {
            if key.trim().is_empty() {
                return Err(Error::config("Gemini API key is empty"));
            }
        }
        if model.trim().is_empty() {
            return Err(Error::client_init("Gemini model name is empty"));
        }

        Ok(Self {
            http,
            auth,
            model,
            safety_settings,
            sampling,
        })
    }

    /// Get the API endpoint URL
    fn endpoint(&self) -> String {
        match &self.auth {
            GeminiAuth::ApiKey(_) => {
                format!("{}/models/{}:generateContent", GEMINI_API_BASE, self.model)
            }
            GeminiAuth::Vertex { auth, location } => format!(
                "https://{}-aiplatform.googleapis.com/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
                location,
                auth.project_id(),
                location,
                self.model
            ),
        }
    }

    /// Translate role-tagged messages into the wire request
    fn build_request(&self, request: &GenerationRequest) -> GenerateRequest {
        let system_text: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text.as_str())
            .collect();

        let system_instruction = if system_text.is_empty() {
            None
        } else {
            Some(SystemInstruction {
                parts: vec![Part {
                    text: system_text.join("\n\n"),
                }],
            })
        };

        let contents = request
            .messages
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    Role::System => return None,
                    Role::User => "user",
                    Role::Model => "model",
                };
                Some(Content {
                    role: role.to_string(),
                    parts: vec![Part {
                        text: m.text.clone(),
                    }],
                })
            })
            .collect();

        GenerateRequest {
            contents,
            system_instruction,
            safety_settings: self.safety_settings.clone(),
            generation_config: self.sampling,
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    safety_settings: Vec<SafetySetting>,
    generation_config: SamplingConfig,
}

#[derive(serde::Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(serde::Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(serde::Serialize)]
struct Part {
    text: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

#[derive(serde::Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(serde::Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Reduce a response body to the first candidate's text and finish reason
fn parse_response(response: GenerateResponse) -> Result<Generation> {
    let block_reason = response.prompt_feedback.and_then(|f| f.block_reason);

    let Some(candidate) = response.candidates.into_iter().next() else {
        return match block_reason {
            Some(reason) => Ok(Generation {
                text: String::new(),
                finish_reason: None,
                prompt_block_reason: Some(reason),
            }),
            None => Err(Error::generation("No candidates in Gemini response")),
        };
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let generation = Generation {
        text,
        finish_reason: candidate.finish_reason,
        prompt_block_reason: block_reason,
    };

    if generation.text.trim().is_empty() && !generation.is_safety_block() {
        return Err(Error::generation(format!(
            "No text in Gemini response (finish reason: {:?})",
            generation.finish_reason
        )));
    }

    Ok(generation)
}

#[async_trait]
impl LlmProvider for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let body = self.build_request(request);

        let builder = self.http.post(self.endpoint()).json(&body);
        let builder = match &self.auth {
            GeminiAuth::ApiKey(key) => builder.header("x-goog-api-key", key),
            GeminiAuth::Vertex { auth, .. } => builder.bearer_auth(auth.get_token().await?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Error::generation(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "Gemini generation failed ({}): {}",
                status, body
            )));
        }

        let gen_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("Failed to parse Gemini response: {}", e)))?;

        let generation = parse_response(gen_response)?;
        tracing::debug!(
            "Gemini finished with {:?} ({} chars)",
            generation.finish_reason,
            generation.text.len()
        );
        Ok(generation)
    }

    async fn health_check(&self) -> Result<bool> {
        match &self.auth {
            GeminiAuth::ApiKey(key) => Ok(!key.trim().is_empty()),
            GeminiAuth::Vertex { auth, .. } => auth.get_token().await.map(|_| true),
        }
    }

    fn name(&self) -> &str {
        match self.auth {
            GeminiAuth::ApiKey(_) => "gemini",
            GeminiAuth::Vertex { .. } => "vertex-gemini",
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::{safety_settings, HarmBlockThreshold, Message};

    fn client() -> GeminiClient {
        GeminiClient::new(
            reqwest::Client::new(),
            GeminiAuth::ApiKey("test-key".to_string()),
            "gemini-2.0-flash".to_string(),
            safety_settings(HarmBlockThreshold::BlockMediumAndAbove),
            SamplingConfig {
                temperature: 0.2,
                top_p: 0.9,
                max_output_tokens: 256,
            },
        )
        .unwrap()
    }

    fn parse(json: serde_json::Value) -> Result<Generation> {
        parse_response(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            client().endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = GeminiClient::new(
            reqwest::Client::new(),
            GeminiAuth::ApiKey("  ".to_string()),
            "gemini-2.0-flash".to_string(),
            vec![],
            SamplingConfig {
                temperature: 0.0,
                top_p: 1.0,
                max_output_tokens: 1,
            },
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_request_body_maps_roles() {
        let request = GenerationRequest::from_messages(vec![
            Message::system("Be brief."),
            Message::user("Hi"),
            Message::model("Hello!"),
            Message::user("When was Aurora Bay founded?"),
        ]);
        let body = serde_json::to_value(client().build_request(&request)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 256);
    }

    #[test]
    fn test_prompt_only_request_has_no_system_instruction() {
        let body =
            serde_json::to_value(client().build_request(&GenerationRequest::from_prompt("p")))
                .unwrap();
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_text_and_finish_reason() {
        let generation = parse(serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "1901" }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        assert_eq!(generation.text, "1901");
        assert_eq!(generation.finish_reason, Some(FinishReason::Stop));
        assert!(!generation.is_safety_block());
    }

    #[test]
    fn test_parse_safety_finish_without_content() {
        let generation = parse(serde_json::json!({
            "candidates": [{ "finishReason": "SAFETY", "safetyRatings": [] }]
        }))
        .unwrap();
        assert!(generation.is_safety_block());
    }

    #[test]
    fn test_parse_prompt_block() {
        let generation = parse(serde_json::json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        assert!(generation.is_safety_block());
        assert_eq!(generation.prompt_block_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn test_parse_empty_response_is_error() {
        assert!(matches!(
            parse(serde_json::json!({})),
            Err(Error::Generation(_))
        ));
        assert!(matches!(
            parse(serde_json::json!({
                "candidates": [{ "content": { "parts": [] }, "finishReason": "STOP" }]
            })),
            Err(Error::Generation(_))
        ));
    }
}
