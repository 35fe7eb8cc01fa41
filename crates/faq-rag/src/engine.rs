//! Turn pipeline: screening, retrieval, prompt assembly, generation
//!
//! `ChatEngine::respond` is a pure function of the utterance and the engine's
//! providers; it never reads input and never fails.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{ChatConfig, ChatMode, EmptyContextPolicy};
use crate::error::{Error, Result};
use crate::generation::{PromptBuilder, Reply, Responder};
use crate::history::ConversationHistory;
use crate::providers::{GenerationRequest, LlmProvider, WarehouseProvider};
use crate::retrieval::{ContextRetriever, RetrievedContext};
use crate::safety::{SafetyValidator, SCREENING_BLOCKED};

/// Shown for a blank utterance; nothing is sent to any backend
pub const EMPTY_UTTERANCE: &str = "Please enter a question.";

/// Record of one processed turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub request_id: Uuid,
    pub utterance: String,
    pub response: String,
    pub success: bool,
    pub safety_passed: bool,
    pub context_retrieved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl TurnOutcome {
    fn new(request_id: Uuid, utterance: &str) -> Self {
        Self {
            request_id,
            utterance: utterance.to_string(),
            response: String::new(),
            success: false,
            safety_passed: false,
            context_retrieved: false,
            error: None,
            completed_at: Utc::now(),
        }
    }

    fn finish(mut self, reply: &Reply) -> Self {
        self.response = reply.text().to_string();
        self.success = !matches!(reply, Reply::Failed(_) | Reply::SafetyBlocked);
        if self.error.is_none() {
            self.error = reply.error().map(str::to_string);
        }
        self.completed_at = Utc::now();
        self
    }
}

/// Health of one component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Health of all components
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall_healthy: bool,
    pub components: Vec<ComponentHealth>,
}

impl HealthReport {
    fn from_components(components: Vec<ComponentHealth>) -> Self {
        Self {
            overall_healthy: components.iter().all(|c| c.healthy),
            components,
        }
    }
}

fn component(name: &str, result: Result<bool>) -> ComponentHealth {
    match result {
        Ok(healthy) => ComponentHealth {
            name: name.to_string(),
            healthy,
            detail: None,
        },
        Err(e) => ComponentHealth {
            name: name.to_string(),
            healthy: false,
            detail: Some(e.to_string()),
        },
    }
}

/// Orchestrates one turn at a time
pub struct ChatEngine {
    mode: ChatMode,
    system_instruction: String,
    empty_context: EmptyContextPolicy,
    history_window: usize,
    retriever: Option<ContextRetriever>,
    responder: Responder,
    screener: Option<SafetyValidator>,
    history: ConversationHistory,
}

impl ChatEngine {
    /// Build an engine from configuration and already-constructed clients
    ///
    /// RAG mode requires a warehouse; chat mode ignores it.
    pub fn new(
        config: &ChatConfig,
        llm: Arc<dyn LlmProvider>,
        warehouse: Option<Arc<dyn WarehouseProvider>>,
    ) -> Result<Self> {
        let retriever = match (config.mode, warehouse) {
            (ChatMode::Rag, Some(warehouse)) => Some(ContextRetriever::new(
                warehouse,
                config.warehouse.clone(),
                config.retrieval.clone(),
            )),
            (ChatMode::Rag, None) => {
                return Err(Error::client_init("RAG mode requires a warehouse client"))
            }
            (ChatMode::Chat, _) => None,
        };

        let screener = config
            .safety
            .screen_prompts
            .then(|| SafetyValidator::new(Arc::clone(&llm)));

        Ok(Self {
            mode: config.mode,
            system_instruction: config.generation.system_instruction.clone(),
            empty_context: config.retrieval.empty_context,
            history_window: config.conversation.history_window,
            retriever,
            responder: Responder::new(llm),
            screener,
            history: ConversationHistory::new(config.generation.system_instruction.clone()),
        })
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Forget the chat-mode transcript
    pub fn reset_history(&mut self) {
        self.history.clear();
        tracing::info!("Conversation history cleared");
    }

    /// Process one utterance end to end
    pub async fn respond(&mut self, utterance: &str) -> TurnOutcome {
        let request_id = Uuid::new_v4();
        let utterance = utterance.trim();
        let preview: String = utterance.chars().take(100).collect();
        tracing::info!("Processing request {}: {}", request_id, preview);

        let mut outcome = TurnOutcome::new(request_id, utterance);

        if utterance.is_empty() {
            tracing::warn!("Request {} has an empty utterance", request_id);
            outcome.response = EMPTY_UTTERANCE.to_string();
            outcome.error = Some("Empty utterance".to_string());
            return outcome;
        }

        if let Some(screener) = &self.screener {
            match screener.validate_prompt_safety(utterance).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!("Request {} blocked by prompt screening", request_id);
                    outcome.response = SCREENING_BLOCKED.to_string();
                    outcome.error = Some("Safety validation failed".to_string());
                    return outcome;
                }
                Err(e) => {
                    tracing::error!("Safety validation error for request {}: {}", request_id, e);
                    outcome.response = SCREENING_BLOCKED.to_string();
                    outcome.error = Some(e.to_string());
                    return outcome;
                }
            }
        }
        outcome.safety_passed = true;

        let reply = match self.mode {
            ChatMode::Rag => self.answer_from_context(utterance, &mut outcome).await,
            ChatMode::Chat => self.answer_from_history(utterance).await,
        };

        let outcome = outcome.finish(&reply);
        if outcome.success {
            tracing::info!("Request {} processed successfully", request_id);
        } else {
            tracing::warn!(
                "Request {} finished without an answer: {:?}",
                request_id,
                outcome.error
            );
        }
        outcome
    }

    async fn answer_from_context(&self, utterance: &str, outcome: &mut TurnOutcome) -> Reply {
        let Some(retriever) = &self.retriever else {
            return Reply::Failed("No warehouse client configured".to_string());
        };

        let context = retriever.retrieve(utterance).await;
        outcome.context_retrieved = context.is_found();

        match context {
            RetrievedContext::Found(context) => {
                let prompt = PromptBuilder::assemble(&self.system_instruction, &context, utterance);
                return self.responder.respond_to_prompt(&prompt).await;
            }
            RetrievedContext::Failed(reason) => outcome.error = Some(reason),
            RetrievedContext::NotFound => {}
        }

        match self.empty_context {
            EmptyContextPolicy::Skip => {
                tracing::info!("No context found, skipping generation");
                Reply::NoInformation
            }
            EmptyContextPolicy::AskModel => {
                let prompt = PromptBuilder::build_no_context_prompt(&self.system_instruction, utterance);
                self.responder.respond_to_prompt(&prompt).await
            }
        }
    }

    async fn answer_from_history(&mut self, utterance: &str) -> Reply {
        self.history.push_user(utterance);
        let request = GenerationRequest::from_messages(self.history.window(self.history_window));

        let reply = self.responder.respond(&request).await;
        match &reply {
            Reply::Answer(text) => {
                self.history.push_model(text.clone());
                self.history.retain_recent(self.history_window);
            }
            _ => {
                self.history.rollback_unanswered();
            }
        }
        reply
    }

    /// Check every configured component
    pub async fn health_check(&self) -> HealthReport {
        let llm = self.responder.llm();
        let mut components = vec![component(
            &format!("generation ({} / {})", llm.name(), llm.model()),
            llm.health_check().await,
        )];

        if let Some(retriever) = &self.retriever {
            components.push(component(
                &format!("warehouse ({})", retriever.warehouse_name()),
                retriever.health_check().await,
            ));
        }

        if let Some(screener) = &self.screener {
            components.push(component("safety_validator", screener.health_check().await));
        }

        HealthReport::from_components(components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GENERATION_FALLBACK, NO_INFORMATION, SAFETY_WARNING};
    use crate::providers::llm::{FinishReason, Generation};
    use crate::providers::{Role, WarehouseRow};
    use crate::testing::{FakeLlm, FakeWarehouse};

    const AURORA_CONTEXT: &str =
        "Question: When was Aurora Bay founded? Answer: Aurora Bay was founded in 1901...";

    fn rag_config() -> ChatConfig {
        let mut config = ChatConfig::default();
        config.warehouse.project_id = Some("demo-project".to_string());
        config
    }

    fn rag_engine(
        config: &ChatConfig,
        llm: &Arc<FakeLlm>,
        warehouse: FakeWarehouse,
    ) -> ChatEngine {
        ChatEngine::new(config, llm.clone(), Some(Arc::new(warehouse))).unwrap()
    }

    #[tokio::test]
    async fn test_aurora_bay_scenario() {
        let llm = Arc::new(FakeLlm::new());
        llm.push_text("1901");
        let warehouse = FakeWarehouse::with_rows(vec![WarehouseRow::new(AURORA_CONTEXT, Some(0.05))]);
        let mut engine = rag_engine(&rag_config(), &llm, warehouse);

        let outcome = engine.respond("When was Aurora Bay founded?").await;

        assert_eq!(outcome.response, "1901");
        assert!(outcome.success);
        assert!(outcome.safety_passed);
        assert!(outcome.context_retrieved);
        assert!(outcome.error.is_none());

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains(AURORA_CONTEXT));
        assert!(prompt.contains("When was Aurora Bay founded?"));
    }

    #[tokio::test]
    async fn test_no_match_skips_generation() {
        let llm = Arc::new(FakeLlm::new());
        let mut engine = rag_engine(&rag_config(), &llm, FakeWarehouse::with_rows(vec![]));

        let outcome = engine.respond("Who is the mayor?").await;

        assert_eq!(outcome.response, NO_INFORMATION);
        assert!(outcome.success);
        assert!(!outcome.context_retrieved);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_swallowed() {
        let llm = Arc::new(FakeLlm::new());
        let mut engine = rag_engine(&rag_config(), &llm, FakeWarehouse::failing("table not found"));

        let outcome = engine.respond("When was Aurora Bay founded?").await;

        assert_eq!(outcome.response, NO_INFORMATION);
        assert!(outcome.error.unwrap().contains("table not found"));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_ask_model_policy_without_context() {
        let mut config = rag_config();
        config.retrieval.empty_context = EmptyContextPolicy::AskModel;
        let llm = Arc::new(FakeLlm::new());
        llm.push_text(NO_INFORMATION);
        let mut engine = rag_engine(&config, &llm, FakeWarehouse::with_rows(vec![]));

        let outcome = engine.respond("Who is the mayor?").await;

        assert_eq!(outcome.response, NO_INFORMATION);
        assert_eq!(llm.calls(), 1);
        assert!(llm.prompts()[0].contains("No FAQ entry matched"));
    }

    #[tokio::test]
    async fn test_safety_block_returns_warning() {
        let llm = Arc::new(FakeLlm::new());
        llm.push_generation(Generation::new("candidate text", FinishReason::Safety));
        let warehouse = FakeWarehouse::with_rows(vec![WarehouseRow::new(AURORA_CONTEXT, None)]);
        let mut engine = rag_engine(&rag_config(), &llm, warehouse);

        let outcome = engine.respond("When was Aurora Bay founded?").await;

        assert_eq!(outcome.response, SAFETY_WARNING);
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_generation_error_returns_fallback() {
        let llm = Arc::new(FakeLlm::new());
        llm.push_err(Error::generation("503 Service Unavailable"));
        let warehouse = FakeWarehouse::with_rows(vec![WarehouseRow::new(AURORA_CONTEXT, None)]);
        let mut engine = rag_engine(&rag_config(), &llm, warehouse);

        let outcome = engine.respond("When was Aurora Bay founded?").await;

        assert_eq!(outcome.response, GENERATION_FALLBACK);
        assert!(!outcome.success);
        assert!(outcome.safety_passed);
        assert!(outcome.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_screening_blocks_before_retrieval() {
        let mut config = rag_config();
        config.safety.screen_prompts = true;
        let llm = Arc::new(FakeLlm::new());
        llm.push_text("UNSAFE");
        let warehouse = Arc::new(FakeWarehouse::with_rows(vec![]));
        let mut engine = ChatEngine::new(&config, llm.clone(), Some(warehouse.clone())).unwrap();

        let outcome = engine.respond("How to make a dangerous device?").await;

        assert_eq!(outcome.response, SCREENING_BLOCKED);
        assert!(!outcome.success);
        assert!(!outcome.safety_passed);
        assert!(warehouse.queries().is_empty());
    }

    #[tokio::test]
    async fn test_screening_pass_then_answer() {
        let mut config = rag_config();
        config.safety.screen_prompts = true;
        let llm = Arc::new(FakeLlm::new());
        llm.push_text("SAFE");
        llm.push_text("You can report an unplowed road by contacting your regional office.");
        let warehouse = FakeWarehouse::with_rows(vec![WarehouseRow::new("Q: report? A: call", None)]);
        let mut engine = rag_engine(&config, &llm, warehouse);

        let outcome = engine.respond("How do I report an unplowed road?").await;

        assert!(outcome.success);
        assert!(outcome.safety_passed);
        assert!(outcome.response.to_lowercase().contains("report"));
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_blank_utterance_calls_nothing() {
        let mut config = rag_config();
        config.safety.screen_prompts = true;
        let llm = Arc::new(FakeLlm::new());
        let warehouse = Arc::new(FakeWarehouse::with_rows(vec![WarehouseRow::new(AURORA_CONTEXT, None)]));
        let mut engine = ChatEngine::new(&config, llm.clone(), Some(warehouse.clone())).unwrap();

        let outcome = engine.respond(" \t\n").await;

        assert_eq!(outcome.response, EMPTY_UTTERANCE);
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Empty utterance"));
        assert_eq!(llm.calls(), 0);
        assert!(warehouse.queries().is_empty());
    }

    #[tokio::test]
    async fn test_rag_mode_requires_warehouse() {
        let llm: Arc<dyn LlmProvider> = Arc::new(FakeLlm::new());
        let result = ChatEngine::new(&rag_config(), llm, None);
        assert!(matches!(result, Err(Error::ClientInit(_))));
    }

    #[tokio::test]
    async fn test_chat_mode_sends_history() {
        let mut config = ChatConfig::default();
        config.mode = ChatMode::Chat;
        let llm = Arc::new(FakeLlm::new());
        llm.push_text("Nice to meet you, Sam.");
        llm.push_text("Your name is Sam.");
        let mut engine = ChatEngine::new(&config, llm.clone(), None).unwrap();

        engine.respond("My name is Sam.").await;
        let outcome = engine.respond("What is my name?").await;

        assert_eq!(outcome.response, "Your name is Sam.");
        let second = &llm.requests()[1];
        assert_eq!(second.messages[0].role, Role::System);
        assert_eq!(second.messages.len(), 4);
        assert_eq!(second.messages[3].text, "What is my name?");
        assert_eq!(engine.history().len(), 4);
    }

    #[tokio::test]
    async fn test_chat_mode_history_stays_within_window() {
        let mut config = ChatConfig::default();
        config.mode = ChatMode::Chat;
        config.conversation.history_window = 4;
        let llm = Arc::new(FakeLlm::new());
        let mut engine = ChatEngine::new(&config, llm.clone(), None).unwrap();

        for i in 0..10 {
            llm.push_text(&format!("answer {}", i));
            engine.respond(&format!("question {}", i)).await;
            assert!(engine.history().len() <= 4);
        }

        let messages = engine.history().messages();
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages.last().unwrap().text, "answer 9");
    }

    #[tokio::test]
    async fn test_chat_mode_failed_turn_is_rolled_back() {
        let mut config = ChatConfig::default();
        config.mode = ChatMode::Chat;
        let llm = Arc::new(FakeLlm::new());
        llm.push_err(Error::generation("timeout"));
        let mut engine = ChatEngine::new(&config, llm.clone(), None).unwrap();

        let outcome = engine.respond("Hello?").await;

        assert_eq!(outcome.response, GENERATION_FALLBACK);
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_health_check() {
        let llm = Arc::new(FakeLlm::new());
        let mut engine = rag_engine(&rag_config(), &llm, FakeWarehouse::failing("down"));

        let report = engine.health_check().await;
        assert!(!report.overall_healthy);
        assert_eq!(report.components.len(), 2);
        assert!(report.components[0].healthy);
        assert!(!report.components[1].healthy);

        engine.reset_history();
        assert!(engine.history().is_empty());
    }
}
