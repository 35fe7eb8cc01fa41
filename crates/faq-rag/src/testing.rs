//! Scripted fake providers for unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::providers::llm::{FinishReason, Generation, GenerationRequest, LlmProvider, Role};
use crate::providers::warehouse::{WarehouseProvider, WarehouseRow};
use crate::retrieval::VectorSearchQuery;

/// LLM that replays queued results and records every request
#[derive(Default)]
pub struct FakeLlm {
    script: Mutex<VecDeque<Result<Generation>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: &str) {
        self.push_generation(Generation::new(text, FinishReason::Stop));
    }

    pub fn push_generation(&self, generation: Generation) {
        self.script.lock().push_back(Ok(generation));
    }

    pub fn push_err(&self, error: Error) {
        self.script.lock().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    /// Text of the last user message of each request
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| r.messages.iter().rev().find(|m| m.role == Role::User))
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        self.requests.lock().push(request.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Error::generation("no scripted response")))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake-llm"
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

/// Warehouse returning fixed rows (or a fixed failure) for every query
pub struct FakeWarehouse {
    outcome: std::result::Result<Vec<WarehouseRow>, String>,
    queries: Mutex<Vec<VectorSearchQuery>>,
}

impl FakeWarehouse {
    pub fn with_rows(rows: Vec<WarehouseRow>) -> Self {
        Self {
            outcome: Ok(rows),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<VectorSearchQuery> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl WarehouseProvider for FakeWarehouse {
    async fn vector_search(&self, query: &VectorSearchQuery) -> Result<Vec<WarehouseRow>> {
        self.queries.lock().push(query.clone());
        self.outcome.clone().map_err(Error::retrieval)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.outcome.is_ok())
    }

    fn name(&self) -> &str {
        "fake-warehouse"
    }
}
