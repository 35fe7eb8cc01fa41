//! Context retrieval: one vector-search query per utterance

use std::sync::Arc;

use super::query::VectorSearchQuery;
use crate::config::{RetrievalConfig, WarehouseConfig};
use crate::providers::WarehouseProvider;

/// Outcome of a retrieval attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievedContext {
    /// Matching snippet(s), nearest first
    Found(String),
    /// The query ran and matched nothing
    NotFound,
    /// The query could not be built or the warehouse call failed
    Failed(String),
}

impl RetrievedContext {
    /// The context text; empty for both `NotFound` and `Failed`
    pub fn content(&self) -> &str {
        match self {
            RetrievedContext::Found(content) => content,
            RetrievedContext::NotFound | RetrievedContext::Failed(_) => "",
        }
    }

    pub fn into_content(self) -> String {
        match self {
            RetrievedContext::Found(content) => content,
            RetrievedContext::NotFound | RetrievedContext::Failed(_) => String::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, RetrievedContext::Found(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RetrievedContext::Failed(_))
    }
}

/// Retrieves the nearest stored snippet(s) for an utterance
pub struct ContextRetriever {
    warehouse: Arc<dyn WarehouseProvider>,
    warehouse_config: WarehouseConfig,
    retrieval: RetrievalConfig,
}

impl ContextRetriever {
    pub fn new(
        warehouse: Arc<dyn WarehouseProvider>,
        warehouse_config: WarehouseConfig,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            warehouse,
            warehouse_config,
            retrieval,
        }
    }

    /// Run the vector search; never returns an error
    ///
    /// Only the `top_k` nearest rows are considered. Blank rows among them
    /// are dropped, and if nothing is left the result is `NotFound`.
    pub async fn retrieve(&self, utterance: &str) -> RetrievedContext {
        let query = match VectorSearchQuery::build(&self.warehouse_config, &self.retrieval, utterance)
        {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!("Could not build vector search query: {}", e);
                return RetrievedContext::Failed(e.to_string());
            }
        };

        let rows = match self.warehouse.vector_search(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Warehouse query via {} failed: {}", self.warehouse.name(), e);
                return RetrievedContext::Failed(e.to_string());
            }
        };

        let snippets: Vec<String> = rows
            .into_iter()
            .take(query.top_k)
            .map(|row| row.content)
            .filter(|content| !content.trim().is_empty())
            .collect();

        tracing::debug!("Retrieved {} context row(s)", snippets.len());

        if snippets.is_empty() {
            RetrievedContext::NotFound
        } else {
            RetrievedContext::Found(snippets.join("\n\n"))
        }
    }

    /// Context text only; `""` when nothing matched or the query failed
    pub async fn retrieve_context(&self, utterance: &str) -> String {
        self.retrieve(utterance).await.into_content()
    }

    /// Check the underlying warehouse
    pub async fn health_check(&self) -> crate::Result<bool> {
        self.warehouse.health_check().await
    }

    pub fn warehouse_name(&self) -> &str {
        self.warehouse.name()
    }
}
