//! Warehouse provider trait for nearest-neighbor queries over embedded rows

use async_trait::async_trait;

use crate::error::Result;
use crate::retrieval::VectorSearchQuery;

/// One row returned by a vector search
#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseRow {
    /// Stored text snippet
    pub content: String,
    /// Distance to the query embedding (lower is closer)
    pub distance: Option<f64>,
}

impl WarehouseRow {
    pub fn new(content: impl Into<String>, distance: Option<f64>) -> Self {
        Self {
            content: content.into(),
            distance,
        }
    }
}

/// Trait for running vector-search queries against a managed warehouse
///
/// Implementations:
/// - `BigQueryClient`: BigQuery `VECTOR_SEARCH` via the `jobs.query` REST API
#[async_trait]
pub trait WarehouseProvider: Send + Sync {
    /// Run the query; rows come back nearest first
    async fn vector_search(&self, query: &VectorSearchQuery) -> Result<Vec<WarehouseRow>>;

    /// Check if the provider can authenticate
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
