//! VECTOR_SEARCH query construction
//!
//! The utterance never enters the SQL text: it is bound as the named
//! parameter `@utterance`. Table, model and column names cannot be bound, so
//! they are validated instead.

use crate::config::{RetrievalConfig, WarehouseConfig};
use crate::error::{Error, Result};

/// Name of the query parameter carrying the user's utterance
pub const UTTERANCE_PARAM: &str = "utterance";

/// A named STRING query parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameter {
    pub name: String,
    pub value: String,
}

/// A parameterized nearest-neighbor query ready to send to the warehouse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorSearchQuery {
    pub sql: String,
    pub parameters: Vec<QueryParameter>,
    pub top_k: usize,
}

impl VectorSearchQuery {
    /// Build the query for one utterance
    pub fn build(
        warehouse: &WarehouseConfig,
        retrieval: &RetrievalConfig,
        utterance: &str,
    ) -> Result<Self> {
        let table_id = warehouse.embedded_table_id()?;
        let model_id = warehouse.embedding_model_id()?;
        warehouse.check_identifiers()?;

        if retrieval.top_k == 0 {
            return Err(Error::config("top_k must be at least 1"));
        }

        let filter = match retrieval.similarity_threshold {
            Some(max_distance) => format!("WHERE distance <= {}\n", max_distance),
            None => String::new(),
        };

        let sql = format!(
            r#"SELECT
  base.{content} AS content,
  distance
FROM VECTOR_SEARCH(
  TABLE `{table}`,
  '{column}',
  (
    SELECT ml_generate_embedding_result AS {column}
    FROM ML.GENERATE_EMBEDDING(
      MODEL `{model}`,
      (SELECT @{param} AS content)
    )
  ),
  top_k => {top_k},
  options => '{{"fraction_lists_to_search": {fraction}}}'
)
{filter}ORDER BY distance ASC"#,
            content = warehouse.content_column,
            table = table_id,
            column = warehouse.embedding_column,
            model = model_id,
            param = UTTERANCE_PARAM,
            top_k = retrieval.top_k,
            fraction = retrieval.fraction_lists_to_search,
            filter = filter,
        );

        Ok(Self {
            sql,
            parameters: vec![QueryParameter {
                name: UTTERANCE_PARAM.to_string(),
                value: utterance.to_string(),
            }],
            top_k: retrieval.top_k,
        })
    }
}
