//! Google Cloud Platform provider implementations
//!
//! - Gemini (developer API or Vertex AI) for answer generation
//! - BigQuery `VECTOR_SEARCH` for context retrieval

mod auth;
mod bigquery;
mod gemini_client;

pub use auth::GcpAuth;
pub use bigquery::BigQueryClient;
pub use gemini_client::{GeminiAuth, GeminiClient, SamplingConfig};
