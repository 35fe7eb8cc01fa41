//! Context retrieval from the warehouse

mod context;
mod query;

pub use context::{ContextRetriever, RetrievedContext};
pub use query::{QueryParameter, VectorSearchQuery, UTTERANCE_PARAM};
