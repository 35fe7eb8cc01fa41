//! faq-rag: Retrieval-augmented FAQ chatbot
//!
//! Each console turn embeds the user's question inside BigQuery, pulls the
//! nearest stored FAQ entry with `VECTOR_SEARCH`, and asks Gemini to answer
//! from that context. Replies pass a finish-reason safety gate before they
//! are shown. A plain chat mode keeps a local conversation history instead.

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod history;
pub mod providers;
pub mod repl;
pub mod retrieval;
pub mod safety;
pub mod setup;

#[cfg(test)]
mod testing;

pub use config::{ChatConfig, ChatMode};
pub use engine::{ChatEngine, HealthReport, TurnOutcome};
pub use error::{Error, Result};
pub use evaluation::EvaluationReport;
pub use generation::Reply;
pub use repl::{LoopSummary, TurnLoop};
pub use retrieval::RetrievedContext;
