//! Provider abstractions for generation and warehouse retrieval
//!
//! Trait-based seams let the engine run against the GCP backends in
//! production and against fakes in tests.

pub mod gcp;
pub mod llm;
pub mod warehouse;

pub use llm::{Generation, GenerationRequest, LlmProvider, Message, Role};
pub use warehouse::{WarehouseProvider, WarehouseRow};
