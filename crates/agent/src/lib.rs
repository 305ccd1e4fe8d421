//! Question-answering agent
//!
//! Orchestrates the full flow: conversation memory consultation, query
//! analysis for image-accompanied questions, retrieval, context composition,
//! and answer generation. `ChatSession` wraps one conversation; `RagPipeline`
//! is the stateless engine underneath it.

pub mod memory;
pub mod pipeline;
pub mod query_analyzer;
pub mod session;

pub use memory::{ConversationMemory, MemoryConfig};
pub use pipeline::{RagPipeline, RagResponse};
pub use query_analyzer::{QueryAnalysis, QueryAnalyzer};
pub use session::ChatSession;
