//! Core traits and types for the multimodal RAG pipeline
//!
//! This crate provides the foundational types used across all other crates:
//! - Core traits for pluggable backends (embedders, vector index, LLM, loaders)
//! - Record metadata types (text chunks and image records)
//! - Conversation types
//! - Error types

pub mod conversation;
pub mod error;
pub mod llm_types;
pub mod metadata;
pub mod traits;

pub use conversation::ConversationTurn;
pub use error::{Error, Result};
pub use llm_types::{Message, Role};
pub use metadata::{ChunkMetadata, ImageMetadata, RecordKind, RecordMetadata};

pub use traits::{
    DocumentLoader, DocumentPage, ImageEmbedder, IndexFilter, LanguageModel, ScoredRecord,
    TextEmbedder, VectorIndex, VectorRecord,
};
