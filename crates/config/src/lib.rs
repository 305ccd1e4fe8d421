//! Configuration management for the RAG pipeline
//!
//! Supports loading configuration from:
//! - TOML files
//! - Environment variables (DOCQA_ prefix, `__` separator)
//!
//! All defaults live in [`constants`] so no component hardcodes its own.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, ChunkingConfig, EmbeddingSettings, IndexConfig, LlmSettings, MemoryConfig,
    RetrievalConfig, Settings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}
