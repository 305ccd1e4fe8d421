//! Error types shared across the pipeline

use thiserror::Error;

/// Top-level error for the pipeline
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Retrieval error: {0}")]
    Rag(String),
}

/// Result alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error class is recoverable by degrading to empty context
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Embedding(_) | Error::Index(_) | Error::Rag(_))
    }
}
