//! Generation backend for the RAG pipeline
//!
//! Features:
//! - Ollama chat backend with retry, streaming, and cancellation
//! - Prompt construction for answering, memory judging, and query analysis

pub mod backend;
pub mod prompt;

pub use backend::{LlmConfig, OllamaBackend};
pub use prompt::{
    memory_judge_messages, query_analysis_messages, query_rewrite_messages, rag_messages,
    summary_messages, NO_MEMORY_CONTEXT,
};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out")]
    Timeout,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for docqa_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Configuration(msg) => docqa_core::Error::Config(msg),
            other => docqa_core::Error::Llm(other.to_string()),
        }
    }
}
