//! Retrieval core for the multimodal RAG pipeline
//!
//! Features:
//! - Text cleanup and recursive character chunking with overlap
//! - Dual embedding paths (text + image) validated into one comparable space
//! - Zero-shot image classification against a fixed label vocabulary
//! - Qdrant-backed vector index behind the `VectorIndex` contract
//! - Fusion retriever (mean-then-renormalize) with score-threshold reranking
//! - Context composition with bracketed source citations
//! - Document ingestion pipeline (load, clean, chunk, embed, upsert)

pub mod chunker;
pub mod cleaner;
pub mod composer;
pub mod embeddings;
pub mod image;
pub mod ingest;
pub mod loader;
pub mod retriever;
pub mod vector_store;

pub use chunker::{Chunk, ChunkSource, TextChunker};
pub use cleaner::{clean_document_text, TextCleaner};
pub use composer::{ContextComposer, SourceRef, NO_CONTEXT};
pub use embeddings::{fuse_vectors, EmbeddingAdapter, OllamaTextEmbedder, TextEmbeddingConfig};
pub use image::{ClipEmbeddingConfig, ClipHttpEmbedder, ImageClassifier};
pub use ingest::{IngestConfig, IngestPipeline, IngestReport};
pub use loader::{LoaderRegistry, PlainTextLoader, UrlLoader};
pub use retriever::{RetrievalResult, Retriever, RetrieverConfig};
pub use vector_store::{QdrantIndex, QdrantIndexConfig};

use thiserror::Error;

/// Retrieval errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: text={text_dim}, image={image_dim}")]
    DimensionMismatch { text_dim: usize, image_dim: usize },

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),
}

impl From<RagError> for docqa_core::Error {
    fn from(err: RagError) -> Self {
        match err {
            RagError::InvalidConfig(msg) => docqa_core::Error::Config(msg),
            RagError::Embedding(msg) => docqa_core::Error::Embedding(msg),
            e @ RagError::DimensionMismatch { .. } => docqa_core::Error::Config(e.to_string()),
            RagError::VectorStore(msg) | RagError::Search(msg) | RagError::Connection(msg) => {
                docqa_core::Error::Index(msg)
            },
            RagError::Ingestion(msg) => docqa_core::Error::Rag(msg),
        }
    }
}
