//! Centralized constants for the RAG pipeline
//!
//! Single source of truth for defaults and fixed vocabulary used across the
//! workspace. Components read these instead of hardcoding values.

/// Service endpoints
pub mod endpoints {
    /// Default Qdrant endpoint
    pub const QDRANT_DEFAULT: &str = "http://localhost:6334";

    /// Default Ollama endpoint (chat + text embeddings)
    pub const OLLAMA_DEFAULT: &str = "http://localhost:11434";

    /// Default CLIP sidecar endpoint (image + label embeddings)
    pub const CLIP_DEFAULT: &str = "http://localhost:8100";
}

/// Chunking defaults (characters, not tokens)
pub mod chunking {
    pub const CHUNK_SIZE: usize = 1000;
    pub const CHUNK_OVERLAP: usize = 200;
    /// Neighbor-context window for context-enhanced chunking
    pub const CONTEXT_WINDOW: usize = 100;
}

/// Retrieval defaults
pub mod retrieval {
    /// Results surfaced from the index per query
    pub const TOP_K: usize = 5;
    /// Results kept after the optional rerank stage
    pub const RERANK_TOP_K: usize = 2;
    /// Post-query score threshold for the rerank stage
    pub const SCORE_THRESHOLD: f32 = 0.25;
}

/// Vector index defaults
pub mod index {
    pub const COLLECTION: &str = "docqa_knowledge";
    /// CLIP ViT-L/14 dimensionality; the text embedder must match
    pub const VECTOR_DIM: usize = 768;
    /// Records per upsert batch
    pub const UPSERT_BATCH_SIZE: usize = 100;
}

/// Generation defaults
pub mod llm {
    pub const MODEL: &str = "qwen3:4b-instruct";
    pub const EMBEDDING_MODEL: &str = "embeddinggemma:latest";
    pub const TEMPERATURE: f32 = 0.7;
    pub const MAX_TOKENS: usize = 1024;
    pub const TIMEOUT_SECS: u64 = 60;
    pub const MAX_RETRIES: u32 = 3;
}

/// Conversation memory defaults
pub mod memory {
    /// Token budget before older turns are summarized
    pub const TOKEN_BUDGET: usize = 2000;
    /// Recent turns kept intact when summarizing
    pub const RECENCY_WINDOW: usize = 4;
    /// Synthetic provenance label for memory-answered questions
    pub const MEMORY_SOURCE: &str = "Conversation Memory";
}

/// Zero-shot image classification
pub mod classification {
    /// Fixed candidate vocabulary for image labels
    pub const CANDIDATE_LABELS: &[&str] = &[
        "chart",
        "diagram",
        "table",
        "screenshot",
        "photograph",
        "document page",
        "plot",
    ];

    /// Sentinel label when classification fails
    pub const UNKNOWN_LABEL: &str = "unknown";
}
