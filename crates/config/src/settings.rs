//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{chunking, classification, endpoints, index, llm, memory, retrieval};
use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Vector index connection
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding backends
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Generation model
    #[serde(default)]
    pub llm: LlmSettings,

    /// Chunking parameters
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval parameters
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Conversation memory parameters
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Vector index connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Qdrant endpoint URL
    #[serde(default = "default_qdrant_endpoint")]
    pub endpoint: String,

    /// Collection name
    #[serde(default = "default_collection")]
    pub collection: String,

    /// API key (optional, for cloud deployments)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Vector dimensionality shared by both embedding paths
    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,

    /// Records per upsert batch
    #[serde(default = "default_batch_size")]
    pub upsert_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            endpoint: default_qdrant_endpoint(),
            collection: default_collection(),
            api_key: None,
            vector_dim: default_vector_dim(),
            upsert_batch_size: default_batch_size(),
        }
    }
}

/// Embedding backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Ollama endpoint for text embeddings
    #[serde(default = "default_ollama_endpoint")]
    pub text_endpoint: String,

    /// Text embedding model name
    #[serde(default = "default_embedding_model")]
    pub text_model: String,

    /// CLIP sidecar endpoint for image + label embeddings
    #[serde(default = "default_clip_endpoint")]
    pub image_endpoint: String,

    /// Candidate vocabulary for zero-shot image labels
    #[serde(default = "default_candidate_labels")]
    pub candidate_labels: Vec<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            text_endpoint: default_ollama_endpoint(),
            text_model: default_embedding_model(),
            image_endpoint: default_clip_endpoint(),
            candidate_labels: default_candidate_labels(),
        }
    }
}

/// Generation model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            model: default_llm_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Chunking settings (characters)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Apply whitespace/header cleanup before chunking
    #[serde(default = "default_true")]
    pub clean_text: bool,

    /// Characters of neighbor text spliced into each chunk for retrieval
    /// context; None disables enrichment
    #[serde(default = "default_context_window")]
    pub context_window: Option<usize>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            clean_text: true,
            context_window: default_context_window(),
        }
    }
}

/// Retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results pulled from the index per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Post-query score threshold; None disables the rerank stage
    #[serde(default = "default_score_threshold")]
    pub score_threshold: Option<f32>,

    /// Truncation after threshold filtering; None keeps all survivors
    #[serde(default = "default_rerank_top_k")]
    pub rerank_top_k: Option<usize>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
            rerank_top_k: default_rerank_top_k(),
        }
    }
}

/// Conversation memory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Enable the memory short-circuit
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Token budget before older turns are summarized
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Recent turns kept intact when summarizing
    #[serde(default = "default_recency_window")]
    pub recency_window: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_budget: default_token_budget(),
            recency_window: default_recency_window(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_qdrant_endpoint() -> String {
    endpoints::QDRANT_DEFAULT.to_string()
}
fn default_ollama_endpoint() -> String {
    endpoints::OLLAMA_DEFAULT.to_string()
}
fn default_clip_endpoint() -> String {
    endpoints::CLIP_DEFAULT.to_string()
}
fn default_collection() -> String {
    index::COLLECTION.to_string()
}
fn default_vector_dim() -> usize {
    index::VECTOR_DIM
}
fn default_batch_size() -> usize {
    index::UPSERT_BATCH_SIZE
}
fn default_embedding_model() -> String {
    llm::EMBEDDING_MODEL.to_string()
}
fn default_llm_model() -> String {
    llm::MODEL.to_string()
}
fn default_temperature() -> f32 {
    llm::TEMPERATURE
}
fn default_max_tokens() -> usize {
    llm::MAX_TOKENS
}
fn default_timeout_secs() -> u64 {
    llm::TIMEOUT_SECS
}
fn default_max_retries() -> u32 {
    llm::MAX_RETRIES
}
fn default_chunk_size() -> usize {
    chunking::CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    chunking::CHUNK_OVERLAP
}
fn default_context_window() -> Option<usize> {
    Some(chunking::CONTEXT_WINDOW)
}
fn default_top_k() -> usize {
    retrieval::TOP_K
}
fn default_score_threshold() -> Option<f32> {
    Some(retrieval::SCORE_THRESHOLD)
}
fn default_rerank_top_k() -> Option<usize> {
    Some(retrieval::RERANK_TOP_K)
}
fn default_token_budget() -> usize {
    memory::TOKEN_BUDGET
}
fn default_recency_window() -> usize {
    memory::RECENCY_WINDOW
}
fn default_candidate_labels() -> Vec<String> {
    classification::CANDIDATE_LABELS
        .iter()
        .map(|l| l.to_string())
        .collect()
}

impl Settings {
    /// Validate cross-field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chunking.chunk_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::InvalidValue {
                field: "chunking.chunk_overlap".to_string(),
                reason: format!(
                    "overlap {} must be smaller than chunk size {}",
                    self.chunking.chunk_overlap, self.chunking.chunk_size
                ),
            });
        }

        if self.index.vector_dim == 0 {
            return Err(ConfigError::InvalidValue {
                field: "index.vector_dim".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.top_k".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if let Some(rerank_top_k) = self.retrieval.rerank_top_k {
            if rerank_top_k > self.retrieval.top_k {
                return Err(ConfigError::InvalidValue {
                    field: "retrieval.rerank_top_k".to_string(),
                    reason: "must not exceed retrieval.top_k".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Load settings from an optional TOML file plus environment overrides
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::with_name(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("DOCQA")
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.chunking.context_window, Some(100));
        assert_eq!(settings.retrieval.top_k, 5);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut settings = Settings::default();
        settings.chunking.chunk_overlap = settings.chunking.chunk_size;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_rerank_top_k_bounded_by_top_k() {
        let mut settings = Settings::default();
        settings.retrieval.top_k = 3;
        settings.retrieval.rerank_top_k = Some(10);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_default_retrieval_reranks() {
        let config = RetrievalConfig::default();
        assert_eq!(config.score_threshold, Some(0.25));
        assert!(config.rerank_top_k.unwrap() <= config.top_k);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[chunking]\nchunk_size = 500\nchunk_overlap = 50\n",
        )
        .unwrap();

        let settings = load_settings(path.to_str()).unwrap();
        assert_eq!(settings.chunking.chunk_size, 500);
        assert_eq!(settings.chunking.chunk_overlap, 50);
        // Untouched sections keep their defaults
        assert_eq!(settings.index.upsert_batch_size, 100);
    }
}
