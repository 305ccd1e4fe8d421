//! Fusion retriever
//!
//! Turns a text query, an image query, or both into one index lookup.
//! When both modalities are present their embeddings are fused (mean, then
//! renormalized) into a single query vector; the text side of a fused query
//! uses the CLIP text tower so both halves live in the same space. Text-only
//! queries go through the regular text embedder that indexed the chunks.
//!
//! Retrieval failures at query time degrade to an empty result set rather
//! than failing the request; the caller answers without context.

use std::path::Path;
use std::sync::Arc;

use docqa_core::{IndexFilter, Result, ScoredRecord, VectorIndex};
use tracing::{debug, instrument, warn};

use crate::embeddings::EmbeddingAdapter;

/// Retrieval tuning
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Results pulled from the index per query
    pub top_k: usize,
    /// Minimum score a result must reach to be surfaced; None disables
    /// the rerank stage
    pub score_threshold: Option<f32>,
    /// Truncation after threshold filtering
    pub rerank_top_k: Option<usize>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: docqa_config::constants::retrieval::TOP_K,
            score_threshold: None,
            rerank_top_k: None,
        }
    }
}

impl From<docqa_config::RetrievalConfig> for RetrieverConfig {
    fn from(c: docqa_config::RetrievalConfig) -> Self {
        Self {
            top_k: c.top_k,
            score_threshold: c.score_threshold,
            rerank_top_k: c.rerank_top_k,
        }
    }
}

/// Outcome of one retrieval pass
#[derive(Debug, Default)]
pub struct RetrievalResult {
    /// Surfaced records, best first
    pub records: Vec<ScoredRecord>,
    /// True when a backend failure was swallowed and the result set is
    /// empty because of it
    pub degraded: bool,
}

impl RetrievalResult {
    fn degraded() -> Self {
        Self {
            records: Vec::new(),
            degraded: true,
        }
    }
}

/// Multimodal retriever over one vector index
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedders: EmbeddingAdapter,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedders: EmbeddingAdapter,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            index,
            embedders,
            config,
        }
    }

    /// Retrieve for a text and/or image query
    ///
    /// Whitespace-only text counts as absent. A query with neither
    /// modality yields an empty result set.
    #[instrument(skip_all, fields(has_text = text.is_some(), has_image = image.is_some()))]
    pub async fn retrieve(
        &self,
        text: Option<&str>,
        image: Option<&Path>,
        filter: Option<&IndexFilter>,
    ) -> Result<RetrievalResult> {
        let text = text.map(str::trim).filter(|t| !t.is_empty());

        let vector = match (text, image) {
            (None, None) => return Ok(RetrievalResult::default()),
            (Some(text), None) => match self.embedders.embed_text(text).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "text embedding failed, returning no context");
                    return Ok(RetrievalResult::degraded());
                },
            },
            (None, Some(image)) => match self.embedders.embed_image(image).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "image embedding failed, returning no context");
                    return Ok(RetrievalResult::degraded());
                },
            },
            (Some(text), Some(image)) => match self.embedders.embed_fused(text, image).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "fused embedding failed, returning no context");
                    return Ok(RetrievalResult::degraded());
                },
            },
        };

        match self.index.query(&vector, self.config.top_k, filter).await {
            Ok(records) => {
                let records = self.rerank(records);
                debug!(count = records.len(), "retrieval complete");
                Ok(RetrievalResult {
                    records,
                    degraded: false,
                })
            },
            Err(e) => {
                warn!(error = %e, "index query failed, returning no context");
                Ok(RetrievalResult::degraded())
            },
        }
    }

    /// Recall-then-precision: drop below-threshold results, then truncate
    fn rerank(&self, mut records: Vec<ScoredRecord>) -> Vec<ScoredRecord> {
        records.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        if let Some(threshold) = self.config.score_threshold {
            records.retain(|r| r.score >= threshold);
        }
        if let Some(limit) = self.config.rerank_top_k {
            records.truncate(limit);
        }

        records
    }
}
