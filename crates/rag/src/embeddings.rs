//! Text embedding backend and vector fusion
//!
//! Text embeddings come from an Ollama endpoint; image embeddings from the
//! CLIP sidecar in [`crate::image`]. `EmbeddingAdapter` pairs the two and
//! enforces that both produce vectors of the same dimensionality, since
//! fused queries are only meaningful inside one space.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use docqa_core::{Error, Result, TextEmbedder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::RagError;

/// Ollama text embedding settings
#[derive(Debug, Clone)]
pub struct TextEmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    /// Expected output dimensionality
    pub dim: usize,
    pub timeout_secs: u64,
}

impl Default for TextEmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: docqa_config::constants::endpoints::OLLAMA_DEFAULT.to_string(),
            model: docqa_config::constants::llm::EMBEDDING_MODEL.to_string(),
            dim: docqa_config::constants::index::VECTOR_DIM,
            timeout_secs: docqa_config::constants::llm::TIMEOUT_SECS,
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Text embedder backed by Ollama's `/api/embeddings` endpoint
pub struct OllamaTextEmbedder {
    config: TextEmbeddingConfig,
    client: reqwest::Client,
}

impl OllamaTextEmbedder {
    pub fn new(config: TextEmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Embedding(format!("building http client: {e}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl TextEmbedder for OllamaTextEmbedder {
    #[instrument(skip(self, text), fields(model = %self.config.model))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("cannot embed empty text".to_string()));
        }

        let url = format!("{}/api/embeddings", self.config.endpoint);
        let request = EmbedRequest {
            model: &self.config.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("embedding request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Embedding(format!("embedding request failed: {e}")))?;

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("decoding embedding response: {e}")))?;

        if parsed.embedding.len() != self.config.dim {
            return Err(Error::Embedding(format!(
                "model returned {} dims, expected {}",
                parsed.embedding.len(),
                self.config.dim
            )));
        }

        debug!(chars = text.len(), "embedded text");
        Ok(parsed.embedding)
    }

    fn dim(&self) -> usize {
        self.config.dim
    }
}

/// Pairs the text and image embedders and checks dimensional compatibility
/// once at construction
///
/// All vectors leaving the adapter are unit L2 norm, which the fusion and
/// cosine scoring downstream rely on.
#[derive(Clone)]
pub struct EmbeddingAdapter {
    text: Arc<dyn TextEmbedder>,
    image: Arc<dyn docqa_core::ImageEmbedder>,
}

impl EmbeddingAdapter {
    pub fn new(
        text: Arc<dyn TextEmbedder>,
        image: Arc<dyn docqa_core::ImageEmbedder>,
    ) -> std::result::Result<Self, RagError> {
        if text.dim() != image.dim() {
            return Err(RagError::DimensionMismatch {
                text_dim: text.dim(),
                image_dim: image.dim(),
            });
        }
        Ok(Self { text, image })
    }

    /// Embed text for indexing or text-only retrieval, unit normalized
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        renormalized(self.text.embed(text).await?)
    }

    /// Embed an image file, unit normalized
    pub async fn embed_image(&self, path: &Path) -> Result<Vec<f32>> {
        renormalized(self.image.embed_image(path).await?)
    }

    /// Fused query embedding for a text+image query
    ///
    /// Both halves come from the image embedder's towers so they share one
    /// space; the text-indexing embedder lives in a different one.
    pub async fn embed_fused(&self, text: &str, image: &Path) -> Result<Vec<f32>> {
        let text_vec = renormalized(self.image.embed_text(text).await?)?;
        let image_vec = renormalized(self.image.embed_image(image).await?)?;
        fuse_vectors(&text_vec, &image_vec).map_err(Error::from)
    }

    pub fn text(&self) -> &Arc<dyn TextEmbedder> {
        &self.text
    }

    pub fn image(&self) -> &Arc<dyn docqa_core::ImageEmbedder> {
        &self.image
    }

    pub fn dim(&self) -> usize {
        self.text.dim()
    }
}

/// Unit-normalize a backend vector, rejecting degenerate outputs
fn renormalized(v: Vec<f32>) -> Result<Vec<f32>> {
    let magnitude = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude <= f32::EPSILON {
        return Err(Error::Embedding(
            "backend returned a zero-magnitude embedding".to_string(),
        ));
    }
    if (magnitude - 1.0).abs() <= 1e-4 {
        return Ok(v);
    }
    Ok(v.iter().map(|x| x / magnitude).collect())
}

/// Fuse two embeddings into one query vector
///
/// Element-wise mean, renormalized to unit length. If the mean degenerates
/// to (near) zero magnitude the unnormalized mean is returned so the query
/// still carries whatever signal is left.
pub fn fuse_vectors(a: &[f32], b: &[f32]) -> std::result::Result<Vec<f32>, RagError> {
    if a.len() != b.len() {
        return Err(RagError::DimensionMismatch {
            text_dim: a.len(),
            image_dim: b.len(),
        });
    }

    let mean: Vec<f32> = a.iter().zip(b).map(|(x, y)| (x + y) / 2.0).collect();
    let magnitude = mean.iter().map(|v| v * v).sum::<f32>().sqrt();

    if magnitude <= f32::EPSILON {
        return Ok(mean);
    }

    Ok(mean.iter().map(|v| v / magnitude).collect())
}

/// Normalize a vector to unit length; zero vectors pass through untouched
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let magnitude = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude <= f32::EPSILON {
        return v.to_vec();
    }
    v.iter().map(|x| x / magnitude).collect()
}

/// Cosine similarity between two vectors of equal length
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
