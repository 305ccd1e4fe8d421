//! Image embedding and zero-shot classification
//!
//! Talks to a CLIP sidecar service over HTTP. The sidecar exposes the two
//! towers of the model: `/embed/image` takes a filesystem path, `/embed/text`
//! takes a label or caption. Both return vectors in the same space, which is
//! what makes zero-shot label matching and cross-modal retrieval work.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use docqa_core::{Error, ImageEmbedder, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::embeddings::cosine_similarity;

/// CLIP sidecar settings
#[derive(Debug, Clone)]
pub struct ClipEmbeddingConfig {
    pub endpoint: String,
    /// Expected output dimensionality of both towers
    pub dim: usize,
    pub timeout_secs: u64,
}

impl Default for ClipEmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: docqa_config::constants::endpoints::CLIP_DEFAULT.to_string(),
            dim: docqa_config::constants::index::VECTOR_DIM,
            timeout_secs: docqa_config::constants::llm::TIMEOUT_SECS,
        }
    }
}

#[derive(Serialize)]
struct ImageEmbedRequest<'a> {
    image_path: &'a str,
}

#[derive(Serialize)]
struct TextEmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct ClipEmbedResponse {
    embedding: Vec<f32>,
}

/// CLIP embedder backed by the HTTP sidecar
pub struct ClipHttpEmbedder {
    config: ClipEmbeddingConfig,
    client: reqwest::Client,
}

impl ClipHttpEmbedder {
    pub fn new(config: ClipEmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Embedding(format!("building http client: {e}")))?;
        Ok(Self { config, client })
    }

    async fn post_embed<T: Serialize>(&self, route: &str, body: &T) -> Result<Vec<f32>> {
        let url = format!("{}{}", self.config.endpoint, route);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("clip request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Embedding(format!("clip request failed: {e}")))?;

        let parsed: ClipEmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("decoding clip response: {e}")))?;

        if parsed.embedding.len() != self.config.dim {
            return Err(Error::Embedding(format!(
                "clip returned {} dims, expected {}",
                parsed.embedding.len(),
                self.config.dim
            )));
        }

        Ok(parsed.embedding)
    }
}

#[async_trait]
impl ImageEmbedder for ClipHttpEmbedder {
    #[instrument(skip(self))]
    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>> {
        if !path.exists() {
            return Err(Error::InvalidInput(format!(
                "image not found: {}",
                path.display()
            )));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| Error::InvalidInput("non-utf8 image path".to_string()))?;

        self.post_embed("/embed/image", &ImageEmbedRequest { image_path: path_str })
            .await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("cannot embed empty text".to_string()));
        }
        self.post_embed("/embed/text", &TextEmbedRequest { text }).await
    }

    fn dim(&self) -> usize {
        self.config.dim
    }
}

/// Zero-shot image classifier
///
/// Labels an image by cosine similarity between its embedding and the
/// embeddings of a fixed candidate vocabulary. Ties resolve to the earliest
/// label in the list.
pub struct ImageClassifier {
    embedder: Arc<dyn ImageEmbedder>,
    labels: Vec<String>,
}

impl ImageClassifier {
    pub fn new(embedder: Arc<dyn ImageEmbedder>, labels: Vec<String>) -> Self {
        Self { embedder, labels }
    }

    /// Classifier over the default label vocabulary
    pub fn with_default_labels(embedder: Arc<dyn ImageEmbedder>) -> Self {
        let labels = docqa_config::constants::classification::CANDIDATE_LABELS
            .iter()
            .map(|l| l.to_string())
            .collect();
        Self::new(embedder, labels)
    }

    /// Best-scoring candidate label for an already-embedded image
    pub async fn classify_embedding(&self, image_vec: &[f32]) -> Result<String> {
        if self.labels.is_empty() {
            return Err(Error::InvalidInput(
                "classifier has no candidate labels".to_string(),
            ));
        }

        let mut best: Option<(usize, f32)> = None;
        for (i, label) in self.labels.iter().enumerate() {
            let label_vec = self.embedder.embed_text(label).await?;
            let score = cosine_similarity(image_vec, &label_vec);
            // Strict greater-than keeps the first label on ties
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        let (idx, score) = best.ok_or_else(|| {
            Error::InvalidInput("classifier has no candidate labels".to_string())
        })?;
        debug!(label = %self.labels[idx], score, "classified image");
        Ok(self.labels[idx].clone())
    }

    /// Embed and classify an image file
    pub async fn classify(&self, path: &Path) -> Result<String> {
        let image_vec = self.embedder.embed_image(path).await?;
        self.classify_embedding(&image_vec).await
    }

    /// Classify, falling back to the unknown sentinel on any failure
    pub async fn classify_or_unknown(&self, path: &Path) -> String {
        match self.classify(path).await {
            Ok(label) => label,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "image classification failed");
                docqa_config::constants::classification::UNKNOWN_LABEL.to_string()
            },
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Embedder with canned vectors per label text
    struct FakeClipEmbedder {
        image_vec: Vec<f32>,
        label_vecs: HashMap<String, Vec<f32>>,
    }

    #[async_trait]
    impl ImageEmbedder for FakeClipEmbedder {
        async fn embed_image(&self, _path: &Path) -> Result<Vec<f32>> {
            Ok(self.image_vec.clone())
        }

        async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
            self.label_vecs
                .get(text)
                .cloned()
                .ok_or_else(|| Error::Embedding(format!("no vector for {text}")))
        }

        fn dim(&self) -> usize {
            3
        }
    }

    #[tokio::test]
    async fn test_classify_picks_highest_cosine() {
        let embedder = FakeClipEmbedder {
            image_vec: vec![1.0, 0.0, 0.0],
            label_vecs: HashMap::from([
                ("chart".to_string(), vec![0.0, 1.0, 0.0]),
                ("diagram".to_string(), vec![0.9, 0.1, 0.0]),
                ("table".to_string(), vec![0.0, 0.0, 1.0]),
            ]),
        };
        let classifier = ImageClassifier::new(
            Arc::new(embedder),
            vec!["chart".into(), "diagram".into(), "table".into()],
        );

        let label = classifier.classify(Path::new("/fake.png")).await.unwrap();
        assert_eq!(label, "diagram");
    }

    #[tokio::test]
    async fn test_ties_resolve_to_first_label() {
        let embedder = FakeClipEmbedder {
            image_vec: vec![1.0, 0.0, 0.0],
            label_vecs: HashMap::from([
                ("chart".to_string(), vec![1.0, 0.0, 0.0]),
                ("diagram".to_string(), vec![1.0, 0.0, 0.0]),
            ]),
        };
        let classifier = ImageClassifier::new(
            Arc::new(embedder),
            vec!["chart".into(), "diagram".into()],
        );

        let label = classifier.classify(Path::new("/fake.png")).await.unwrap();
        assert_eq!(label, "chart");
    }

    #[tokio::test]
    async fn test_unknown_on_failure() {
        let embedder = FakeClipEmbedder {
            image_vec: vec![1.0, 0.0, 0.0],
            label_vecs: HashMap::new(),
        };
        let classifier =
            ImageClassifier::new(Arc::new(embedder), vec!["chart".into()]);

        let label = classifier.classify_or_unknown(Path::new("/fake.png")).await;
        assert_eq!(label, "unknown");
    }
}
