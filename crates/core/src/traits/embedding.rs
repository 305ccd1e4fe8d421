//! Embedding traits

use std::path::Path;

use async_trait::async_trait;

use crate::Result;

/// Text embedder producing fixed-length, L2-normalized vectors
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts
    ///
    /// The default issues sequential calls; implementations with a batch API
    /// should override.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Output dimensionality
    fn dim(&self) -> usize;
}

/// Image embedder with a paired text tower (CLIP-style)
///
/// `embed_text` embeds candidate label text into the *same* space as
/// `embed_image`, which is what makes zero-shot classification and
/// text/image fusion valid.
#[async_trait]
pub trait ImageEmbedder: Send + Sync {
    /// Embed an image from a file path
    async fn embed_image(&self, path: &Path) -> Result<Vec<f32>>;

    /// Embed label text into the image space
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Output dimensionality
    fn dim(&self) -> usize;
}
