//! Document loader trait
//!
//! Parsing/extraction libraries (PDF readers, DOCX readers, OCR) are
//! external collaborators. The core only consumes their output: a list of
//! pages, each with extracted text and the paths of any images pulled out of
//! that page.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Extracted content for one page (or one unpaginated document)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    /// Raw extracted text
    pub text: String,
    /// 1-based page number, if the source is paginated
    pub page: Option<u32>,
    /// Paths of images extracted from this page
    #[serde(default)]
    pub image_paths: Vec<String>,
}

impl DocumentPage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: None,
            image_paths: Vec::new(),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Loader for one family of document formats
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load and extract a document
    async fn load(&self, path: &Path) -> Result<Vec<DocumentPage>>;

    /// File extensions this loader handles (lowercase, without the dot)
    fn extensions(&self) -> &[&str];
}
