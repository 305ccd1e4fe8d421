//! Document loaders
//!
//! Each loader turns one source format into a sequence of `DocumentPage`s.
//! The registry dispatches on file extension so the ingestion pipeline stays
//! format-agnostic.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use docqa_core::{DocumentLoader, DocumentPage, Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static HTML_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?si)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
static HTML_IMG_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src\s*=\s*["']([^"']+)["']"#).unwrap());

/// Loads plain text and markdown files as a single page
#[derive(Debug, Default)]
pub struct PlainTextLoader;

#[async_trait]
impl DocumentLoader for PlainTextLoader {
    async fn load(&self, path: &Path) -> Result<Vec<DocumentPage>> {
        let text = tokio::fs::read_to_string(path).await?;
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "document is empty: {}",
                path.display()
            )));
        }
        Ok(vec![DocumentPage::new(text)])
    }

    fn extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}

/// Fetches a URL and strips HTML down to visible text
///
/// Image tags are collected as `image_paths` entries (absolute URLs only)
/// so the pipeline can embed them alongside the page text.
#[derive(Debug, Clone)]
pub struct UrlLoader {
    client: reqwest::Client,
}

impl Default for UrlLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetch and convert one URL into a single document page
    pub async fn load_url(&self, url: &str) -> Result<Vec<DocumentPage>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Rag(format!("fetching {url}: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Rag(format!("fetching {url}: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| Error::Rag(format!("reading body of {url}: {e}")))?;

        let image_paths = extract_image_urls(&body);
        let text = strip_html(&body);
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(format!("no text content at {url}")));
        }

        debug!(url, images = image_paths.len(), "loaded url");

        let mut page = DocumentPage::new(text);
        page.image_paths = image_paths;
        Ok(vec![page])
    }
}

/// Extension-keyed loader dispatch
pub struct LoaderRegistry {
    loaders: HashMap<String, Arc<dyn DocumentLoader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let mut registry = Self {
            loaders: HashMap::new(),
        };
        registry.register(Arc::new(PlainTextLoader));
        registry
    }
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loader for every extension it claims; later registrations
    /// win on conflict
    pub fn register(&mut self, loader: Arc<dyn DocumentLoader>) {
        for ext in loader.extensions() {
            self.loaders.insert(ext.to_lowercase(), loader.clone());
        }
    }

    /// Load a file using whichever loader claims its extension
    pub async fn load(&self, path: &Path) -> Result<Vec<DocumentPage>> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| {
                Error::InvalidInput(format!("no file extension: {}", path.display()))
            })?;

        let loader = self.loaders.get(&ext).ok_or_else(|| {
            Error::InvalidInput(format!("unsupported document type: .{ext}"))
        })?;

        loader.load(path).await
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.loaders.keys().cloned().collect();
        exts.sort();
        exts
    }
}

fn strip_html(html: &str) -> String {
    let without_scripts = HTML_SCRIPT.replace_all(html, " ");
    let text = HTML_TAG.replace_all(&without_scripts, " ");
    // Minimal entity handling; full decoding is not needed for retrieval
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

fn extract_image_urls(html: &str) -> Vec<String> {
    HTML_IMG_SRC
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .filter(|src| src.starts_with("http://") || src.starts_with("https://"))
        .collect()
}
