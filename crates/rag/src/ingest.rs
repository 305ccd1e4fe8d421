//! Document ingestion pipeline
//!
//! Load, clean, chunk, embed, upsert. Re-ingesting a file replaces its
//! previous records, but the old generation is only deleted once every new
//! record has embedded, so a failed re-ingest leaves the index queryable.
//! Index failures during ingestion are fatal; the error reports how far the
//! pipeline got.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use docqa_core::{
    DocumentPage, Error, ImageMetadata, IndexFilter, RecordMetadata, Result, VectorIndex,
    VectorRecord,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::chunker::{ChunkSource, TextChunker};
use crate::cleaner::clean_document_text;
use crate::embeddings::EmbeddingAdapter;
use crate::image::ImageClassifier;
use crate::loader::{LoaderRegistry, UrlLoader};
use crate::RagError;

/// Outcome of one ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub filename: String,
    pub pages: usize,
    pub chunks_indexed: usize,
    pub images_indexed: usize,
    /// Images that failed to embed and were skipped
    pub images_skipped: usize,
}

/// Ingestion settings
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Apply whitespace/header cleanup before chunking
    pub clean_text: bool,
    /// Characters of neighbor text spliced into each chunk; None disables
    /// context enrichment
    pub context_window: Option<usize>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: docqa_config::constants::chunking::CHUNK_SIZE,
            chunk_overlap: docqa_config::constants::chunking::CHUNK_OVERLAP,
            clean_text: true,
            context_window: Some(docqa_config::constants::chunking::CONTEXT_WINDOW),
        }
    }
}

impl From<docqa_config::ChunkingConfig> for IngestConfig {
    fn from(c: docqa_config::ChunkingConfig) -> Self {
        Self {
            chunk_size: c.chunk_size,
            chunk_overlap: c.chunk_overlap,
            clean_text: c.clean_text,
            context_window: c.context_window,
        }
    }
}

/// End-to-end document ingestion
pub struct IngestPipeline {
    registry: LoaderRegistry,
    url_loader: UrlLoader,
    chunker: TextChunker,
    clean_text: bool,
    context_window: Option<usize>,
    embedders: EmbeddingAdapter,
    classifier: ImageClassifier,
    index: Arc<dyn VectorIndex>,
}

impl IngestPipeline {
    pub fn new(
        config: IngestConfig,
        registry: LoaderRegistry,
        embedders: EmbeddingAdapter,
        classifier: ImageClassifier,
        index: Arc<dyn VectorIndex>,
    ) -> std::result::Result<Self, RagError> {
        let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            registry,
            url_loader: UrlLoader::new(),
            chunker,
            clean_text: config.clean_text,
            context_window: config.context_window,
            embedders,
            classifier,
            index,
        })
    }

    /// Ingest a local file
    #[instrument(skip(self))]
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidInput(format!("bad path: {}", path.display())))?
            .to_string();

        let pages = self.registry.load(path).await?;
        self.ingest_pages(&path.display().to_string(), &filename, pages)
            .await
    }

    /// Fetch and ingest a URL
    #[instrument(skip(self))]
    pub async fn ingest_url(&self, url: &str) -> Result<IngestReport> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::InvalidInput(format!(
                "only http(s) urls are supported: {url}"
            )));
        }
        let filename = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(url)
            .to_string();

        let pages = self.url_loader.load_url(url).await?;
        self.ingest_pages(url, &filename, pages).await
    }

    /// Remove every record belonging to a previously ingested file
    pub async fn delete_file(&self, filename: &str) -> Result<()> {
        if filename.trim().is_empty() {
            return Err(Error::InvalidInput("filename is empty".to_string()));
        }
        self.index.delete(&IndexFilter::filename(filename)).await
    }

    async fn ingest_pages(
        &self,
        source: &str,
        filename: &str,
        pages: Vec<DocumentPage>,
    ) -> Result<IngestReport> {
        if pages.is_empty() {
            return Err(Error::InvalidInput(format!("no pages in {source}")));
        }

        let timestamp = Utc::now();
        let page_count = pages.len();
        let mut records = Vec::new();
        let mut chunks_indexed = 0usize;
        let mut images_indexed = 0usize;
        let mut images_skipped = 0usize;

        for (page_no, page) in pages.iter().enumerate() {
            let page_number = page.page.or(if page_count > 1 {
                Some(page_no as u32 + 1)
            } else {
                None
            });

            let text = if self.clean_text {
                clean_document_text(&page.text, true)
            } else {
                page.text.clone()
            };

            let chunk_source = ChunkSource {
                source: source.to_string(),
                filename: filename.to_string(),
                page: page_number,
                timestamp,
                image_refs: page.image_paths.clone(),
            };

            let chunks = match self.context_window {
                Some(window) if window > 0 => {
                    self.chunker.chunk_with_context(&text, &chunk_source, window)
                },
                _ => self.chunker.chunk(&text, &chunk_source),
            };

            for chunk in chunks {
                let vector = self.embedders.embed_text(&chunk.text).await.map_err(|e| {
                    Error::Rag(format!(
                        "embedding chunk {} of {filename} failed after indexing \
                         {chunks_indexed} chunks: {e}",
                        chunk.metadata.chunk_index
                    ))
                })?;

                records.push(VectorRecord {
                    id: Uuid::new_v4().to_string(),
                    vector,
                    content: chunk.text,
                    metadata: RecordMetadata::Chunk(chunk.metadata),
                });
                chunks_indexed += 1;
            }

            for image_path in &page.image_paths {
                let path = Path::new(image_path);
                let vector = match self.embedders.embed_image(path).await {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(image = %image_path, error = %e, "skipping image");
                        images_skipped += 1;
                        continue;
                    },
                };
                let label = self.classifier.classify_or_unknown(path).await;
                let image_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(image_path);

                records.push(VectorRecord {
                    id: Uuid::new_v4().to_string(),
                    vector,
                    content: format!("Image Type: {label}\nImage File: {image_name}"),
                    metadata: RecordMetadata::Image(ImageMetadata {
                        source: source.to_string(),
                        filename: filename.to_string(),
                        page: page_number,
                        label,
                        image_path: image_path.clone(),
                        timestamp,
                    }),
                });
                images_indexed += 1;
            }
        }

        if records.is_empty() {
            return Err(Error::InvalidInput(format!(
                "nothing to index in {source}"
            )));
        }

        // Swap generations only now that every record embedded; a failure
        // above leaves the previous generation in place
        self.index.delete(&IndexFilter::filename(filename)).await?;

        self.index.upsert(records).await.map_err(|e| {
            Error::Rag(format!(
                "indexing {filename} failed ({chunks_indexed} chunks, \
                 {images_indexed} images prepared): {e}"
            ))
        })?;

        info!(
            filename,
            pages = page_count,
            chunks = chunks_indexed,
            images = images_indexed,
            skipped = images_skipped,
            "ingestion complete"
        );

        Ok(IngestReport {
            source: source.to_string(),
            filename: filename.to_string(),
            pages: page_count,
            chunks_indexed,
            images_indexed,
            images_skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docqa_core::{ChunkMetadata, ImageEmbedder, ScoredRecord, TextEmbedder};
    use std::sync::Mutex;

    struct FakeTextEmbedder;

    #[async_trait]
    impl TextEmbedder for FakeTextEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dim(&self) -> usize {
            2
        }
    }

    struct FailingTextEmbedder;

    #[async_trait]
    impl TextEmbedder for FailingTextEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::Embedding("ollama down".to_string()))
        }

        fn dim(&self) -> usize {
            2
        }
    }

    struct FakeImageEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl ImageEmbedder for FakeImageEmbedder {
        async fn embed_image(&self, _path: &Path) -> Result<Vec<f32>> {
            if self.fail {
                return Err(Error::Embedding("clip down".to_string()));
            }
            Ok(vec![0.0, 1.0])
        }

        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0, 1.0])
        }

        fn dim(&self) -> usize {
            2
        }
    }

    /// Records upserts and deletes in memory, keyed by filename
    #[derive(Default)]
    struct FakeIndex {
        records: Mutex<Vec<VectorRecord>>,
        deletes: Mutex<Vec<IndexFilter>>,
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
            self.records.lock().unwrap().extend(records);
            Ok(())
        }

        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _filter: Option<&IndexFilter>,
        ) -> Result<Vec<ScoredRecord>> {
            Ok(Vec::new())
        }

        async fn delete(&self, filter: &IndexFilter) -> Result<()> {
            self.deletes.lock().unwrap().push(filter.clone());
            if let Some(ref filename) = filter.filename {
                self.records
                    .lock()
                    .unwrap()
                    .retain(|r| r.metadata.filename() != filename);
            }
            Ok(())
        }
    }

    fn pipeline(index: Arc<FakeIndex>, image_fail: bool) -> IngestPipeline {
        let image_embedder: Arc<dyn ImageEmbedder> =
            Arc::new(FakeImageEmbedder { fail: image_fail });
        let classifier = ImageClassifier::new(image_embedder.clone(), vec!["chart".into()]);
        IngestPipeline::new(
            IngestConfig {
                chunk_size: 50,
                chunk_overlap: 10,
                clean_text: true,
                context_window: None,
            },
            LoaderRegistry::new(),
            EmbeddingAdapter::new(Arc::new(FakeTextEmbedder), image_embedder).unwrap(),
            classifier,
            index,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_file_indexes_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Some interesting fact. ".repeat(10)).unwrap();

        let index = Arc::new(FakeIndex::default());
        let report = pipeline(index.clone(), false)
            .ingest_file(&path)
            .await
            .unwrap();

        assert_eq!(report.filename, "notes.txt");
        assert_eq!(report.pages, 1);
        assert!(report.chunks_indexed > 1);
        assert_eq!(report.images_indexed, 0);
        assert_eq!(
            index.records.lock().unwrap().len(),
            report.chunks_indexed
        );
    }

    #[tokio::test]
    async fn test_reingest_replaces_previous_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Short document body here.").unwrap();

        let index = Arc::new(FakeIndex::default());
        let p = pipeline(index.clone(), false);

        p.ingest_file(&path).await.unwrap();
        let first_count = index.records.lock().unwrap().len();
        p.ingest_file(&path).await.unwrap();

        assert_eq!(index.records.lock().unwrap().len(), first_count);
        // One delete per ingestion run
        assert_eq!(index.deletes.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_reingest_keeps_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Replacement body that never embeds.").unwrap();

        let index = Arc::new(FakeIndex::default());
        index.records.lock().unwrap().push(VectorRecord {
            id: "prev".to_string(),
            vector: vec![1.0, 0.0],
            content: "Original body.".to_string(),
            metadata: RecordMetadata::Chunk(ChunkMetadata {
                source: path.display().to_string(),
                filename: "notes.txt".to_string(),
                page: None,
                chunk_index: 0,
                total_chunks: 1,
                timestamp: Utc::now(),
                image_refs: Vec::new(),
            }),
        });

        let image_embedder: Arc<dyn ImageEmbedder> =
            Arc::new(FakeImageEmbedder { fail: false });
        let p = IngestPipeline::new(
            IngestConfig {
                chunk_size: 50,
                chunk_overlap: 10,
                clean_text: true,
                context_window: None,
            },
            LoaderRegistry::new(),
            EmbeddingAdapter::new(Arc::new(FailingTextEmbedder), image_embedder.clone())
                .unwrap(),
            ImageClassifier::new(image_embedder, vec!["chart".into()]),
            index.clone(),
        )
        .unwrap();

        assert!(p.ingest_file(&path).await.is_err());
        // The old generation is untouched and was never deleted
        assert_eq!(index.records.lock().unwrap().len(), 1);
        assert!(index.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_context_window_splices_neighbor_text() {
        let index = Arc::new(FakeIndex::default());
        let image_embedder: Arc<dyn ImageEmbedder> =
            Arc::new(FakeImageEmbedder { fail: false });
        let p = IngestPipeline::new(
            IngestConfig {
                chunk_size: 50,
                chunk_overlap: 10,
                clean_text: false,
                context_window: Some(12),
            },
            LoaderRegistry::new(),
            EmbeddingAdapter::new(Arc::new(FakeTextEmbedder), image_embedder.clone()).unwrap(),
            ImageClassifier::new(image_embedder, vec!["chart".into()]),
            index.clone(),
        )
        .unwrap();

        let text = "First paragraph of the document.\n\nSecond paragraph follows here.";
        p.ingest_pages("/tmp/doc.txt", "doc.txt", vec![DocumentPage::new(text)])
            .await
            .unwrap();

        let records = index.records.lock().unwrap();
        assert!(records.len() >= 2);
        assert!(records[0].content.contains("[Next context:"));
        assert!(records.last().unwrap().content.contains("[Previous context:"));
    }

    #[tokio::test]
    async fn test_multi_page_chunks_carry_page_numbers() {
        let index = Arc::new(FakeIndex::default());
        let p = pipeline(index.clone(), false);

        let pages = vec![
            DocumentPage::new("Page one text.").with_page(1),
            DocumentPage::new("Page two text.").with_page(2),
            DocumentPage::new("Page three text.").with_page(3),
        ];
        let report = p.ingest_pages("/tmp/doc.pdf", "doc.pdf", pages).await.unwrap();

        assert_eq!(report.pages, 3);
        let records = index.records.lock().unwrap();
        let pages_seen: Vec<Option<u32>> =
            records.iter().map(|r| r.metadata.page()).collect();
        assert!(pages_seen.contains(&Some(1)));
        assert!(pages_seen.contains(&Some(3)));
    }

    #[tokio::test]
    async fn test_failed_image_is_skipped_not_fatal() {
        let index = Arc::new(FakeIndex::default());
        let p = pipeline(index.clone(), true);

        let mut page = DocumentPage::new("Body text with a figure.");
        page.image_paths = vec!["/tmp/missing.png".to_string()];
        let report = p
            .ingest_pages("/tmp/doc.pdf", "doc.pdf", vec![page])
            .await
            .unwrap();

        assert_eq!(report.images_indexed, 0);
        assert_eq!(report.images_skipped, 1);
        assert!(report.chunks_indexed > 0);
    }

    #[tokio::test]
    async fn test_url_scheme_validated() {
        let index = Arc::new(FakeIndex::default());
        let p = pipeline(index, false);
        assert!(matches!(
            p.ingest_url("ftp://example.com/doc").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_file_rejects_empty_name() {
        let index = Arc::new(FakeIndex::default());
        let p = pipeline(index, false);
        assert!(p.delete_file("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_image_records_get_labels() {
        let index = Arc::new(FakeIndex::default());
        let p = pipeline(index.clone(), false);

        let mut page = DocumentPage::new("Body text near the chart.");
        page.image_paths = vec!["/tmp/fig.png".to_string()];
        p.ingest_pages("/tmp/doc.pdf", "doc.pdf", vec![page])
            .await
            .unwrap();

        let records = index.records.lock().unwrap();
        let image_record = records
            .iter()
            .find(|r| matches!(r.metadata, RecordMetadata::Image(_)))
            .expect("image record indexed");
        match &image_record.metadata {
            RecordMetadata::Image(m) => assert_eq!(m.label, "chart"),
            _ => unreachable!(),
        }
    }
}
