//! Context composition
//!
//! Assembles retrieved records into the context block handed to the
//! generation model, with bracketed citations so the answer can point back
//! at its evidence. Also produces the deduplicated source list surfaced to
//! the caller alongside the answer.

use docqa_core::{RecordKind, ScoredRecord};

/// Returned by [`ContextComposer::compose`] when there is nothing to cite
pub const NO_CONTEXT: &str = "No relevant documents found.";

/// One citation entry, deduplicated across records
#[derive(Debug, Clone)]
pub struct SourceRef {
    pub filename: String,
    pub page: Option<u32>,
    pub kind: RecordKind,
    /// Best retrieval score among the records behind this entry
    pub score: f32,
}

impl SourceRef {
    fn from_record(record: &ScoredRecord) -> Self {
        Self {
            filename: record.metadata.filename().to_string(),
            page: record.metadata.page(),
            kind: record.metadata.kind(),
            score: record.score,
        }
    }

    fn same_origin(&self, other: &Self) -> bool {
        self.filename == other.filename && self.page == other.page && self.kind == other.kind
    }

    /// Human-readable citation text
    pub fn display(&self) -> String {
        let mut out = self.filename.clone();
        if let Some(page) = self.page {
            out.push_str(&format!(", Page {page}"));
        }
        if self.kind == RecordKind::Image {
            out.push_str(" (image)");
        }
        out
    }
}

/// Builds the model-facing context block from retrieved records
#[derive(Debug, Clone, Default)]
pub struct ContextComposer;

impl ContextComposer {
    pub fn new() -> Self {
        Self
    }

    /// Compose the context block, records in retrieval order
    ///
    /// Each record is prefixed with a bracketed citation header; blocks are
    /// separated by a horizontal rule. Empty input yields the
    /// [`NO_CONTEXT`] sentinel. No truncation happens here; the token
    /// budget is the caller's concern.
    pub fn compose(&self, records: &[ScoredRecord]) -> String {
        if records.is_empty() {
            return NO_CONTEXT.to_string();
        }

        let sections: Vec<String> = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let source = SourceRef::from_record(record);
                format!("[Source {}: {}]\n{}", i + 1, source.display(), record.content)
            })
            .collect();

        sections.join("\n\n---\n\n")
    }

    /// Deduplicated source list in first-seen order
    ///
    /// Records sharing filename, page, and modality collapse into one entry
    /// carrying the best score.
    pub fn sources(&self, records: &[ScoredRecord]) -> Vec<SourceRef> {
        let mut seen: Vec<SourceRef> = Vec::new();
        for record in records {
            let source = SourceRef::from_record(record);
            match seen.iter_mut().find(|s| s.same_origin(&source)) {
                Some(existing) => existing.score = existing.score.max(source.score),
                None => seen.push(source),
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docqa_core::{ChunkMetadata, ImageMetadata, RecordMetadata};

    fn chunk(content: &str, filename: &str, page: Option<u32>, score: f32) -> ScoredRecord {
        ScoredRecord {
            id: "id".to_string(),
            score,
            content: content.to_string(),
            metadata: RecordMetadata::Chunk(ChunkMetadata {
                source: format!("/tmp/{filename}"),
                filename: filename.to_string(),
                page,
                chunk_index: 0,
                total_chunks: 1,
                timestamp: Utc::now(),
                image_refs: Vec::new(),
            }),
        }
    }

    fn image(label: &str, filename: &str) -> ScoredRecord {
        ScoredRecord {
            id: "img".to_string(),
            score: 0.7,
            content: format!("Image Type: {label}\nImage File: fig.png"),
            metadata: RecordMetadata::Image(ImageMetadata {
                source: format!("/tmp/{filename}"),
                filename: filename.to_string(),
                page: Some(3),
                label: label.to_string(),
                image_path: "/tmp/fig.png".to_string(),
                timestamp: Utc::now(),
            }),
        }
    }

    #[test]
    fn test_compose_with_citations() {
        let composer = ContextComposer::new();
        let records = vec![
            chunk("Revenue grew 12%.", "report.pdf", Some(2), 0.9),
            chunk("Costs were flat.", "report.pdf", Some(3), 0.8),
        ];

        let context = composer.compose(&records);
        assert!(context.contains("[Source 1: report.pdf, Page 2]"));
        assert!(context.contains("[Source 2: report.pdf, Page 3]"));
        assert!(context.contains("\n\n---\n\n"));
        // Retrieval order is preserved
        assert!(context.find("Revenue").unwrap() < context.find("Costs").unwrap());
    }

    #[test]
    fn test_image_record_marked_in_header() {
        let composer = ContextComposer::new();
        let context = composer.compose(&[image("chart", "slides.pdf")]);
        assert!(context.contains("[Source 1: slides.pdf, Page 3 (image)]"));
        assert!(context.contains("Image Type: chart"));
    }

    #[test]
    fn test_empty_records_compose_sentinel() {
        let composer = ContextComposer::new();
        assert_eq!(composer.compose(&[]), NO_CONTEXT);
        assert!(composer.sources(&[]).is_empty());
    }

    #[test]
    fn test_sources_deduplicated_keeping_best_score() {
        let composer = ContextComposer::new();
        let records = vec![
            chunk("a", "report.pdf", Some(2), 0.6),
            chunk("b", "report.pdf", Some(2), 0.9),
            chunk("c", "other.pdf", None, 0.5),
        ];

        let sources = composer.sources(&records);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].display(), "report.pdf, Page 2");
        assert_eq!(sources[0].score, 0.9);
        assert_eq!(sources[1].display(), "other.pdf");
    }

    #[test]
    fn test_text_and_image_from_same_page_stay_separate() {
        let composer = ContextComposer::new();
        let records = vec![chunk("a", "slides.pdf", Some(3), 0.8), image("chart", "slides.pdf")];
        assert_eq!(composer.sources(&records).len(), 2);
    }
}
