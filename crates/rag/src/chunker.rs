//! Recursive character chunking
//!
//! Splits normalized text into overlapping fixed-size segments using a
//! recursive separator strategy: paragraphs first, then lines, then words,
//! then single characters as the last resort. Sizes are in characters.
//!
//! # Usage
//!
//! ```ignore
//! use docqa_rag::chunker::{TextChunker, ChunkSource};
//!
//! let chunker = TextChunker::new(1000, 200)?;
//! let chunks = chunker.chunk("Long document text...", &source);
//! ```

use chrono::{DateTime, Utc};
use docqa_core::ChunkMetadata;
use serde::{Deserialize, Serialize};

use crate::RagError;

/// Separator cascade, coarsest first; the empty string is the
/// character-level fallback
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Provenance shared by every chunk cut from one page
#[derive(Debug, Clone)]
pub struct ChunkSource {
    /// Original source (file path or URL)
    pub source: String,
    /// Display filename
    pub filename: String,
    /// Page number, if paginated
    pub page: Option<u32>,
    /// Ingestion timestamp
    pub timestamp: DateTime<Utc>,
    /// Paths of images extracted from the same page
    pub image_refs: Vec<String>,
}

impl ChunkSource {
    pub fn new(source: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filename: filename.into(),
            page: None,
            timestamp: Utc::now(),
            image_refs: Vec::new(),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_image_refs(mut self, refs: Vec<String>) -> Self {
        self.image_refs = refs;
        self
    }
}

/// A bounded text segment with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Recursive character chunker
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// Create a chunker
    ///
    /// `chunk_overlap` must be strictly smaller than `chunk_size`; the
    /// upstream behavior for the degenerate case was undefined, so it is
    /// rejected here.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split text into overlapping segments of at most `chunk_size` chars
    ///
    /// Any non-empty input yields at least one segment.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let merged = self.split_recursive(text, &SEPARATORS);

        if merged.is_empty() {
            // Pathological input (e.g. one giant unbreakable run shorter
            // than chunk_size after trimming); keep the whole text
            vec![text.trim().to_string()]
        } else {
            merged
        }
    }

    /// Split and attach metadata
    ///
    /// Every chunk inherits the page provenance and gains a contiguous
    /// 0-based `chunk_index` with `total_chunks` constant across the page.
    pub fn chunk(&self, text: &str, source: &ChunkSource) -> Vec<Chunk> {
        let pieces = self.split(text);
        let total = pieces.len();

        pieces
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                text,
                metadata: ChunkMetadata {
                    source: source.source.clone(),
                    filename: source.filename.clone(),
                    page: source.page,
                    chunk_index: i,
                    total_chunks: total,
                    timestamp: source.timestamp,
                    image_refs: source.image_refs.clone(),
                },
            })
            .collect()
    }

    /// Chunk with neighbor context spliced into each chunk's text
    ///
    /// Improves retrieval for chunks whose meaning depends on surrounding
    /// text. `context_window` is the number of characters borrowed from each
    /// neighbor.
    pub fn chunk_with_context(
        &self,
        text: &str,
        source: &ChunkSource,
        context_window: usize,
    ) -> Vec<Chunk> {
        let chunks = self.chunk(text, source);
        if chunks.len() <= 1 || context_window == 0 {
            return chunks;
        }

        let originals: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, mut chunk)| {
                let mut content = chunk.text;
                if i > 0 {
                    let prev = char_suffix(&originals[i - 1], context_window);
                    content = format!("[Previous context: ...{}]\n\n{}", prev, content);
                }
                if i + 1 < originals.len() {
                    let next = char_prefix(&originals[i + 1], context_window);
                    content = format!("{}\n\n[Next context: {}...]", content, next);
                }
                chunk.text = content;
                chunk
            })
            .collect()
    }

    /// Break text into chunks no larger than `chunk_size`, coarsest
    /// separator first; pieces that fit are merged back with the separator
    /// that produced them so in-chunk structure survives
    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (sep, rest) = match separators.split_first() {
            Some(pair) => pair,
            None => return vec![text.to_string()],
        };

        if sep.is_empty() {
            // Character-level fallback: fixed windows
            let chars: Vec<char> = text.chars().collect();
            return chars
                .chunks(self.chunk_size)
                .map(|w| w.iter().collect())
                .collect();
        }

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for part in text.split(sep) {
            if part.is_empty() {
                continue;
            }
            if part.chars().count() <= self.chunk_size {
                fitting.push(part.to_string());
            } else {
                if !fitting.is_empty() {
                    chunks.extend(self.merge_splits(&fitting, sep));
                    fitting.clear();
                }
                chunks.extend(self.split_recursive(part, rest));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge_splits(&fitting, sep));
        }
        chunks
    }

    /// Greedily pack pieces into chunks joined by `sep`, carrying
    /// `chunk_overlap` chars of tail pieces into the next chunk
    fn merge_splits(&self, splits: &[String], sep: &str) -> Vec<String> {
        let sep_len = sep.chars().count();
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_len = 0usize;

        for piece in splits {
            let piece_len = piece.chars().count();
            let joined_len =
                current_len + piece_len + if current.is_empty() { 0 } else { sep_len };

            if joined_len > self.chunk_size && !current.is_empty() {
                let chunk = current.join(sep).trim().to_string();
                if !chunk.is_empty() {
                    chunks.push(chunk);
                }

                // Retain tail pieces up to the overlap budget
                while current_len > self.chunk_overlap
                    || (!current.is_empty()
                        && current_len + piece_len + sep_len > self.chunk_size)
                {
                    let dropped = current.remove(0);
                    current_len = current_len.saturating_sub(
                        dropped.chars().count() + if current.is_empty() { 0 } else { sep_len },
                    );
                    if current.is_empty() {
                        current_len = 0;
                        break;
                    }
                }
            }

            current.push(piece.clone());
            current_len += piece_len + if current.len() > 1 { sep_len } else { 0 };
        }

        let tail = current.join(sep).trim().to_string();
        if !tail.is_empty() {
            chunks.push(tail);
        }

        chunks
    }
}

/// Last `n` characters of `text`, on char boundaries
fn char_suffix(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    let skip = count - n;
    let (idx, _) = text.char_indices().nth(skip).unwrap_or((0, ' '));
    &text[idx..]
}

/// First `n` characters of `text`, on char boundaries
fn char_prefix(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ChunkSource {
        ChunkSource::new("/tmp/doc.pdf", "doc.pdf").with_page(1)
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        assert!(TextChunker::new(100, 100).is_err());
        assert!(TextChunker::new(100, 150).is_err());
        assert!(TextChunker::new(0, 0).is_err());
        assert!(TextChunker::new(100, 20).is_ok());
    }

    #[test]
    fn test_nonempty_input_yields_at_least_one_chunk() {
        let chunker = TextChunker::new(100, 20).unwrap();
        assert_eq!(chunker.split("short text").len(), 1);
        assert!(chunker.split("   ").is_empty());
    }

    #[test]
    fn test_chunks_respect_size_bound() {
        let chunker = TextChunker::new(50, 10).unwrap();
        let text = "word ".repeat(100);
        for piece in chunker.split(&text) {
            assert!(piece.chars().count() <= 50, "oversized: {:?}", piece);
        }
    }

    #[test]
    fn test_index_contiguity_and_totals() {
        let chunker = TextChunker::new(80, 20).unwrap();
        let text = "Sentence one here. ".repeat(30);
        let chunks = chunker.chunk(&text, &source());

        assert!(chunks.len() > 1);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, i);
            assert_eq!(chunk.metadata.total_chunks, total);
            assert_eq!(chunk.metadata.page, Some(1));
            assert_eq!(chunk.metadata.filename, "doc.pdf");
        }
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let chunker = TextChunker::new(60, 30).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa \
                    lambda mu nu xi omicron pi rho sigma tau upsilon";
        let pieces = chunker.split(text);
        assert!(pieces.len() > 1);

        // The tail words of each chunk reappear at the head of the next
        for pair in pieces.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].contains(last_word),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_paragraphs_preferred_over_midword_cuts() {
        let chunker = TextChunker::new(40, 5).unwrap();
        let text = "First paragraph content.\n\nSecond paragraph content.";
        let pieces = chunker.split(text);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0], "First paragraph content.");
        assert_eq!(pieces[1], "Second paragraph content.");
    }

    #[test]
    fn test_merged_pieces_keep_their_separator() {
        let chunker = TextChunker::new(30, 0).unwrap();
        let text = "Alpha beta.\n\nGamma delta.\n\nEpsilon zeta.";
        let pieces = chunker.split(text);

        // Paragraphs packed into one chunk stay paragraph-separated
        assert_eq!(pieces[0], "Alpha beta.\n\nGamma delta.");
        assert_eq!(pieces[1], "Epsilon zeta.");
    }

    #[test]
    fn test_unbreakable_run_falls_back_to_characters() {
        let chunker = TextChunker::new(10, 2).unwrap();
        let text = "a".repeat(35);
        let pieces = chunker.split(&text);
        assert!(pieces.len() >= 3);
        for piece in pieces {
            assert!(piece.chars().count() <= 10);
        }
    }

    #[test]
    fn test_chunk_with_context() {
        let chunker = TextChunker::new(40, 5).unwrap();
        let text = "First paragraph content.\n\nSecond paragraph content.";
        let chunks = chunker.chunk_with_context(text, &source(), 10);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("[Next context:"));
        assert!(chunks[1].text.contains("[Previous context:"));
        // Metadata is untouched by context enrichment
        assert_eq!(chunks[0].metadata.chunk_index, 0);
        assert_eq!(chunks[1].metadata.chunk_index, 1);
    }
}
