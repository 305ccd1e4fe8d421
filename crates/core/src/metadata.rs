//! Record metadata for indexed evidence
//!
//! Every record stored in the vector index carries a closed, typed metadata
//! record rather than an open string map. The flat payload representation
//! (`to_payload`/`from_payload`) is what crosses the index-provider boundary,
//! keyed by a `type` discriminator so text chunks and image records can live
//! in the same collection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Text,
    Image,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Text => "text",
            RecordKind::Image => "image",
        }
    }
}

/// Metadata for a text chunk
///
/// Invariant: `chunk_index` is 0-based and contiguous within one source page,
/// and `total_chunks` is constant across all chunks sharing `source` + `page`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Original source (file path or URL)
    pub source: String,
    /// Display filename used for citation and deletion
    pub filename: String,
    /// Page number, if the source is paginated
    pub page: Option<u32>,
    /// Position of this chunk within its page
    pub chunk_index: usize,
    /// Number of chunks produced from the same page
    pub total_chunks: usize,
    /// Ingestion timestamp
    pub timestamp: DateTime<Utc>,
    /// Paths of images extracted from the same page
    #[serde(default)]
    pub image_refs: Vec<String>,
}

/// Metadata for an indexed image
///
/// Invariant: `label` comes from the candidate vocabulary used at
/// classification time (or the `"unknown"` sentinel), never free-form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Original source document (file path or URL)
    pub source: String,
    /// Display filename of the source document
    pub filename: String,
    /// Page the image was extracted from
    pub page: Option<u32>,
    /// Zero-shot classification label
    pub label: String,
    /// Path of the image file itself
    pub image_path: String,
    /// Ingestion timestamp
    pub timestamp: DateTime<Utc>,
}

/// Typed metadata attached to every vector record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecordMetadata {
    #[serde(rename = "text")]
    Chunk(ChunkMetadata),
    Image(ImageMetadata),
}

/// Separator for multi-valued payload fields
const LIST_SEP: char = '\n';

impl RecordMetadata {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordMetadata::Chunk(_) => RecordKind::Text,
            RecordMetadata::Image(_) => RecordKind::Image,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            RecordMetadata::Chunk(m) => &m.filename,
            RecordMetadata::Image(m) => &m.filename,
        }
    }

    pub fn page(&self) -> Option<u32> {
        match self {
            RecordMetadata::Chunk(m) => m.page,
            RecordMetadata::Image(m) => m.page,
        }
    }

    /// Flatten to the string payload stored by the index provider
    pub fn to_payload(&self) -> HashMap<String, String> {
        let mut payload = HashMap::new();
        payload.insert("type".to_string(), self.kind().as_str().to_string());

        match self {
            RecordMetadata::Chunk(m) => {
                payload.insert("source".to_string(), m.source.clone());
                payload.insert("filename".to_string(), m.filename.clone());
                if let Some(page) = m.page {
                    payload.insert("page".to_string(), page.to_string());
                }
                payload.insert("chunk_index".to_string(), m.chunk_index.to_string());
                payload.insert("total_chunks".to_string(), m.total_chunks.to_string());
                payload.insert("timestamp".to_string(), m.timestamp.to_rfc3339());
                if !m.image_refs.is_empty() {
                    payload.insert(
                        "image_refs".to_string(),
                        m.image_refs.join(&LIST_SEP.to_string()),
                    );
                }
            },
            RecordMetadata::Image(m) => {
                payload.insert("source".to_string(), m.source.clone());
                payload.insert("filename".to_string(), m.filename.clone());
                if let Some(page) = m.page {
                    payload.insert("page".to_string(), page.to_string());
                }
                payload.insert("label".to_string(), m.label.clone());
                payload.insert("image_path".to_string(), m.image_path.clone());
                payload.insert("timestamp".to_string(), m.timestamp.to_rfc3339());
            },
        }

        payload
    }

    /// Reconstruct from a flat payload, tolerating missing optional fields
    ///
    /// Records written by older versions may miss fields; anything required
    /// falls back to an empty string or zero rather than failing the read.
    pub fn from_payload(payload: &HashMap<String, String>) -> Self {
        let get = |key: &str| payload.get(key).cloned().unwrap_or_default();
        let page = payload.get("page").and_then(|p| p.parse().ok());
        let timestamp = payload
            .get("timestamp")
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        if payload.get("type").map(|t| t.as_str()) == Some("image") {
            RecordMetadata::Image(ImageMetadata {
                source: get("source"),
                filename: get("filename"),
                page,
                label: get("label"),
                image_path: get("image_path"),
                timestamp,
            })
        } else {
            RecordMetadata::Chunk(ChunkMetadata {
                source: get("source"),
                filename: get("filename"),
                page,
                chunk_index: payload
                    .get("chunk_index")
                    .and_then(|i| i.parse().ok())
                    .unwrap_or(0),
                total_chunks: payload
                    .get("total_chunks")
                    .and_then(|i| i.parse().ok())
                    .unwrap_or(0),
                timestamp,
                image_refs: payload
                    .get("image_refs")
                    .map(|r| r.split(LIST_SEP).map(str::to_string).collect())
                    .unwrap_or_default(),
            })
        }
    }
}
