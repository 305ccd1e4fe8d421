//! Vector index contract
//!
//! The index is treated as a black-box nearest-neighbor service. The core
//! requires exactly three operations: upsert, top-k query, and
//! metadata-filtered delete. Any provider satisfying this contract works.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::metadata::{RecordKind, RecordMetadata};
use crate::Result;

/// A record handed to the index for storage
///
/// Invariant: once a deployment fixes the vector dimensionality, every
/// upserted record has that dimensionality regardless of modality. The
/// embedding adapter validates this at configuration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique record id
    pub id: String,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Raw text payload (chunk text or image descriptor)
    pub content: String,
    /// Typed provenance metadata
    pub metadata: RecordMetadata,
}

/// A scored record returned from a query
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: String,
    /// Provider similarity score; cosine distance providers return [-1, 1]
    pub score: f32,
    pub content: String,
    pub metadata: RecordMetadata,
}

/// Metadata filter for queries and deletes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexFilter {
    /// Match records from this filename
    pub filename: Option<String>,
    /// Match records of this modality
    pub kind: Option<RecordKind>,
}

impl IndexFilter {
    pub fn filename(name: impl Into<String>) -> Self {
        Self {
            filename: Some(name.into()),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filename.is_none() && self.kind.is_none()
    }
}

/// Black-box nearest-neighbor storage service
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records
    ///
    /// Implementations batch internally to respect provider rate limits.
    /// On partial failure the error reports how many records succeeded.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Top-k nearest neighbors of `vector`, highest score first
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<ScoredRecord>>;

    /// Delete every record matching the filter
    async fn delete(&self, filter: &IndexFilter) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builder() {
        let filter = IndexFilter::filename("report.pdf").with_kind(RecordKind::Image);
        assert_eq!(filter.filename.as_deref(), Some("report.pdf"));
        assert_eq!(filter.kind, Some(RecordKind::Image));
        assert!(!filter.is_empty());
        assert!(IndexFilter::default().is_empty());
    }
}
