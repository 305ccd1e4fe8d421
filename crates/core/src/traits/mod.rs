//! Core traits for the pipeline
//!
//! All external collaborators sit behind these traits so backends can be
//! swapped without code changes and tests can run against fakes:
//!
//! ```text
//! Embedding:
//!   - TextEmbedder: text -> normalized vector
//!   - ImageEmbedder: image path / label text -> normalized vector (CLIP-style dual tower)
//!
//! Storage:
//!   - VectorIndex: upsert / top-k query / metadata-filtered delete
//!
//! Generation:
//!   - LanguageModel: blocking and streaming completion
//!
//! Ingestion:
//!   - DocumentLoader: source file -> pages of text plus extracted image paths
//! ```

mod embedding;
mod index;
mod llm;
mod loader;

pub use embedding::{ImageEmbedder, TextEmbedder};
pub use index::{IndexFilter, ScoredRecord, VectorIndex, VectorRecord};
pub use llm::LanguageModel;
pub use loader::{DocumentLoader, DocumentPage};
