//! Qdrant-backed vector index
//!
//! Dense vector storage and similarity search. Text chunks and image
//! records share one collection; the payload `type` field distinguishes
//! them so retrieval can filter by modality.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        value::Kind, Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
        PointStruct, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    },
    Qdrant,
};
use docqa_core::{
    IndexFilter, RecordMetadata, Result, ScoredRecord, VectorIndex, VectorRecord,
};
use tracing::{debug, info, instrument};

use crate::RagError;

/// Qdrant connection settings
#[derive(Debug, Clone)]
pub struct QdrantIndexConfig {
    pub endpoint: String,
    pub collection: String,
    pub vector_dim: usize,
    pub api_key: Option<String>,
    /// Records per upsert request
    pub batch_size: usize,
}

impl Default for QdrantIndexConfig {
    fn default() -> Self {
        Self {
            endpoint: docqa_config::constants::endpoints::QDRANT_DEFAULT.to_string(),
            collection: docqa_config::constants::index::COLLECTION.to_string(),
            vector_dim: docqa_config::constants::index::VECTOR_DIM,
            api_key: None,
            batch_size: docqa_config::constants::index::UPSERT_BATCH_SIZE,
        }
    }
}

/// Vector index client
pub struct QdrantIndex {
    client: Qdrant,
    config: QdrantIndexConfig,
}

impl QdrantIndex {
    /// Connect to Qdrant; does not touch the collection yet
    pub async fn new(config: QdrantIndexConfig) -> std::result::Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            info!("qdrant connection using api key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create the collection if it does not exist (cosine distance)
    pub async fn ensure_collection(&self) -> std::result::Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.config.collection).vectors_config(
                        VectorParamsBuilder::new(self.config.vector_dim as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
            info!(collection = %self.config.collection, "created collection");
        }

        Ok(())
    }

    /// Points currently stored in the collection
    pub async fn point_count(&self) -> std::result::Result<u64, RagError> {
        let info = self
            .client
            .collection_info(&self.config.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or_default())
    }

    fn to_point(&self, record: &VectorRecord) -> std::result::Result<PointStruct, RagError> {
        if record.vector.len() != self.config.vector_dim {
            return Err(RagError::VectorStore(format!(
                "record {} has {} dims, collection expects {}",
                record.id,
                record.vector.len(),
                self.config.vector_dim
            )));
        }

        let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
        payload.insert("content".to_string(), record.content.clone().into());
        for (k, v) in record.metadata.to_payload() {
            payload.insert(k, v.into());
        }

        Ok(PointStruct::new(
            record.id.clone(),
            record.vector.clone(),
            payload,
        ))
    }
}

fn to_qdrant_filter(filter: &IndexFilter) -> Option<Filter> {
    let mut conditions = Vec::new();

    if let Some(ref filename) = filter.filename {
        conditions.push(Condition::matches("filename", filename.clone()));
    }
    if let Some(kind) = filter.kind {
        conditions.push(Condition::matches("type", kind.as_str().to_string()));
    }

    if conditions.is_empty() {
        None
    } else {
        Some(Filter::must(conditions))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let total = records.len();
        let mut upserted = 0usize;
        for batch in records.chunks(self.config.batch_size.max(1)) {
            let points: Vec<PointStruct> = batch
                .iter()
                .map(|r| self.to_point(r))
                .collect::<std::result::Result<_, _>>()?;

            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.config.collection, points))
                .await
                .map_err(|e| {
                    RagError::VectorStore(format!(
                        "upsert failed after {upserted} of {total} records: {e}"
                    ))
                })?;
            upserted += batch.len();
        }

        debug!(count = records.len(), "upserted records");
        Ok(())
    }

    #[instrument(skip(self, vector))]
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<ScoredRecord>> {
        let mut builder = SearchPointsBuilder::new(
            &self.config.collection,
            vector.to_vec(),
            top_k as u64,
        )
        .with_payload(true);

        if let Some(f) = filter.and_then(to_qdrant_filter) {
            builder = builder.filter(f);
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        let records = response
            .result
            .into_iter()
            .map(|point| {
                let mut payload: HashMap<String, String> = HashMap::new();
                let mut content = String::new();

                for (k, v) in point.payload {
                    if let Some(Kind::StringValue(s)) = v.kind {
                        if k == "content" {
                            content = s;
                        } else {
                            payload.insert(k, s);
                        }
                    }
                }

                let id = point
                    .id
                    .and_then(|pid| match pid.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => Some(u),
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                            Some(n.to_string())
                        },
                        None => None,
                    })
                    .unwrap_or_default();

                ScoredRecord {
                    id,
                    score: point.score,
                    content,
                    metadata: RecordMetadata::from_payload(&payload),
                }
            })
            .collect();

        Ok(records)
    }

    #[instrument(skip(self))]
    async fn delete(&self, filter: &IndexFilter) -> Result<()> {
        // An empty filter would wipe the collection; refuse it
        let qdrant_filter = to_qdrant_filter(filter).ok_or_else(|| {
            docqa_core::Error::InvalidInput("refusing to delete with an empty filter".to_string())
        })?;

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.config.collection).points(qdrant_filter),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        info!(?filter, "deleted records");
        Ok(())
    }
}
