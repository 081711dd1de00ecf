use crate::error::StoreError;
use crate::models::{DocumentRecord, HistoryEntry, ScoredChunk, VectorRecord};
use async_trait::async_trait;

/// Equality filter on a single payload field.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait VectorStore {
    /// Idempotent create-if-absent. Fails if an existing collection was
    /// created with a different dimension.
    async fn ensure_collection(&self, dimension: usize) -> Result<(), StoreError>;

    /// Insert-or-replace by point id.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), StoreError>;

    /// Ranked similarity search, descending by score, at most `top_k` hits,
    /// all scores at or above `score_threshold`.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        score_threshold: f64,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<ScoredChunk>, StoreError>;

    /// Removes every point whose payload field equals the filter value.
    async fn delete_by_field(&self, filter: &FieldFilter) -> Result<(), StoreError>;

    /// Number of points currently stored.
    async fn count_vectors(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait MetadataStore {
    /// Idempotent index/collection setup.
    async fn ensure_indices(&self) -> Result<(), StoreError>;

    /// Insert-or-replace the document record keyed by `document_id`.
    async fn upsert_document(&self, record: &DocumentRecord) -> Result<(), StoreError>;

    async fn delete_document(&self, document_id: &str) -> Result<(), StoreError>;

    async fn count_documents(&self) -> Result<u64, StoreError>;

    /// Append-only transcript write.
    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), StoreError>;

    /// Most recent `limit` entries for the session, oldest first. History is
    /// best-effort: failures come back as an empty list.
    async fn get_history(&self, session_id: &str, limit: usize) -> Vec<HistoryEntry>;
}
