use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A bounded slice of a document's normalized text, with character offsets
/// recorded for downstream citation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
}

/// One document submitted for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    pub source: String,
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub metadata: Value,
}

/// Metadata record kept alongside the vectors, one per logical document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub source: String,
    pub url: String,
    pub content_length: usize,
    pub chunk_count: usize,
    pub metadata: Value,
    pub indexed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload stored with each vector point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub document_id: String,
    pub source: String,
    pub url: String,
    pub chunk_index: usize,
    pub text: String,
    pub start_char: usize,
    pub end_char: usize,
    #[serde(default)]
    pub metadata: Value,
    pub indexed_at: DateTime<Utc>,
}

/// One point to upsert into the vector store.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// A search hit: a stored chunk payload plus its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub payload: ChunkPayload,
    pub score: f64,
}

/// Read-only projection of a retrieved chunk shown as answer provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub url: String,
    pub text: String,
    pub score: f64,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Success,
    NoResults,
    Error,
}

/// Final response of the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub answer: String,
    pub sources: Vec<Citation>,
    pub query: String,
    pub documents_retrieved: usize,
    pub processing_time_ms: u64,
    pub status: QueryStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Success,
    Error,
}

/// Per-document indexing result. Failures are reported here rather than
/// propagated so one bad document cannot abort a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub status: IndexStatus,
    pub source: String,
    pub document_id: Option<String>,
    pub chunks_indexed: usize,
    pub message: String,
}

/// Aggregate of a sequential batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_chunks: usize,
    pub details: Vec<IndexOutcome>,
}

/// Append-only transcript entry, queried back by session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session_id: String,
    pub query: String,
    pub answer: String,
    pub sources: Vec<Citation>,
    pub status: QueryStatus,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub collection_name: String,
    pub vector_count: u64,
    pub document_count: u64,
    pub vector_dimension: usize,
    pub status: String,
}

/// Tunables shared by both pipelines.
#[derive(Debug, Clone)]
pub struct RagOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub similarity_threshold: f64,
    pub max_sources: usize,
    pub max_content_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
            top_k: 5,
            similarity_threshold: 0.3,
            max_sources: 5,
            max_content_chars: 100_000,
            temperature: 0.7,
            max_tokens: 2_048,
        }
    }
}
