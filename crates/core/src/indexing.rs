use crate::chunking::{chunk_text, generate_document_id, ChunkingConfig};
use crate::error::IndexError;
use crate::models::{
    ChunkPayload, CollectionStats, DocumentInput, DocumentRecord, IndexOutcome, IndexStatus,
    IndexSummary, RagOptions, VectorRecord,
};
use crate::retry;
use crate::traits::{FieldFilter, MetadataStore, VectorStore};
use crate::EmbeddingClient;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Payload field holding the owning document id on every vector point.
pub const DOCUMENT_ID_FIELD: &str = "document_id";

/// Deterministic point id for a (document, chunk) pair. Re-indexing the
/// same pair overwrites the same point instead of duplicating it.
pub fn point_id(document_id: &str, chunk_index: usize) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(b":");
    hasher.update(chunk_index.to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Indexing pipeline: chunk, embed, upsert vectors, record metadata.
pub struct Indexer<E, V, M>
where
    E: EmbeddingClient,
    V: VectorStore,
    M: MetadataStore,
{
    embedder: E,
    vectors: V,
    metadata: M,
    options: RagOptions,
    chunking: ChunkingConfig,
    collection_name: String,
    vector_dimension: usize,
}

impl<E, V, M> Indexer<E, V, M>
where
    E: EmbeddingClient + Send + Sync,
    V: VectorStore + Send + Sync,
    M: MetadataStore + Send + Sync,
{
    pub fn new(
        embedder: E,
        vectors: V,
        metadata: M,
        options: RagOptions,
        collection_name: impl Into<String>,
        vector_dimension: usize,
    ) -> Result<Self, IndexError> {
        let chunking = ChunkingConfig::try_from(&options)?;
        Ok(Self {
            embedder,
            vectors,
            metadata,
            options,
            chunking,
            collection_name: collection_name.into(),
            vector_dimension,
        })
    }

    /// Indexes one document. Failures are folded into the outcome rather
    /// than propagated so batch callers can keep going.
    pub async fn index_document(&self, document: &DocumentInput) -> IndexOutcome {
        match self.try_index(document).await {
            Ok((document_id, chunk_count)) => {
                info!(
                    source = %document.source,
                    document_id = %document_id,
                    chunks = chunk_count,
                    "document indexed"
                );
                IndexOutcome {
                    status: IndexStatus::Success,
                    source: document.source.clone(),
                    document_id: Some(document_id),
                    chunks_indexed: chunk_count,
                    message: format!("Successfully indexed {chunk_count} chunks"),
                }
            }
            Err(index_error) => {
                error!(source = %document.source, error = %index_error, "indexing failed");
                IndexOutcome {
                    status: IndexStatus::Error,
                    source: document.source.clone(),
                    document_id: None,
                    chunks_indexed: 0,
                    message: index_error.to_string(),
                }
            }
        }
    }

    async fn try_index(&self, document: &DocumentInput) -> Result<(String, usize), IndexError> {
        if document.content.trim().is_empty() {
            return Err(IndexError::EmptyContent);
        }

        let mut content = document.content.as_str();
        let char_count = content.chars().count();
        if char_count > self.options.max_content_chars {
            let cut = content
                .char_indices()
                .nth(self.options.max_content_chars)
                .map(|(offset, _)| offset)
                .unwrap_or(content.len());
            warn!(
                source = %document.source,
                original_chars = char_count,
                cap = self.options.max_content_chars,
                "document content truncated"
            );
            content = &content[..cut];
        }

        let document_id = generate_document_id(&document.source, content);
        let chunks = chunk_text(content, self.chunking);
        if chunks.is_empty() {
            return Err(IndexError::NoChunks);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = retry::with_backoff(
            retry::DEFAULT_ATTEMPTS,
            retry::DEFAULT_DELAY,
            "embed_batch",
            || self.embedder.embed_batch(&texts),
        )
        .await?;

        let indexed_at = Utc::now();
        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, vector)| VectorRecord {
                id: point_id(&document_id, chunk.chunk_index),
                vector,
                payload: ChunkPayload {
                    document_id: document_id.clone(),
                    source: document.source.clone(),
                    url: document.url.clone(),
                    chunk_index: chunk.chunk_index,
                    text: chunk.text.clone(),
                    start_char: chunk.start_char,
                    end_char: chunk.end_char,
                    metadata: document.metadata.clone(),
                    indexed_at,
                },
            })
            .collect();

        retry::with_backoff(
            retry::DEFAULT_ATTEMPTS,
            retry::DEFAULT_DELAY,
            "vector_upsert",
            || self.vectors.upsert(&records),
        )
        .await?;

        // Metadata write is best-effort: the vectors are committed, a stale
        // metadata record is tolerable.
        let record = DocumentRecord {
            document_id: document_id.clone(),
            source: document.source.clone(),
            url: document.url.clone(),
            content_length: content.chars().count(),
            chunk_count: chunks.len(),
            metadata: document.metadata.clone(),
            indexed_at,
            updated_at: indexed_at,
        };
        if let Err(store_error) = self.metadata.upsert_document(&record).await {
            warn!(
                document_id = %document_id,
                error = %store_error,
                "metadata upsert failed; vectors remain indexed"
            );
        }

        Ok((document_id, chunks.len()))
    }

    /// Indexes documents strictly sequentially. One document's failure does
    /// not abort the batch.
    pub async fn index_documents(&self, documents: &[DocumentInput]) -> IndexSummary {
        info!(total = documents.len(), "starting batch indexing");

        let mut summary = IndexSummary {
            total: documents.len(),
            successful: 0,
            failed: 0,
            total_chunks: 0,
            details: Vec::with_capacity(documents.len()),
        };

        for document in documents {
            let outcome = self.index_document(document).await;
            match outcome.status {
                IndexStatus::Success => {
                    summary.successful += 1;
                    summary.total_chunks += outcome.chunks_indexed;
                }
                IndexStatus::Error => summary.failed += 1,
            }
            summary.details.push(outcome);
        }

        info!(
            successful = summary.successful,
            failed = summary.failed,
            total_chunks = summary.total_chunks,
            "batch indexing complete"
        );
        summary
    }

    /// Removes every vector belonging to the document, then its metadata
    /// record. The two writes are not transactional.
    pub async fn delete_document(&self, document_id: &str) -> Result<(), IndexError> {
        let filter = FieldFilter::new(DOCUMENT_ID_FIELD, document_id);
        retry::with_backoff(
            retry::DEFAULT_ATTEMPTS,
            retry::DEFAULT_DELAY,
            "vector_delete",
            || self.vectors.delete_by_field(&filter),
        )
        .await?;

        self.metadata.delete_document(document_id).await?;
        info!(document_id, "document deleted");
        Ok(())
    }

    pub async fn collection_stats(&self) -> Result<CollectionStats, IndexError> {
        let vector_count = self.vectors.count_vectors().await?;
        let document_count = self.metadata.count_documents().await?;

        Ok(CollectionStats {
            collection_name: self.collection_name.clone(),
            vector_count,
            document_count,
            vector_dimension: self.vector_dimension,
            status: "healthy".to_string(),
        })
    }
}
