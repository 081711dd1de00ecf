pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod indexing;
pub mod llm;
pub mod models;
pub mod retrieval;
pub mod retry;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_text, generate_document_id, normalize_text, ChunkingConfig};
pub use embeddings::{EmbeddingClient, OpenRouterEmbedder, VECTOR_DIMENSION};
pub use error::{EmbeddingError, ExtractError, IndexError, LlmError, QueryError, StoreError};
pub use indexing::{point_id, Indexer, DOCUMENT_ID_FIELD};
pub use llm::{ChatModel, OpenRouterChat};
pub use models::{
    Chunk, ChunkPayload, Citation, CollectionStats, DocumentInput, DocumentRecord, HistoryEntry,
    IndexOutcome, IndexStatus, IndexSummary, QueryOutcome, QueryStatus, RagOptions, ScoredChunk,
    VectorRecord,
};
pub use retrieval::{Retriever, ERROR_ANSWER, MIN_SIMILARITY_SCORE, NO_ANSWER, SYSTEM_PROMPT};
pub use stores::{OpenSearchAuth, OpenSearchStore, QdrantStore};
pub use traits::{FieldFilter, MetadataStore, VectorStore};
