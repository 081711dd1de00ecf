use clap::Parser;
use rag_chat_core::RagOptions;

/// Runtime configuration, sourced from flags or the environment.
#[derive(Debug, Parser)]
#[command(name = "rag-chat-api", version)]
pub struct Config {
    /// OpenRouter API key used for both embeddings and completions.
    #[arg(long, env = "OPENROUTER_API_KEY")]
    pub openrouter_api_key: String,

    /// OpenRouter base URL.
    #[arg(long, env = "OPENROUTER_BASE_URL", default_value = "https://openrouter.ai/api/v1")]
    pub openrouter_base_url: String,

    /// Qdrant base URL.
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    pub qdrant_url: String,

    /// Qdrant API key (cloud deployments).
    #[arg(long, env = "QDRANT_API_KEY")]
    pub qdrant_api_key: Option<String>,

    /// Qdrant collection holding chunk vectors.
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "rag_documents")]
    pub qdrant_collection: String,

    /// OpenSearch base URL for document metadata and chat history.
    #[arg(long, env = "OPENSEARCH_URL", default_value = "http://localhost:9200")]
    pub opensearch_url: String,

    /// OpenSearch username (secured clusters).
    #[arg(long, env = "OPENSEARCH_USERNAME")]
    pub opensearch_username: Option<String>,

    /// OpenSearch password (secured clusters).
    #[arg(long, env = "OPENSEARCH_PASSWORD")]
    pub opensearch_password: Option<String>,

    /// Index holding one record per logical document.
    #[arg(long, env = "DOCUMENTS_INDEX", default_value = "documents")]
    pub documents_index: String,

    /// Index holding the append-only chat transcripts.
    #[arg(long, env = "HISTORY_INDEX", default_value = "chat_history")]
    pub history_index: String,

    /// Bind address.
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0")]
    pub app_host: String,

    /// Bind port.
    #[arg(long, env = "APP_PORT", default_value = "8000")]
    pub app_port: u16,

    /// Chat model identifier.
    #[arg(long, env = "LLM_MODEL", default_value = "deepseek/deepseek-chat")]
    pub llm_model: String,

    /// Embedding model identifier.
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "openai/text-embedding-3-small")]
    pub embedding_model: String,

    /// Sampling temperature for completions.
    #[arg(long, env = "TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    /// Maximum tokens per completion.
    #[arg(long, env = "MAX_TOKENS", default_value = "2048")]
    pub max_tokens: u32,

    /// Default number of chunks retrieved per query.
    #[arg(long, env = "TOP_K", default_value = "5")]
    pub top_k: usize,

    /// Minimum similarity score for retrieval.
    #[arg(long, env = "SIMILARITY_THRESHOLD", default_value = "0.3")]
    pub similarity_threshold: f64,

    /// Chunk size in characters.
    #[arg(long, env = "CHUNK_SIZE", default_value = "512")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks, in characters.
    #[arg(long, env = "CHUNK_OVERLAP", default_value = "50")]
    pub chunk_overlap: usize,
}

impl Config {
    pub fn rag_options(&self) -> RagOptions {
        RagOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            similarity_threshold: self.similarity_threshold,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..RagOptions::default()
        }
    }
}
