use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding backend returned {status}: {details}")]
    Backend { status: u16, details: String },

    #[error("embedding response missing vector for input {index}")]
    MissingVector { index: usize },
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat backend returned {status}: {details}")]
    Backend { status: u16, details: String },

    #[error("chat response contained no message content")]
    MissingContent,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("collection dimension {configured} does not match embedding dimension {expected}")]
    DimensionMismatch { configured: usize, expected: usize },
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("docx parse error: {0}")]
    DocxParse(String),

    #[error("file is not valid utf-8: {0}")]
    InvalidEncoding(#[from] std::string::FromUtf8Error),

    #[error("no text could be extracted from {0}")]
    EmptyText(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("document content is empty")]
    EmptyContent,

    #[error("no chunks were produced from document content")]
    NoChunks,

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query is empty")]
    EmptyQuery,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}
