use crate::config::Config;
use rag_chat_core::{
    Indexer, OpenRouterChat, OpenRouterEmbedder, OpenSearchAuth, OpenSearchStore, QdrantStore,
    Retriever, VectorStore, MetadataStore, VECTOR_DIMENSION,
};
use std::sync::Arc;

pub type AppIndexer = Indexer<OpenRouterEmbedder, QdrantStore, OpenSearchStore>;
pub type AppRetriever = Retriever<OpenRouterEmbedder, QdrantStore, OpenSearchStore, OpenRouterChat>;

/// Shared handles built once at startup; every request clones the `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub indexer: Arc<AppIndexer>,
    pub retriever: Arc<AppRetriever>,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let embedder = OpenRouterEmbedder::new(
            &config.openrouter_base_url,
            &config.openrouter_api_key,
            &config.embedding_model,
        );
        let chat = OpenRouterChat::new(
            &config.openrouter_base_url,
            &config.openrouter_api_key,
            &config.llm_model,
            config.temperature,
            config.max_tokens,
        );

        let vectors = QdrantStore::new(
            &config.qdrant_url,
            &config.qdrant_collection,
            config.qdrant_api_key.clone(),
        )?;

        let auth = match (&config.opensearch_username, &config.opensearch_password) {
            (Some(username), Some(password)) => Some(OpenSearchAuth {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };
        let metadata = OpenSearchStore::new(
            &config.opensearch_url,
            &config.documents_index,
            &config.history_index,
            auth,
        )?;

        // A dimension mismatch with an existing collection is a
        // configuration error and must fail startup, not a later query.
        vectors.ensure_collection(VECTOR_DIMENSION).await?;
        metadata.ensure_indices().await?;
        tracing::info!(
            collection = %config.qdrant_collection,
            dimension = VECTOR_DIMENSION,
            "vector collection ready"
        );

        let options = config.rag_options();
        let indexer = Indexer::new(
            embedder.clone(),
            vectors.clone(),
            metadata.clone(),
            options.clone(),
            &config.qdrant_collection,
            VECTOR_DIMENSION,
        )?;
        let retriever = Retriever::new(embedder, vectors, metadata, chat, options);

        Ok(Self {
            indexer: Arc::new(indexer),
            retriever: Arc::new(retriever),
        })
    }
}
