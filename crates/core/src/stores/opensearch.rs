use crate::error::StoreError;
use crate::models::{DocumentRecord, HistoryEntry};
use crate::traits::MetadataStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::warn;
use url::Url;

/// Optional basic-auth credentials for a secured cluster.
#[derive(Debug, Clone)]
pub struct OpenSearchAuth {
    pub username: String,
    pub password: String,
}

/// Metadata and chat-history store over the OpenSearch REST API. Document
/// records are keyed by `document_id` so re-indexing overwrites in place;
/// history entries are append-only and read back per session.
#[derive(Clone)]
pub struct OpenSearchStore {
    endpoint: String,
    documents_index: String,
    history_index: String,
    auth: Option<OpenSearchAuth>,
    client: Client,
}

impl OpenSearchStore {
    pub fn new(
        endpoint: impl Into<String>,
        documents_index: impl Into<String>,
        history_index: impl Into<String>,
        auth: Option<OpenSearchAuth>,
    ) -> Result<Self, StoreError> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            documents_index: documents_index.into(),
            history_index: history_index.into(),
            auth,
            client: Client::new(),
        })
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(auth) => request.basic_auth(&auth.username, Some(&auth.password)),
            None => request,
        }
    }

    fn backend_error(details: impl Into<String>) -> StoreError {
        StoreError::BackendResponse {
            backend: "opensearch".to_string(),
            details: details.into(),
        }
    }

    async fn ensure_index(&self, index: &str, mappings: Value) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.head(format!("{}/{}", self.endpoint, index)))
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }
        if !response.status().is_client_error() {
            return Err(Self::backend_error(format!(
                "index probe failed with {}",
                response.status()
            )));
        }

        let response = self
            .authed(self.client.put(format!("{}/{}", self.endpoint, index)))
            .json(&json!({
                "settings": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0,
                },
                "mappings": mappings,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(format!(
                "index setup for {} failed with {}",
                index,
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for OpenSearchStore {
    async fn ensure_indices(&self) -> Result<(), StoreError> {
        self.ensure_index(
            &self.documents_index,
            json!({
                "properties": {
                    "document_id": {"type": "keyword"},
                    "source": {"type": "keyword"},
                    "url": {"type": "keyword"},
                    "content_length": {"type": "long"},
                    "chunk_count": {"type": "integer"},
                    "metadata": {"type": "object", "enabled": true},
                    "indexed_at": {"type": "date"},
                    "updated_at": {"type": "date"}
                }
            }),
        )
        .await?;

        self.ensure_index(
            &self.history_index,
            json!({
                "properties": {
                    "session_id": {"type": "keyword"},
                    "query": {"type": "text"},
                    "answer": {"type": "text"},
                    "status": {"type": "keyword"},
                    "processing_time_ms": {"type": "long"},
                    "timestamp": {"type": "date"}
                }
            }),
        )
        .await
    }

    async fn upsert_document(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.put(format!(
                "{}/{}/_doc/{}?refresh=true",
                self.endpoint, self.documents_index, record.document_id
            )))
            .json(record)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(format!(
                "document upsert failed with {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.delete(format!(
                "{}/{}/_doc/{}?refresh=true",
                self.endpoint, self.documents_index, document_id
            )))
            .send()
            .await?;

        // Deleting an unknown id is not an error; the caller only cares
        // that no record remains.
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(Self::backend_error(format!(
                "document delete failed with {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn count_documents(&self) -> Result<u64, StoreError> {
        let response = self
            .authed(self.client.get(format!(
                "{}/{}/_count",
                self.endpoint, self.documents_index
            )))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(format!(
                "document count failed with {}",
                response.status()
            )));
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/count")
            .and_then(Value::as_u64)
            .ok_or_else(|| Self::backend_error("count response missing count"))
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.post(format!(
                "{}/{}/_doc?refresh=true",
                self.endpoint, self.history_index
            )))
            .json(entry)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(format!(
                "history append failed with {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn get_history(&self, session_id: &str, limit: usize) -> Vec<HistoryEntry> {
        let request = self
            .authed(self.client.post(format!(
                "{}/{}/_search",
                self.endpoint, self.history_index
            )))
            .json(&json!({
                "query": { "term": { "session_id": session_id } },
                "sort": [ { "timestamp": { "order": "desc" } } ],
                "size": limit,
            }));

        let entries = async {
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(Self::backend_error(format!(
                    "history search failed with {}",
                    response.status()
                )));
            }

            let parsed: Value = response.json().await?;
            let hits = parsed
                .pointer("/hits/hits")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            let mut entries = Vec::with_capacity(hits.len());
            for hit in hits {
                let source = hit
                    .pointer("/_source")
                    .cloned()
                    .ok_or_else(|| Self::backend_error("history hit missing _source"))?;
                entries.push(serde_json::from_value::<HistoryEntry>(source)?);
            }
            Ok::<_, StoreError>(entries)
        }
        .await;

        match entries {
            Ok(mut entries) => {
                // Search order is newest-first; callers expect chronological.
                entries.reverse();
                entries
            }
            Err(error) => {
                warn!(session_id, error = %error, "history lookup failed");
                Vec::new()
            }
        }
    }
}
