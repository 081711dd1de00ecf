use crate::error::StoreError;
use crate::models::{ScoredChunk, VectorRecord};
use crate::traits::{FieldFilter, VectorStore};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use url::Url;

/// Vector store adapter over the Qdrant REST API.
#[derive(Clone)]
pub struct QdrantStore {
    endpoint: String,
    collection: String,
    api_key: Option<String>,
    client: Client,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, StoreError> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key,
            client: Client::new(),
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.endpoint, self.collection, suffix)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    fn backend_error(details: impl Into<String>) -> StoreError {
        StoreError::BackendResponse {
            backend: "qdrant".to_string(),
            details: details.into(),
        }
    }

    async fn create_collection(&self, dimension: usize) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.put(self.collection_url("")))
            .json(&json!({
                "vectors": {
                    "size": dimension,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(format!(
                "collection create failed with {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn collection_info(&self) -> Result<Option<Value>, StoreError> {
        let response = self
            .authed(self.client.get(self.collection_url("")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::backend_error(format!(
                "collection info failed with {}",
                response.status()
            )));
        }
        Ok(Some(response.json().await?))
    }
}

fn equality_filter(filter: &FieldFilter) -> Value {
    json!({
        "must": [
            {
                "key": filter.field,
                "match": { "value": filter.value },
            }
        ]
    })
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, dimension: usize) -> Result<(), StoreError> {
        match self.collection_info().await? {
            None => self.create_collection(dimension).await,
            Some(info) => {
                let configured = info
                    .pointer("/result/config/params/vectors/size")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| {
                        Self::backend_error("collection info missing vector size")
                    })? as usize;

                if configured != dimension {
                    return Err(StoreError::DimensionMismatch {
                        configured,
                        expected: dimension,
                    });
                }
                Ok(())
            }
        }
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .iter()
            .map(|record| {
                Ok(json!({
                    "id": record.id,
                    "vector": record.vector,
                    "payload": serde_json::to_value(&record.payload)?,
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let response = self
            .authed(self.client.put(self.collection_url("/points?wait=true")))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(format!(
                "upsert failed with {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        score_threshold: f64,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let mut body = json!({
            "vector": query_vector,
            "limit": top_k,
            "score_threshold": score_threshold,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = equality_filter(filter);
        }

        let response = self
            .authed(self.client.post(self.collection_url("/points/search")))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(format!(
                "search failed with {}",
                response.status()
            )));
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
            let payload = hit
                .pointer("/payload")
                .cloned()
                .ok_or_else(|| Self::backend_error("search hit missing payload"))?;
            results.push(ScoredChunk {
                payload: serde_json::from_value(payload)?,
                score,
            });
        }

        Ok(results)
    }

    async fn delete_by_field(&self, filter: &FieldFilter) -> Result<(), StoreError> {
        let response = self
            .authed(self.client.post(self.collection_url("/points/delete?wait=true")))
            .json(&json!({ "filter": equality_filter(filter) }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(format!(
                "delete failed with {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn count_vectors(&self) -> Result<u64, StoreError> {
        let info = self
            .collection_info()
            .await?
            .ok_or_else(|| Self::backend_error("collection does not exist"))?;

        info.pointer("/result/points_count")
            .and_then(Value::as_u64)
            .ok_or_else(|| Self::backend_error("collection info missing points_count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_endpoint() {
        assert!(QdrantStore::new("not a url", "chunks", None).is_err());
        assert!(QdrantStore::new("http://localhost:6333", "chunks", None).is_ok());
    }

    #[test]
    fn equality_filter_shape_matches_qdrant_wire_format() {
        let filter = FieldFilter::new("source", "manual.pdf");
        let value = equality_filter(&filter);
        assert_eq!(
            value.pointer("/must/0/key").and_then(Value::as_str),
            Some("source")
        );
        assert_eq!(
            value.pointer("/must/0/match/value").and_then(Value::as_str),
            Some("manual.pdf")
        );
    }
}
