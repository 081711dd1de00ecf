use crate::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Dimension of `text-embedding-3-small`, and therefore of the vector
/// collection. Checked against the store at startup.
pub const VECTOR_DIMENSION: usize = 1_536;

#[async_trait]
pub trait EmbeddingClient {
    /// Embeds a batch of texts in one call. Output length and order match
    /// the input; an empty batch returns empty without a network call.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Embedding client for the OpenRouter / OpenAI-compatible embeddings API.
#[derive(Clone)]
pub struct OpenRouterEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenRouterEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn request_embeddings(&self, input: Value) -> Result<Value, EmbeddingError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": input,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Backend {
                status: status.as_u16(),
                details,
            });
        }

        Ok(response.json().await?)
    }
}

fn vector_at(parsed: &Value, index: usize) -> Result<Vec<f32>, EmbeddingError> {
    parsed
        .pointer(&format!("/data/{index}/embedding"))
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_f64)
                .map(|value| value as f32)
                .collect::<Vec<f32>>()
        })
        .filter(|vector| !vector.is_empty())
        .ok_or(EmbeddingError::MissingVector { index })
}

#[async_trait]
impl EmbeddingClient for OpenRouterEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let parsed = self.request_embeddings(json!(texts)).await?;
        let mut vectors = Vec::with_capacity(texts.len());
        for index in 0..texts.len() {
            vectors.push(vector_at(&parsed, index)?);
        }
        Ok(vectors)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let parsed = self.request_embeddings(json!(text)).await?;
        vector_at(&parsed, 0)
    }
}
