use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rag_chat_core::{QueryOutcome, ScoredChunk};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/query", post(query))
        .route("/search", post(search))
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
    session_id: Option<String>,
    top_k: Option<usize>,
    filter_source: Option<String>,
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryOutcome>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query cannot be empty".to_string()));
    }
    if request.query.chars().count() > 2_000 {
        return Err(ApiError::BadRequest(
            "query exceeds 2000 characters".to_string(),
        ));
    }
    if let Some(top_k) = request.top_k {
        if !(1..=20).contains(&top_k) {
            return Err(ApiError::BadRequest("top_k must be in [1, 20]".to_string()));
        }
    }

    let outcome = state
        .retriever
        .query(
            &request.query,
            request.session_id.as_deref(),
            request.top_k,
            request.filter_source.as_deref(),
        )
        .await;

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_search_top_k")]
    top_k: usize,
}

fn default_search_top_k() -> usize {
    10
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<ScoredChunk>,
    query: String,
    total_results: usize,
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query cannot be empty".to_string()));
    }
    if !(1..=50).contains(&request.top_k) {
        return Err(ApiError::BadRequest("top_k must be in [1, 50]".to_string()));
    }

    let results = state
        .retriever
        .search_similar_documents(&request.query, request.top_k)
        .await
        .map_err(|query_error| ApiError::Internal(query_error.to_string()))?;

    Ok(Json(SearchResponse {
        total_results: results.len(),
        query: request.query,
        results,
    }))
}
