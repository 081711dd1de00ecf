use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rag_chat_core::{CollectionStats, DocumentInput, IndexSummary};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/index", post(index_documents))
        .route("/documents/{document_id}", delete(delete_document))
        .route("/stats", get(stats))
}

#[derive(Debug, Deserialize)]
struct IndexRequest {
    documents: Vec<DocumentInput>,
}

async fn index_documents(
    State(state): State<AppState>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexSummary>, ApiError> {
    if request.documents.is_empty() {
        return Err(ApiError::BadRequest(
            "documents list cannot be empty".to_string(),
        ));
    }
    for document in &request.documents {
        if document.source.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "document source cannot be empty".to_string(),
            ));
        }
    }

    tracing::info!(count = request.documents.len(), "indexing request received");
    let summary = state.indexer.index_documents(&request.documents).await;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    status: String,
    message: String,
}

async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state
        .indexer
        .delete_document(&document_id)
        .await
        .map_err(|index_error| ApiError::NotFound(index_error.to_string()))?;

    Ok(Json(DeleteResponse {
        status: "success".to_string(),
        message: format!("Document {document_id} deleted"),
    }))
}

async fn stats(State(state): State<AppState>) -> Result<Json<CollectionStats>, ApiError> {
    let stats = state
        .indexer
        .collection_stats()
        .await
        .map_err(|index_error| ApiError::Internal(index_error.to_string()))?;
    Ok(Json(stats))
}
