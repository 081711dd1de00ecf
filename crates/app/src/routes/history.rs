use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use rag_chat_core::HistoryEntry;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/history/{session_id}", get(get_history))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    session_id: String,
    history: Vec<HistoryEntry>,
    total_entries: usize,
}

async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryResponse> {
    let history = state
        .retriever
        .get_chat_history(&session_id, params.limit)
        .await;

    Json(HistoryResponse {
        total_entries: history.len(),
        session_id,
        history,
    })
}
