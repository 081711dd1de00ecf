use axum::extract::Multipart;
use axum::routing::post;
use axum::{Json, Router};
use rag_chat_core::extract::extract_text;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/upload", post(upload))
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    filename: String,
    text: String,
    char_count: usize,
    #[serde(rename = "type")]
    file_type: String,
}

/// Extracts plain text from a multipart file upload so it can be submitted
/// to `/index`. Parsing is delegated entirely to the extraction library
/// calls.
async fn upload(mut multipart: Multipart) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|multipart_error| ApiError::BadRequest(multipart_error.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("uploaded file has no filename".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|multipart_error| ApiError::BadRequest(multipart_error.to_string()))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload
        .ok_or_else(|| ApiError::BadRequest("multipart body has no file field".to_string()))?;

    tracing::info!(filename = %filename, bytes = bytes.len(), "extracting upload");
    let text = extract_text(&filename, &bytes).map_err(ApiError::from)?;

    let file_type = filename
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();

    Ok(Json(UploadResponse {
        char_count: text.chars().count(),
        filename,
        text,
        file_type,
    }))
}
