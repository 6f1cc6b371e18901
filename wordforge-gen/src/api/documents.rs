//! Document history and download endpoints

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::document::{list_documents, DocumentEntry};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub files: Vec<DocumentEntry>,
}

/// GET /api/history
pub async fn history(State(state): State<AppState>) -> ApiResult<Json<HistoryResponse>> {
    let dir = std::path::PathBuf::from(&state.settings.output.directory);
    let files = tokio::task::spawn_blocking(move || list_documents(&dir))
        .await
        .map_err(|e| ApiError::Internal(format!("listing task failed: {e}")))??;
    Ok(Json(HistoryResponse { files }))
}

/// GET /api/download/:filename
///
/// Only bare filenames are accepted; anything that resolves outside the
/// output directory is rejected before touching the filesystem.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let is_bare = std::path::Path::new(&filename)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n == filename)
        .unwrap_or(false);
    if !is_bare || filename.starts_with('.') {
        return Err(ApiError::BadRequest("invalid filename".to_string()));
    }

    let path = std::path::Path::new(&state.settings.output.directory).join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound(format!("no such document: {filename}")));
        }
        Err(e) => return Err(ApiError::Io(e)),
    };

    let response = (
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                    .to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response();
    Ok(response)
}

pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route("/api/history", get(history))
        .route("/api/download/:filename", get(download))
}
