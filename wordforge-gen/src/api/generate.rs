//! Generation and job tracking endpoints

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::tasks::{JobSnapshot, RetryOutcome};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub topics: Vec<String>,
    /// Optional caller-supplied image paths per topic, placed before any
    /// source-resolved images.
    #[serde(default)]
    pub topic_images: HashMap<String, Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub task_id: Uuid,
}

/// POST /api/generate
pub async fn start_generation(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let topics: Vec<String> = request
        .topics
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if topics.is_empty() {
        return Err(ApiError::BadRequest("no topics supplied".to_string()));
    }
    if state.settings.text.api_key.is_empty() {
        return Err(ApiError::BadRequest(
            "text generation API key is not configured".to_string(),
        ));
    }
    if state.settings.renderer.pandoc_path.is_empty() {
        return Err(ApiError::BadRequest(
            "document converter path is not configured".to_string(),
        ));
    }

    let task_id = state
        .coordinator
        .submit_batch(topics, request.topic_images);
    Ok(Json(GenerateResponse {
        success: true,
        task_id,
    }))
}

/// GET /api/generate/status/:task_id
pub async fn generation_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<JobSnapshot>> {
    state
        .coordinator
        .registry()
        .snapshot(task_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("unknown task: {task_id}")))
}

#[derive(Debug, Deserialize)]
pub struct RetryRequest {
    pub task_id: Uuid,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub success: bool,
    pub task_id: Uuid,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub new_task: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    pub message: String,
}

/// POST /api/generate/retry
pub async fn retry_generation(
    State(state): State<AppState>,
    Json(request): Json<RetryRequest>,
) -> ApiResult<Json<RetryResponse>> {
    if request.topics.is_empty() {
        return Err(ApiError::BadRequest("no topics supplied".to_string()));
    }

    let response = match state.coordinator.retry(request.task_id, request.topics) {
        RetryOutcome::NewJob(task_id) => RetryResponse {
            success: true,
            task_id,
            new_task: true,
            skipped: false,
            message: "original task no longer exists, started a new one".to_string(),
        },
        RetryOutcome::Resubmitted(task_id) => RetryResponse {
            success: true,
            task_id,
            new_task: false,
            skipped: false,
            message: "failed topics re-queued".to_string(),
        },
        RetryOutcome::Skipped => RetryResponse {
            success: true,
            task_id: request.task_id,
            new_task: false,
            skipped: true,
            message: "all requested topics already succeeded".to_string(),
        },
    };
    Ok(Json(response))
}

pub fn generate_routes() -> Router<AppState> {
    Router::new()
        .route("/api/generate", post(start_generation))
        .route("/api/generate/status/:task_id", get(generation_status))
        .route("/api/generate/retry", post(retry_generation))
}
