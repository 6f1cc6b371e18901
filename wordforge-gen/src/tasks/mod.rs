//! Batch generation task engine
//!
//! A job tracks one batch of topics through generation. All job state lives
//! in process memory; restart loses history, which is acceptable because the
//! rendered documents themselves persist on disk.

pub mod coordinator;
pub mod registry;
pub mod worker;

pub use coordinator::{RetryOutcome, TaskCoordinator};
pub use registry::{RetryPlan, TaskRegistry};
pub use worker::ArticleWorker;

use crate::document::RenderError;
use crate::services::text_generator::UpstreamError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Diagnostic recorded for topics that vanished from a batch without a
/// result, typically a panicked or aborted worker.
pub const GHOST_TASK_ERROR: &str = "task was interrupted or timed out during execution";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
}

/// Per-image metadata carried in a topic result.
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub source: String,
    pub path: String,
    pub summary: String,
    pub paragraph_index: Option<usize>,
    pub order: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicResult {
    pub topic: String,
    pub article_title: String,
    pub filename: String,
    pub image_count: usize,
    pub images: Vec<ImageInfo>,
    pub has_image: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicError {
    pub topic: String,
    pub error: String,
    pub retry_count: u32,
}

/// One batch job. Lives inside the registry mutex; external readers only
/// ever see a [`JobSnapshot`].
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub total: usize,
    pub results: Vec<TopicResult>,
    pub errors: Vec<TopicError>,
    pub retry_counts: HashMap<String, u32>,
    pub progress: f64,
    pub topic_images: HashMap<String, Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn recompute_progress(&mut self) {
        let completed = self.results.len() + self.errors.len();
        self.progress = if self.total > 0 {
            completed as f64 * 100.0 / self.total as f64
        } else {
            0.0
        };
    }
}

/// Serializable copy of a job's externally visible state.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub task_id: Uuid,
    pub status: JobStatus,
    pub total: usize,
    pub progress: f64,
    pub results: Vec<TopicResult>,
    pub errors: Vec<TopicError>,
    pub created_at: DateTime<Utc>,
}

/// Fatal per-topic failures. Image exhaustion is deliberately absent; a
/// document with fewer images than requested still succeeds.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("{0}")]
    Upstream(#[from] UpstreamError),

    #[error("document rendering failed: {0}")]
    Render(#[from] RenderError),
}
