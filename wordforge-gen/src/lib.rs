//! wordforge-gen library interface
//!
//! Exposes the service internals for integration testing.

pub mod api;
pub mod document;
pub mod error;
pub mod providers;
pub mod services;
pub mod tasks;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use wordforge_common::Settings;

use crate::tasks::TaskCoordinator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub coordinator: Arc<TaskCoordinator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>, coordinator: Arc<TaskCoordinator>) -> Self {
        Self {
            settings,
            coordinator,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::generate_routes())
        .merge(api::document_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
