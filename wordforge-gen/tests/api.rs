//! HTTP API integration tests
//!
//! Exercises the router end to end with stubbed text and renderer
//! collaborators so no network or pandoc binary is needed.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wordforge_common::Settings;
use wordforge_gen::document::{DocumentRenderer, PlacedImage, RenderError};
use wordforge_gen::providers::FallbackResolver;
use wordforge_gen::services::blueprint::VisualBlueprint;
use wordforge_gen::services::text_generator::{Article, TextGenerator, UpstreamError};
use wordforge_gen::tasks::{ArticleWorker, TaskCoordinator, TaskRegistry};
use wordforge_gen::{build_router, AppState};

struct StubText;

#[async_trait]
impl TextGenerator for StubText {
    async fn generate_article(&self, topic: &str) -> Result<Article, UpstreamError> {
        Ok(Article {
            markdown: format!("# {topic}\n\nA body paragraph.\n"),
            citations: Vec::new(),
        })
    }

    async fn visual_blueprint(
        &self,
        _topic: &str,
        _article: &str,
    ) -> Result<VisualBlueprint, UpstreamError> {
        Err(UpstreamError::Malformed("not used".to_string()))
    }

    async fn summarize_paragraph(
        &self,
        _paragraph: &str,
        _topic: &str,
    ) -> Result<String, UpstreamError> {
        Err(UpstreamError::Malformed("not used".to_string()))
    }
}

struct StubRenderer;

#[async_trait]
impl DocumentRenderer for StubRenderer {
    async fn render(
        &self,
        title: &str,
        _markdown: &str,
        _images: &[PlacedImage],
    ) -> Result<String, RenderError> {
        Ok(format!("{title}.docx"))
    }
}

/// Router plus the tempdir backing its output directory.
fn test_state() -> (AppState, tempfile::TempDir) {
    let output = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.text.api_key = "test-key".to_string();
    settings.output.directory = output.path().to_path_buf();
    let settings = Arc::new(settings);

    let worker = ArticleWorker::new(
        Arc::new(StubText),
        Arc::new(StubRenderer),
        FallbackResolver::new(Vec::new()),
        0,
        false,
    );
    let coordinator = Arc::new(TaskCoordinator::new(
        Arc::new(TaskRegistry::new()),
        Arc::new(worker),
        2,
        2,
    ));
    (AppState::new(settings, coordinator), output)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_service_identity() {
    let (state, _dir) = test_state();
    let response = build_router(state).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "wordforge-gen");
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn generate_rejects_empty_topics() {
    let (state, _dir) = test_state();
    let response = build_router(state)
        .oneshot(post_json("/api/generate", json!({ "topics": ["  ", ""] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn generate_rejects_missing_api_key() {
    let (mut state, _dir) = test_state();
    let mut settings = (*state.settings).clone();
    settings.text.api_key = String::new();
    state.settings = Arc::new(settings);

    let response = build_router(state)
        .oneshot(post_json("/api/generate", json!({ "topics": ["alpha"] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generate_runs_batch_to_completion() {
    let (state, _dir) = test_state();
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/generate",
            json!({ "topics": ["alpha", "beta"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let task_id = body["task_id"].as_str().unwrap().to_string();

    // The batch runs in the background; poll until it completes.
    let mut status = Value::Null;
    for _ in 0..100 {
        let response = router
            .clone()
            .oneshot(get(&format!("/api/generate/status/{task_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        status = body_json(response).await;
        if status["status"] == "completed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(status["status"], "completed");
    assert_eq!(status["progress"], 100.0);
    assert_eq!(status["results"].as_array().unwrap().len(), 2);
    assert_eq!(status["errors"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn status_of_unknown_task_is_404() {
    let (state, _dir) = test_state();
    let response = build_router(state)
        .oneshot(get(&format!(
            "/api/generate/status/{}",
            uuid::Uuid::new_v4()
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retry_requires_topics() {
    let (state, _dir) = test_state();
    let response = build_router(state)
        .oneshot(post_json(
            "/api/generate/retry",
            json!({ "task_id": uuid::Uuid::new_v4(), "topics": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn retry_of_unknown_task_starts_a_new_job() {
    let (state, _dir) = test_state();
    let response = build_router(state)
        .oneshot(post_json(
            "/api/generate/retry",
            json!({ "task_id": uuid::Uuid::new_v4(), "topics": ["alpha"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["new_task"], true);
}

#[tokio::test]
async fn history_lists_rendered_documents() {
    let (state, dir) = test_state();
    std::fs::write(dir.path().join("A Story.docx"), b"doc").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

    let response = build_router(state)
        .oneshot(get("/api/history"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["filename"], "A Story.docx");
    assert_eq!(files[0]["title"], "A Story");
}

#[tokio::test]
async fn download_serves_document_as_attachment() {
    let (state, dir) = test_state();
    std::fs::write(dir.path().join("report.docx"), b"doc-bytes").unwrap();

    let response = build_router(state)
        .oneshot(get("/api/download/report.docx"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("report.docx"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"doc-bytes");
}

#[tokio::test]
async fn download_rejects_path_traversal() {
    let (state, dir) = test_state();
    std::fs::write(dir.path().join("report.docx"), b"doc").unwrap();
    let router = build_router(state);

    let response = router
        .clone()
        .oneshot(get("/api/download/%2E%2E%2Freport.docx"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router.oneshot(get("/api/download/missing.docx")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
