//! ComfyUI generative image source
//!
//! Drives a local ComfyUI server with an exported API-format workflow. The
//! workflow JSON carries `{{positive_prompt}}` / `{{negative_prompt}}`
//! placeholders that are patched per request, plus a randomized seed. The
//! job is queued with `POST /prompt`, polled via `GET /history/{id}`, and
//! the finished image downloaded from `GET /view`.

use crate::providers::{Attempt, ImageProvider, ImageRequest, ProviderKind, ResolvedImage, SourceId};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;
use wordforge_common::config::ComfyUiSettings;

pub struct ComfyUiProvider {
    client: reqwest::Client,
    settings: ComfyUiSettings,
    uploads_dir: PathBuf,
}

impl ComfyUiProvider {
    pub fn new(settings: ComfyUiSettings, uploads_dir: PathBuf) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            settings,
            uploads_dir,
        }
    }

    fn server(&self) -> String {
        self.settings.base_url.trim_end_matches('/').to_string()
    }

    async fn load_workflow(&self, request: &ImageRequest) -> Result<Value, String> {
        let raw = tokio::fs::read_to_string(&self.settings.workflow_path)
            .await
            .map_err(|e| format!("workflow file unreadable: {e}"))?;
        let parsed: Value =
            serde_json::from_str(&raw).map_err(|e| format!("workflow JSON invalid: {e}"))?;

        // Accept both a bare node graph and an export wrapped in {"prompt": ...}.
        let mut graph = if parsed.get("prompt").map_or(false, Value::is_object) {
            parsed["prompt"].clone()
        } else {
            parsed
        };
        if !graph.is_object() {
            return Err("workflow JSON is not a node graph".to_string());
        }

        patch_graph(&mut graph, &request.prompt, &request.negative_prompt);
        Ok(graph)
    }

    async fn submit(&self, graph: Value) -> Result<String, String> {
        let response = self
            .client
            .post(format!("{}/prompt", self.server()))
            .json(&serde_json::json!({ "prompt": graph }))
            .send()
            .await
            .map_err(|e| format!("queue request failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("queue request returned HTTP {status}"));
        }
        let value: Value = response
            .json()
            .await
            .map_err(|e| format!("malformed queue response: {e}"))?;
        value
            .get("prompt_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| "queue response carried no prompt_id".to_string())
    }

    /// Poll job history until an output image appears or the deadline hits.
    async fn await_output(&self, prompt_id: &str) -> Result<Value, String> {
        let deadline = Instant::now() + Duration::from_secs(self.settings.timeout_secs);
        let interval = Duration::from_millis(self.settings.poll_interval_ms.max(100));

        loop {
            if Instant::now() >= deadline {
                return Err(format!(
                    "generation timed out after {}s",
                    self.settings.timeout_secs
                ));
            }
            tokio::time::sleep(interval).await;

            let response = match self
                .client
                .get(format!("{}/history/{}", self.server(), prompt_id))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(error = %e, "History poll failed, retrying");
                    continue;
                }
            };
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                continue;
            }
            let history: Value = match response.json().await {
                Ok(v) => v,
                Err(_) => continue,
            };

            let entry = history
                .get(prompt_id)
                .or_else(|| {
                    history
                        .as_object()
                        .and_then(|map| map.values().find(|v| v.get("outputs").is_some()))
                })
                .unwrap_or(&history);

            if let Some(status) = entry
                .get("status")
                .and_then(|s| s.get("status"))
                .and_then(|s| s.as_str())
            {
                if status == "error" {
                    let message = entry
                        .get("status")
                        .and_then(|s| s.get("message"))
                        .and_then(|m| m.as_str())
                        .unwrap_or("server reported an error");
                    return Err(message.to_string());
                }
            }

            if let Some(outputs) = entry.get("outputs") {
                if outputs.as_object().map(|o| !o.is_empty()).unwrap_or(false) {
                    return Ok(outputs.clone());
                }
            }
        }
    }

    async fn download(&self, image_meta: &Value) -> Result<PathBuf, String> {
        let filename = image_meta
            .get("filename")
            .and_then(|f| f.as_str())
            .ok_or_else(|| "output image has no filename".to_string())?;
        let subfolder = image_meta
            .get("subfolder")
            .and_then(|s| s.as_str())
            .unwrap_or("");
        let image_type = image_meta
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("output");

        let response = self
            .client
            .get(format!("{}/view", self.server()))
            .query(&[
                ("filename", filename),
                ("subfolder", subfolder),
                ("type", image_type),
            ])
            .send()
            .await
            .map_err(|e| format!("image download failed: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("image download returned HTTP {status}"));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("image download failed: {e}"))?;

        tokio::fs::create_dir_all(&self.uploads_dir)
            .await
            .map_err(|e| format!("uploads dir unavailable: {e}"))?;
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        let path = self
            .uploads_dir
            .join(format!("temp_{}.{ext}", Uuid::new_v4().simple()));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| format!("image write failed: {e}"))?;
        Ok(path)
    }
}

#[async_trait]
impl ImageProvider for ComfyUiProvider {
    fn id(&self) -> SourceId {
        SourceId::ComfyUi
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Generative
    }

    async fn generate(&self, request: &ImageRequest) -> Attempt {
        let graph = match self.load_workflow(request).await {
            Ok(graph) => graph,
            Err(e) => return Attempt::Failed(e),
        };
        let prompt_id = match self.submit(graph).await {
            Ok(id) => id,
            Err(e) => return Attempt::Failed(e),
        };
        tracing::debug!(prompt_id = %prompt_id, ordinal = request.ordinal, "Workflow queued");

        let outputs = match self.await_output(&prompt_id).await {
            Ok(outputs) => outputs,
            Err(e) => return Attempt::Failed(e),
        };

        let Some(image_meta) = first_output_image(&outputs) else {
            return Attempt::Failed("no image node in workflow outputs".to_string());
        };
        match self.download(&image_meta).await {
            Ok(path) => Attempt::Fetched(ResolvedImage {
                path: path.to_string_lossy().into_owned(),
                source: SourceId::ComfyUi,
            }),
            Err(e) => Attempt::Failed(e),
        }
    }
}

/// Replace prompt placeholders and randomize every seed input in the graph.
fn patch_graph(graph: &mut Value, positive: &str, negative: &str) {
    let seed: i64 = rand::thread_rng().gen_range(1..i64::from(i32::MAX));
    let Some(nodes) = graph.as_object_mut() else {
        return;
    };
    for node in nodes.values_mut() {
        let Some(inputs) = node.get_mut("inputs").and_then(|i| i.as_object_mut()) else {
            continue;
        };
        for (key, value) in inputs.iter_mut() {
            if key == "seed" {
                *value = Value::from(seed);
                continue;
            }
            if let Some(s) = value.as_str() {
                let replaced = s
                    .replace("{{positive_prompt}}", positive)
                    .replace("{{negative_prompt}}", negative)
                    .replace("{{filename_prefix}}", "wordforge");
                if replaced != s {
                    *value = Value::from(replaced);
                }
            }
        }
    }
}

/// Find the first image reference across all output nodes.
fn first_output_image(outputs: &Value) -> Option<Value> {
    outputs
        .as_object()?
        .values()
        .filter_map(|node| node.get("images")?.as_array())
        .flatten()
        .find(|img| img.get("filename").is_some())
        .cloned()
}
