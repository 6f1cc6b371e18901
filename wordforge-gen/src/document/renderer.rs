//! Word-processor document rendering via pandoc
//!
//! The converter is an external binary invoked per document. A missing
//! binary, a conversion timeout, and a non-zero exit are distinct
//! [`RenderError`] variants so the task engine can report them precisely.

use crate::document::structure::{inject_images, placeholder_when_no_images, ImagePlacement};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use wordforge_common::config::RendererSettings;

/// Renderer errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("converter binary not found: {0}")]
    MissingBinary(String),

    #[error("conversion timed out after {0}s")]
    Timeout(u64),

    #[error("converter exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One image to place into the rendered document.
#[derive(Debug, Clone)]
pub struct PlacedImage {
    pub path: String,
    pub paragraph_index: Option<usize>,
}

/// Document-assembly collaborator contract.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Render markdown (with images injected) to a document file and return
    /// the output filename.
    async fn render(
        &self,
        title: &str,
        markdown: &str,
        images: &[PlacedImage],
    ) -> Result<String, RenderError>;
}

/// Pandoc-backed renderer writing `.docx` files into the output directory.
pub struct PandocRenderer {
    settings: RendererSettings,
    output_dir: PathBuf,
    images_enabled: bool,
}

impl PandocRenderer {
    pub fn new(settings: RendererSettings, output_dir: PathBuf, images_enabled: bool) -> Self {
        Self {
            settings,
            output_dir,
            images_enabled,
        }
    }

    fn prepare_markdown(&self, markdown: &str, images: &[PlacedImage]) -> String {
        if !self.images_enabled {
            return markdown.to_string();
        }
        if images.is_empty() {
            return placeholder_when_no_images(markdown);
        }
        let placements: Vec<ImagePlacement<'_>> = images
            .iter()
            .map(|img| ImagePlacement {
                path: &img.path,
                paragraph_index: img.paragraph_index,
            })
            .collect();
        inject_images(markdown, &placements)
    }

    async fn cleanup(&self, md_path: &Path, images: &[PlacedImage]) {
        if let Err(e) = tokio::fs::remove_file(md_path).await {
            tracing::debug!(path = %md_path.display(), error = %e, "Temp markdown cleanup failed");
        }
        // Downloaded and generated images are throwaway once embedded.
        for image in images {
            let path = Path::new(&image.path);
            let is_temp = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("temp_"))
                .unwrap_or(false);
            if is_temp {
                if let Err(e) = tokio::fs::remove_file(path).await {
                    tracing::debug!(path = %path.display(), error = %e, "Temp image cleanup failed");
                }
            }
        }
    }
}

#[async_trait]
impl DocumentRenderer for PandocRenderer {
    async fn render(
        &self,
        title: &str,
        markdown: &str,
        images: &[PlacedImage],
    ) -> Result<String, RenderError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let safe_title = sanitize_title(title);
        let filename = format!("{safe_title}.docx");
        let out_path = self.output_dir.join(&filename);
        let md_path = self.output_dir.join(format!("{safe_title}.md"));

        let content = self.prepare_markdown(markdown, images);
        tokio::fs::write(&md_path, &content).await?;

        let result = tokio::time::timeout(
            Duration::from_secs(self.settings.timeout_secs),
            Command::new(&self.settings.pandoc_path)
                .arg(&md_path)
                .arg("-o")
                .arg(&out_path)
                .arg("--standalone")
                .stdin(Stdio::null())
                .output(),
        )
        .await;

        let outcome = match result {
            Err(_) => Err(RenderError::Timeout(self.settings.timeout_secs)),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RenderError::MissingBinary(self.settings.pandoc_path.clone()))
            }
            Ok(Err(e)) => Err(RenderError::Io(e)),
            Ok(Ok(output)) if !output.status.success() => Err(RenderError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            Ok(Ok(_)) => Ok(filename.clone()),
        };

        self.cleanup(&md_path, images).await;

        match &outcome {
            Ok(filename) => {
                tracing::info!(filename = %filename, "Document rendered");
            }
            Err(e) => {
                tracing::error!(title = %title, error = %e, "Document rendering failed");
            }
        }
        outcome
    }
}

/// Strip characters that are illegal or awkward in filenames.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\n' | '\r' | '\t' => ' ',
            _ => c,
        })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim().trim_matches('.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.chars().take(120).collect()
    }
}

/// One entry in the generated-document history listing.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentEntry {
    pub filename: String,
    pub title: String,
    pub size: u64,
    pub created: DateTime<Utc>,
}

/// List rendered documents, newest first.
pub fn list_documents(output_dir: &Path) -> std::io::Result<Vec<DocumentEntry>> {
    let mut entries = Vec::new();
    if !output_dir.exists() {
        return Ok(entries);
    }

    for entry in std::fs::read_dir(output_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(".docx") || name.starts_with('~') {
            continue;
        }
        let metadata = entry.metadata()?;
        let created: DateTime<Utc> = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());
        entries.push(DocumentEntry {
            title: name.trim_end_matches(".docx").to_string(),
            filename: name,
            size: metadata.len(),
            created,
        });
    }

    entries.sort_by(|a, b| b.created.cmp(&a.created));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize_title("a/b\\c: d?"), "a b c d");
        assert_eq!(sanitize_title("  \t "), "untitled");
        assert_eq!(sanitize_title("..."), "untitled");
    }

    #[test]
    fn sanitize_limits_length() {
        let long = "x".repeat(400);
        assert_eq!(sanitize_title(&long).chars().count(), 120);
    }

    #[test]
    fn list_documents_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.docx"), b"a").unwrap();
        std::fs::write(dir.path().join("~lock.docx"), b"b").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"c").unwrap();
        let entries = list_documents(dir.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "one.docx");
        assert_eq!(entries[0].title, "one");
    }
}
