//! Image sources
//!
//! Every image in a document is resolved through an ordered chain of
//! providers. A provider is either generative (produces a fresh image from a
//! prompt) or listed (searches for existing images and downloads one). The
//! chain order comes from configuration; the [`FallbackResolver`] walks it
//! left to right until a source yields an image.

pub mod comfyui;
pub mod gemini_image;
pub mod local;
pub mod pool;
pub mod resolver;
pub mod stock;

pub use pool::CandidatePool;
pub use resolver::FallbackResolver;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use wordforge_common::config::{MissingSourcePolicy, Settings};

/// Stable identifier for each image source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    GeminiImage,
    ComfyUi,
    Unsplash,
    Pexels,
    Pixabay,
    Local,
}

impl SourceId {
    /// Canonical ordering, used when config omits sources.
    pub const ALL: [SourceId; 6] = [
        SourceId::GeminiImage,
        SourceId::ComfyUi,
        SourceId::Unsplash,
        SourceId::Pexels,
        SourceId::Pixabay,
        SourceId::Local,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::GeminiImage => "gemini_image",
            SourceId::ComfyUi => "comfyui",
            SourceId::Unsplash => "unsplash",
            SourceId::Pexels => "pexels",
            SourceId::Pixabay => "pixabay",
            SourceId::Local => "local",
        }
    }

    pub fn parse(s: &str) -> Option<SourceId> {
        match s {
            "gemini_image" => Some(SourceId::GeminiImage),
            "comfyui" => Some(SourceId::ComfyUi),
            "unsplash" => Some(SourceId::Unsplash),
            "pexels" => Some(SourceId::Pexels),
            "pixabay" => Some(SourceId::Pixabay),
            "local" => Some(SourceId::Local),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a provider participates in resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Produces a fresh image per request; one attempt per slot.
    Generative,
    /// Exposes a searchable list of candidates fetched one at a time.
    Listed,
}

/// One image request flowing down the chain.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    /// Position of the image within the document; 0 is the showcase image
    /// prompted from the whole topic.
    pub ordinal: usize,
    pub paragraph_index: Option<usize>,
    pub prompt: String,
    pub negative_prompt: String,
    /// Search keyword for listed sources.
    pub keyword: String,
}

/// An image a source actually delivered.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub path: String,
    pub source: SourceId,
}

/// Outcome of one generative attempt.
#[derive(Debug)]
pub enum Attempt {
    Fetched(ResolvedImage),
    Skipped(String),
    Failed(String),
}

/// Errors from listed-source search and download.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Image source contract.
///
/// Generative sources implement `generate`; listed sources implement
/// `list_candidates` and `fetch`. The defaults make the unused half inert so
/// the resolver can call either without knowing the concrete type.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn id(&self) -> SourceId;

    fn kind(&self) -> ProviderKind;

    async fn generate(&self, _request: &ImageRequest) -> Attempt {
        Attempt::Skipped("source does not generate images".to_string())
    }

    /// Search once for candidate locators (URLs or local paths).
    async fn list_candidates(&self, _keyword: &str) -> Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Materialize one candidate as a local file.
    async fn fetch(&self, _candidate: &str) -> Result<PathBuf, ProviderError> {
        Err(ProviderError::Other(
            "source does not list candidates".to_string(),
        ))
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

pub(crate) fn has_image_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_configured(id: SourceId, settings: &Settings) -> bool {
    let images = &settings.images;
    match id {
        SourceId::GeminiImage => images.gemini.enabled && !images.gemini.api_key.is_empty(),
        SourceId::ComfyUi => images.comfyui.enabled && !images.comfyui.workflow_path.is_empty(),
        SourceId::Unsplash => !images.unsplash.access_key.is_empty(),
        SourceId::Pexels => !images.pexels.api_key.is_empty(),
        SourceId::Pixabay => !images.pixabay.api_key.is_empty(),
        SourceId::Local => !images.local.directories.is_empty(),
    }
}

fn instantiate(id: SourceId, settings: &Settings) -> Arc<dyn ImageProvider> {
    let images = &settings.images;
    let uploads = PathBuf::from(&settings.output.uploads_dir);
    match id {
        SourceId::GeminiImage => Arc::new(gemini_image::GeminiImageProvider::new(
            images.gemini.clone(),
            uploads,
        )),
        SourceId::ComfyUi => Arc::new(comfyui::ComfyUiProvider::new(
            images.comfyui.clone(),
            uploads,
        )),
        SourceId::Unsplash => Arc::new(stock::UnsplashProvider::new(
            images.unsplash.clone(),
            uploads,
        )),
        SourceId::Pexels => Arc::new(stock::PexelsProvider::new(images.pexels.clone(), uploads)),
        SourceId::Pixabay => Arc::new(stock::PixabayProvider::new(images.pixabay.clone(), uploads)),
        SourceId::Local => Arc::new(local::LocalImageProvider::new(images.local.clone())),
    }
}

/// Resolve the configured priority list into an ordered provider chain.
///
/// Unknown names are dropped with a warning, duplicates keep their first
/// position, and configured-but-unlisted sources join the chain per the
/// missing-source policy. Sources that are disabled or lack credentials are
/// excluded entirely.
pub fn build_chain(settings: &Settings) -> Vec<Arc<dyn ImageProvider>> {
    let mut order: Vec<SourceId> = Vec::new();
    for name in &settings.images.priority {
        match SourceId::parse(name) {
            Some(id) if order.contains(&id) => {
                tracing::warn!(source = %id, "Duplicate source in priority list ignored");
            }
            Some(id) => order.push(id),
            None => {
                tracing::warn!(source = %name, "Unknown image source in priority list ignored");
            }
        }
    }

    let missing: Vec<SourceId> = SourceId::ALL
        .iter()
        .copied()
        .filter(|id| !order.contains(id) && is_configured(*id, settings))
        .collect();
    if !missing.is_empty() {
        match settings.images.missing_source_policy {
            MissingSourcePolicy::Prepend => {
                for (i, id) in missing.iter().enumerate() {
                    tracing::info!(source = %id, "Configured source missing from priority list, trying it first");
                    order.insert(i, *id);
                }
            }
            MissingSourcePolicy::Append => {
                for id in &missing {
                    tracing::info!(source = %id, "Configured source missing from priority list, trying it last");
                    order.push(*id);
                }
            }
            MissingSourcePolicy::Ignore => {
                for id in &missing {
                    tracing::debug!(source = %id, "Configured source missing from priority list, skipping");
                }
            }
        }
    }

    order
        .into_iter()
        .filter(|id| {
            let ok = is_configured(*id, settings);
            if !ok {
                tracing::debug!(source = %id, "Source not configured, excluded from chain");
            }
            ok
        })
        .map(|id| instantiate(id, settings))
        .collect()
}
