//! Configuration loading for WordForge
//!
//! Settings are read from a TOML file and then overlaid with environment
//! variables for secret material. Resolution order for the file itself:
//!
//! 1. explicit path passed by the caller
//! 2. `WORDFORGE_CONFIG` environment variable
//! 3. `~/.config/wordforge/wordforge.toml`
//!
//! A missing file is not an error; every field has a default so the service
//! can boot for local experimentation and report unconfigured collaborators
//! at request time.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV: &str = "WORDFORGE_CONFIG";

/// Top-level service settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub text: TextSettings,
    pub images: ImageSettings,
    pub output: OutputSettings,
    pub tasks: TaskSettings,
    pub renderer: RendererSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address, e.g. `127.0.0.1:5740`
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5740".to_string(),
        }
    }
}

/// Text-generation collaborator (Gemini-style `generateContent` API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Model used for per-section image summaries; falls back to `model`.
    pub summary_model: Option<String>,
    /// Article prompt template; `{topic}` is substituted. Empty uses the
    /// built-in template.
    pub prompt_template: String,
    pub temperature: f64,
    pub top_p: f64,
    pub timeout_secs: u64,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-pro".to_string(),
            summary_model: None,
            prompt_template: String::new(),
            temperature: 1.0,
            top_p: 0.95,
            timeout_secs: 120,
        }
    }
}

impl TextSettings {
    pub fn summary_model(&self) -> &str {
        match self.summary_model.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => &self.model,
        }
    }
}

/// Policy for image sources that are enabled but missing from the
/// configured priority list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSourcePolicy {
    /// Place unlisted enabled sources before the configured list.
    Prepend,
    /// Place unlisted enabled sources after the configured list.
    Append,
    /// Use only sources named in the priority list.
    Ignore,
}

impl Default for MissingSourcePolicy {
    fn default() -> Self {
        MissingSourcePolicy::Prepend
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub enabled: bool,
    /// Target number of images per document.
    pub count: usize,
    /// Ordered source identifiers tried left to right.
    pub priority: Vec<String>,
    pub missing_source_policy: MissingSourcePolicy,
    pub gemini: GeminiImageSettings,
    pub comfyui: ComfyUiSettings,
    pub unsplash: UnsplashSettings,
    pub pexels: PexelsSettings,
    pub pixabay: PixabaySettings,
    pub local: LocalImageSettings,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 1,
            priority: vec![
                "gemini_image".to_string(),
                "comfyui".to_string(),
                "pexels".to_string(),
                "unsplash".to_string(),
                "pixabay".to_string(),
                "local".to_string(),
            ],
            missing_source_policy: MissingSourcePolicy::default(),
            gemini: GeminiImageSettings::default(),
            comfyui: ComfyUiSettings::default(),
            unsplash: UnsplashSettings::default(),
            pexels: PexelsSettings::default(),
            pixabay: PixabaySettings::default(),
            local: LocalImageSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiImageSettings {
    pub enabled: bool,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub style: String,
    pub aspect_ratio: String,
    pub timeout_secs: u64,
}

impl Default for GeminiImageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            style: "realistic".to_string(),
            aspect_ratio: "16:9".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComfyUiSettings {
    pub enabled: bool,
    pub base_url: String,
    /// Exported API-format workflow JSON; required for the source to be usable.
    pub workflow_path: String,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ComfyUiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://127.0.0.1:8188".to_string(),
            workflow_path: String::new(),
            poll_interval_ms: 1000,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsplashSettings {
    pub access_key: String,
    pub per_page: u32,
}

impl Default for UnsplashSettings {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            per_page: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PexelsSettings {
    pub api_key: String,
    pub per_page: u32,
}

impl Default for PexelsSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            per_page: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PixabaySettings {
    pub api_key: String,
    pub per_page: u32,
}

impl Default for PixabaySettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            per_page: 20,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalImageSettings {
    pub directories: Vec<LocalImageDir>,
}

/// One local image directory with optional topic tags for matching.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalImageDir {
    pub path: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory for rendered documents.
    pub directory: PathBuf,
    /// Directory for downloaded and generated temp images.
    pub uploads_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            uploads_dir: PathBuf::from("uploads"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Articles generated concurrently within one batch.
    pub max_concurrent_articles: usize,
    /// Attempts per topic before a terminal failure is recorded.
    pub max_retry_attempts: u32,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            max_concurrent_articles: 3,
            max_retry_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub pandoc_path: String,
    pub timeout_secs: u64,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            pandoc_path: "pandoc".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Settings {
    /// Load settings from the resolved config file, then apply environment
    /// overrides and validate.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut settings = match Self::resolve_path(explicit_path) {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                let parsed: Settings = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("parse {}: {}", path.display(), e)))?;
                info!(path = %path.display(), "Configuration loaded");
                parsed
            }
            Some(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Settings::default()
            }
            None => {
                info!("No config file configured, using defaults");
                Settings::default()
            }
        };

        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = explicit {
            return Some(p.to_path_buf());
        }
        if let Ok(p) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(p));
        }
        dirs::config_dir().map(|d| d.join("wordforge").join("wordforge.toml"))
    }

    /// Secrets may live in the environment instead of the TOML file.
    pub fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 5] = [
            ("WORDFORGE_GEMINI_API_KEY", &mut self.text.api_key),
            ("WORDFORGE_GEMINI_IMAGE_API_KEY", &mut self.images.gemini.api_key),
            ("WORDFORGE_UNSPLASH_ACCESS_KEY", &mut self.images.unsplash.access_key),
            ("WORDFORGE_PEXELS_API_KEY", &mut self.images.pexels.api_key),
            ("WORDFORGE_PIXABAY_API_KEY", &mut self.images.pixabay.api_key),
        ];
        for (var, slot) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    *slot = value;
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("invalid bind_addr {:?}: {}", self.server.bind_addr, e)))?;
        if self.images.count == 0 {
            return Err(Error::Config("images.count must be at least 1".to_string()));
        }
        if self.tasks.max_concurrent_articles == 0 {
            return Err(Error::Config(
                "tasks.max_concurrent_articles must be at least 1".to_string(),
            ));
        }
        if self.tasks.max_retry_attempts == 0 {
            return Err(Error::Config(
                "tasks.max_retry_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.tasks.max_concurrent_articles, 3);
        assert_eq!(settings.tasks.max_retry_attempts, 2);
        assert_eq!(settings.images.count, 1);
    }

    #[test]
    fn empty_toml_parses_to_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.server.bind_addr, "127.0.0.1:5740");
        assert!(settings.images.enabled);
        assert_eq!(settings.images.priority.len(), 6);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [tasks]
            max_concurrent_articles = 8

            [images]
            count = 3
            priority = ["pexels", "local"]
            missing_source_policy = "ignore"
            "#,
        )
        .unwrap();
        assert_eq!(settings.tasks.max_concurrent_articles, 8);
        assert_eq!(settings.tasks.max_retry_attempts, 2);
        assert_eq!(settings.images.count, 3);
        assert_eq!(settings.images.priority, vec!["pexels", "local"]);
        assert_eq!(
            settings.images.missing_source_policy,
            MissingSourcePolicy::Ignore
        );
    }

    #[test]
    fn summary_model_falls_back_to_main_model() {
        let mut text = TextSettings::default();
        assert_eq!(text.summary_model(), "gemini-pro");
        text.summary_model = Some("gemini-flash".to_string());
        assert_eq!(text.summary_model(), "gemini-flash");
        text.summary_model = Some(String::new());
        assert_eq!(text.summary_model(), "gemini-pro");
    }

    #[test]
    fn zero_retry_attempts_rejected() {
        let mut settings = Settings::default();
        settings.tasks.max_retry_attempts = 0;
        assert!(settings.validate().is_err());
    }
}
