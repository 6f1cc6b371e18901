//! Stock-photo sources
//!
//! Unsplash, Pexels and Pixabay share a shape: one landscape-oriented search
//! per document returning direct image URLs, then per-candidate downloads
//! into the uploads directory. A failed download is a candidate problem, not
//! a source problem, so the resolver just moves to the next URL.

use crate::providers::{ImageProvider, ProviderError, ProviderKind, SourceId};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;
use wordforge_common::config::{PexelsSettings, PixabaySettings, UnsplashSettings};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15);

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Download one image URL into `uploads_dir` as a throwaway `temp_` file.
async fn download_candidate(
    client: &reqwest::Client,
    url: &str,
    uploads_dir: &Path,
) -> Result<PathBuf, ProviderError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;

    tokio::fs::create_dir_all(uploads_dir).await?;
    let path = uploads_dir.join(format!("temp_{}.jpg", Uuid::new_v4().simple()));
    tokio::fs::write(&path, &bytes).await?;
    Ok(path)
}

// --- Unsplash ---

pub struct UnsplashProvider {
    client: reqwest::Client,
    settings: UnsplashSettings,
    uploads_dir: PathBuf,
}

#[derive(Deserialize)]
struct UnsplashSearch {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
}

#[derive(Deserialize)]
struct UnsplashUrls {
    regular: String,
}

impl UnsplashProvider {
    pub fn new(settings: UnsplashSettings, uploads_dir: PathBuf) -> Self {
        Self {
            client: http_client(),
            settings,
            uploads_dir,
        }
    }
}

#[async_trait]
impl ImageProvider for UnsplashProvider {
    fn id(&self) -> SourceId {
        SourceId::Unsplash
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Listed
    }

    async fn list_candidates(&self, keyword: &str) -> Result<Vec<String>, ProviderError> {
        if keyword.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .get("https://api.unsplash.com/search/photos")
            .timeout(SEARCH_TIMEOUT)
            .header(
                "Authorization",
                format!("Client-ID {}", self.settings.access_key),
            )
            .query(&[
                ("query", keyword.to_string()),
                ("per_page", self.settings.per_page.to_string()),
                ("orientation", "landscape".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let search: UnsplashSearch = response.json().await?;
        Ok(search.results.into_iter().map(|p| p.urls.regular).collect())
    }

    async fn fetch(&self, candidate: &str) -> Result<PathBuf, ProviderError> {
        download_candidate(&self.client, candidate, &self.uploads_dir).await
    }
}

// --- Pexels ---

pub struct PexelsProvider {
    client: reqwest::Client,
    settings: PexelsSettings,
    uploads_dir: PathBuf,
}

#[derive(Deserialize)]
struct PexelsSearch {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
}

#[derive(Deserialize)]
struct PexelsSrc {
    large: String,
}

impl PexelsProvider {
    pub fn new(settings: PexelsSettings, uploads_dir: PathBuf) -> Self {
        Self {
            client: http_client(),
            settings,
            uploads_dir,
        }
    }
}

#[async_trait]
impl ImageProvider for PexelsProvider {
    fn id(&self) -> SourceId {
        SourceId::Pexels
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Listed
    }

    async fn list_candidates(&self, keyword: &str) -> Result<Vec<String>, ProviderError> {
        if keyword.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .get("https://api.pexels.com/v1/search")
            .timeout(SEARCH_TIMEOUT)
            .header("Authorization", &self.settings.api_key)
            .query(&[
                ("query", keyword.to_string()),
                ("per_page", self.settings.per_page.to_string()),
                ("orientation", "landscape".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let search: PexelsSearch = response.json().await?;
        Ok(search.photos.into_iter().map(|p| p.src.large).collect())
    }

    async fn fetch(&self, candidate: &str) -> Result<PathBuf, ProviderError> {
        download_candidate(&self.client, candidate, &self.uploads_dir).await
    }
}

// --- Pixabay ---

pub struct PixabayProvider {
    client: reqwest::Client,
    settings: PixabaySettings,
    uploads_dir: PathBuf,
}

#[derive(Deserialize)]
struct PixabaySearch {
    #[serde(default)]
    hits: Vec<PixabayHit>,
}

#[derive(Deserialize)]
struct PixabayHit {
    #[serde(rename = "largeImageURL")]
    large_image_url: String,
}

impl PixabayProvider {
    pub fn new(settings: PixabaySettings, uploads_dir: PathBuf) -> Self {
        Self {
            client: http_client(),
            settings,
            uploads_dir,
        }
    }
}

#[async_trait]
impl ImageProvider for PixabayProvider {
    fn id(&self) -> SourceId {
        SourceId::Pixabay
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Listed
    }

    async fn list_candidates(&self, keyword: &str) -> Result<Vec<String>, ProviderError> {
        if keyword.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .get("https://pixabay.com/api/")
            .timeout(SEARCH_TIMEOUT)
            .query(&[
                ("key", self.settings.api_key.clone()),
                ("q", keyword.to_string()),
                ("per_page", self.settings.per_page.to_string()),
                ("image_type", "photo".to_string()),
                ("orientation", "horizontal".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let search: PixabaySearch = response.json().await?;
        Ok(search.hits.into_iter().map(|h| h.large_image_url).collect())
    }

    async fn fetch(&self, candidate: &str) -> Result<PathBuf, ProviderError> {
        download_candidate(&self.client, candidate, &self.uploads_dir).await
    }
}
