//! Local image library source
//!
//! Scans configured directories for image files. Directories carry tags;
//! when any tag appears in the search keyword only the matching directories
//! are scanned, otherwise the whole library is fair game. Fetch is identity
//! since candidates are already local paths.

use crate::providers::{has_image_extension, ImageProvider, ProviderError, ProviderKind, SourceId};
use async_trait::async_trait;
use std::path::PathBuf;
use walkdir::WalkDir;
use wordforge_common::config::{LocalImageDir, LocalImageSettings};

pub struct LocalImageProvider {
    settings: LocalImageSettings,
}

impl LocalImageProvider {
    pub fn new(settings: LocalImageSettings) -> Self {
        Self { settings }
    }

    fn matching_dirs(&self, keyword: &str) -> Vec<&LocalImageDir> {
        let keyword = keyword.to_lowercase();
        let tagged: Vec<&LocalImageDir> = self
            .settings
            .directories
            .iter()
            .filter(|dir| {
                dir.tags
                    .iter()
                    .any(|tag| !tag.is_empty() && keyword.contains(&tag.to_lowercase()))
            })
            .collect();
        if tagged.is_empty() {
            self.settings.directories.iter().collect()
        } else {
            tagged
        }
    }
}

#[async_trait]
impl ImageProvider for LocalImageProvider {
    fn id(&self) -> SourceId {
        SourceId::Local
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Listed
    }

    async fn list_candidates(&self, keyword: &str) -> Result<Vec<String>, ProviderError> {
        let dirs: Vec<PathBuf> = self
            .matching_dirs(keyword)
            .into_iter()
            .map(|d| PathBuf::from(&d.path))
            .collect();

        // Directory walking is blocking IO; keep it off the async runtime.
        let candidates = tokio::task::spawn_blocking(move || {
            let mut found = Vec::new();
            for dir in dirs {
                if !dir.is_dir() {
                    tracing::debug!(path = %dir.display(), "Image directory missing, skipped");
                    continue;
                }
                for entry in WalkDir::new(&dir)
                    .max_depth(2)
                    .into_iter()
                    .filter_map(Result::ok)
                {
                    if entry.file_type().is_file() && has_image_extension(entry.path()) {
                        found.push(entry.path().to_string_lossy().into_owned());
                    }
                }
            }
            found
        })
        .await
        .map_err(|e| ProviderError::Other(format!("scan task failed: {e}")))?;

        Ok(candidates)
    }

    async fn fetch(&self, candidate: &str) -> Result<PathBuf, ProviderError> {
        let path = PathBuf::from(candidate);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ProviderError::Other(format!(
                "local image disappeared: {candidate}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(dirs: Vec<(&str, Vec<&str>)>) -> LocalImageSettings {
        LocalImageSettings {
            directories: dirs
                .into_iter()
                .map(|(path, tags)| LocalImageDir {
                    path: path.to_string(),
                    tags: tags.into_iter().map(str::to_string).collect(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn scans_only_image_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("b.PNG"), b"x").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"x").unwrap();

        let provider =
            LocalImageProvider::new(settings(vec![(dir.path().to_str().unwrap(), vec![])]));
        let mut candidates = provider.list_candidates("anything").await.unwrap();
        candidates.sort();
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].ends_with("a.jpg"));
        assert!(candidates[1].ends_with("b.PNG"));
    }

    #[test]
    fn tag_match_narrows_directories() {
        let provider = LocalImageProvider::new(settings(vec![
            ("pics/nature", vec!["forest", "mountain"]),
            ("pics/city", vec!["urban"]),
        ]));
        let dirs = provider.matching_dirs("misty mountain ridge");
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].path, "pics/nature");

        // No tag hit falls back to the whole library.
        assert_eq!(provider.matching_dirs("deep sea life").len(), 2);
    }

    #[tokio::test]
    async fn fetch_requires_existing_file() {
        let provider = LocalImageProvider::new(settings(vec![]));
        assert!(provider.fetch("/definitely/not/here.jpg").await.is_err());
    }
}
