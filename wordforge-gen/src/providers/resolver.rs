//! Fallback resolution across the provider chain
//!
//! One call resolves one image slot. The chain is walked strictly left to
//! right; a generative source gets exactly one attempt, a listed source
//! burns through its remaining candidates. The first delivered image wins.
//! Exhausting the whole chain is not an error, the document just ships with
//! fewer images.

use crate::providers::{
    Attempt, CandidatePool, ImageProvider, ImageRequest, ProviderKind, ResolvedImage,
};
use std::sync::Arc;

pub struct FallbackResolver {
    chain: Vec<Arc<dyn ImageProvider>>,
}

impl FallbackResolver {
    pub fn new(chain: Vec<Arc<dyn ImageProvider>>) -> Self {
        Self { chain }
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Resolve one image slot, or `None` when every source is exhausted.
    pub async fn resolve(
        &self,
        request: &ImageRequest,
        pool: &mut CandidatePool,
    ) -> Option<ResolvedImage> {
        for provider in &self.chain {
            let source = provider.id();
            match provider.kind() {
                ProviderKind::Generative => match provider.generate(request).await {
                    Attempt::Fetched(image) => {
                        tracing::info!(source = %source, ordinal = request.ordinal, "Image generated");
                        return Some(image);
                    }
                    Attempt::Skipped(reason) => {
                        tracing::debug!(source = %source, reason = %reason, "Source skipped");
                    }
                    Attempt::Failed(error) => {
                        tracing::warn!(source = %source, error = %error, "Generation failed, falling back");
                    }
                },
                ProviderKind::Listed => {
                    pool.ensure_populated(provider.as_ref(), &request.keyword).await;
                    while let Some(candidate) = pool.take_next(source) {
                        match provider.fetch(&candidate).await {
                            Ok(path) => {
                                tracing::info!(source = %source, ordinal = request.ordinal, "Image fetched");
                                return Some(ResolvedImage {
                                    path: path.to_string_lossy().into_owned(),
                                    source,
                                });
                            }
                            Err(e) => {
                                tracing::warn!(
                                    source = %source,
                                    error = %e,
                                    "Candidate download failed, trying next"
                                );
                            }
                        }
                    }
                }
            }
        }

        tracing::warn!(ordinal = request.ordinal, "All image sources exhausted for this slot");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ProviderError, SourceId};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeGenerative {
        id: SourceId,
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ImageProvider for FakeGenerative {
        fn id(&self) -> SourceId {
            self.id
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Generative
        }

        async fn generate(&self, request: &ImageRequest) -> Attempt {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Attempt::Fetched(ResolvedImage {
                    path: format!("/tmp/{}_{}.png", self.id, request.ordinal),
                    source: self.id,
                })
            } else {
                Attempt::Failed("backend unavailable".to_string())
            }
        }
    }

    struct FakeListed {
        id: SourceId,
        candidates: Vec<String>,
        broken_downloads: Vec<String>,
    }

    #[async_trait]
    impl ImageProvider for FakeListed {
        fn id(&self) -> SourceId {
            self.id
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Listed
        }

        async fn list_candidates(&self, _keyword: &str) -> Result<Vec<String>, ProviderError> {
            Ok(self.candidates.clone())
        }

        async fn fetch(&self, candidate: &str) -> Result<PathBuf, ProviderError> {
            if self.broken_downloads.iter().any(|b| b == candidate) {
                Err(ProviderError::Other("404".to_string()))
            } else {
                Ok(PathBuf::from(candidate))
            }
        }
    }

    fn request(ordinal: usize) -> ImageRequest {
        ImageRequest {
            ordinal,
            paragraph_index: Some(0),
            prompt: "a scene".to_string(),
            negative_prompt: "blurry".to_string(),
            keyword: "scene".to_string(),
        }
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let third_calls = Arc::new(AtomicUsize::new(0));
        let resolver = FallbackResolver::new(vec![
            Arc::new(FakeGenerative {
                id: SourceId::GeminiImage,
                succeed: false,
                calls: first_calls.clone(),
            }) as Arc<dyn ImageProvider>,
            Arc::new(FakeGenerative {
                id: SourceId::ComfyUi,
                succeed: true,
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Arc::new(FakeGenerative {
                id: SourceId::GeminiImage,
                succeed: true,
                calls: third_calls.clone(),
            }),
        ]);

        let mut pool = CandidatePool::new();
        let image = resolver.resolve(&request(0), &mut pool).await.unwrap();
        assert_eq!(image.source, SourceId::ComfyUi);
        // Failing source tried exactly once, sources after the winner never.
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn download_failure_advances_to_next_candidate() {
        let resolver = FallbackResolver::new(vec![Arc::new(FakeListed {
            id: SourceId::Pexels,
            candidates: vec!["bad".to_string(), "good".to_string()],
            broken_downloads: vec!["bad".to_string()],
        }) as Arc<dyn ImageProvider>]);

        // Deterministic despite shuffling: "bad" always fails, so "good"
        // is the only possible outcome.
        let mut pool = CandidatePool::new();
        let image = resolver.resolve(&request(0), &mut pool).await.unwrap();
        assert_eq!(image.path, "good");
    }

    #[tokio::test]
    async fn exhaustion_returns_none() {
        let resolver = FallbackResolver::new(vec![
            Arc::new(FakeGenerative {
                id: SourceId::GeminiImage,
                succeed: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }) as Arc<dyn ImageProvider>,
            Arc::new(FakeListed {
                id: SourceId::Pexels,
                candidates: vec!["x".to_string()],
                broken_downloads: vec!["x".to_string()],
            }),
        ]);

        let mut pool = CandidatePool::new();
        assert!(resolver.resolve(&request(0), &mut pool).await.is_none());
    }

    #[tokio::test]
    async fn repeated_slots_yield_distinct_candidates() {
        let resolver = FallbackResolver::new(vec![Arc::new(FakeListed {
            id: SourceId::Unsplash,
            candidates: vec!["a".to_string(), "b".to_string()],
            broken_downloads: Vec::new(),
        }) as Arc<dyn ImageProvider>]);

        let mut pool = CandidatePool::new();
        let one = resolver.resolve(&request(0), &mut pool).await.unwrap();
        let two = resolver.resolve(&request(1), &mut pool).await.unwrap();
        assert_ne!(one.path, two.path);
        assert!(resolver.resolve(&request(2), &mut pool).await.is_none());
    }
}
