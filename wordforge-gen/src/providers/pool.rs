//! Per-document candidate pool
//!
//! Listed sources are searched at most once per document. Results are
//! shuffled and cached here, and a single consumed set spans all sources so
//! the same URL or file never appears twice in one document even when two
//! sources return it.

use crate::providers::{ImageProvider, SourceId};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Default)]
pub struct CandidatePool {
    lists: HashMap<SourceId, VecDeque<String>>,
    consumed: HashSet<String>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the cache for one source on first use.
    ///
    /// A failed search caches an empty list, which exhausts the source for
    /// the rest of this document rather than retrying it per slot.
    pub async fn ensure_populated(&mut self, provider: &dyn ImageProvider, keyword: &str) {
        if self.lists.contains_key(&provider.id()) {
            return;
        }
        let candidates = match provider.list_candidates(keyword).await {
            Ok(mut candidates) => {
                candidates.shuffle(&mut rand::thread_rng());
                tracing::debug!(
                    source = %provider.id(),
                    keyword = %keyword,
                    count = candidates.len(),
                    "Candidate list populated"
                );
                candidates
            }
            Err(e) => {
                tracing::warn!(source = %provider.id(), error = %e, "Candidate search failed");
                Vec::new()
            }
        };
        self.lists.insert(provider.id(), candidates.into());
    }

    /// Pop the next unconsumed candidate for a source, marking it consumed.
    pub fn take_next(&mut self, source: SourceId) -> Option<String> {
        let list = self.lists.get_mut(&source)?;
        while let Some(candidate) = list.pop_front() {
            if self.consumed.insert(candidate.clone()) {
                return Some(candidate);
            }
        }
        None
    }

    /// Record a candidate obtained outside the pool (preset images) so the
    /// chain never duplicates it.
    pub fn mark_consumed(&mut self, candidate: &str) {
        self.consumed.insert(candidate.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Attempt, ImageRequest, ProviderError, ProviderKind};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeListed {
        id: SourceId,
        candidates: Vec<String>,
        fail: bool,
        queries: AtomicUsize,
    }

    #[async_trait]
    impl ImageProvider for FakeListed {
        fn id(&self) -> SourceId {
            self.id
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::Listed
        }

        async fn generate(&self, _request: &ImageRequest) -> Attempt {
            Attempt::Skipped("listed".to_string())
        }

        async fn list_candidates(&self, _keyword: &str) -> Result<Vec<String>, ProviderError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProviderError::Other("search down".to_string()))
            } else {
                Ok(self.candidates.clone())
            }
        }

        async fn fetch(&self, candidate: &str) -> Result<PathBuf, ProviderError> {
            Ok(PathBuf::from(candidate))
        }
    }

    fn provider(id: SourceId, candidates: &[&str]) -> FakeListed {
        FakeListed {
            id,
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
            fail: false,
            queries: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn search_runs_once_per_source() {
        let p = provider(SourceId::Unsplash, &["a", "b"]);
        let mut pool = CandidatePool::new();
        pool.ensure_populated(&p, "cats").await;
        pool.ensure_populated(&p, "cats").await;
        assert_eq!(p.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn take_next_never_repeats_within_a_document() {
        let p = provider(SourceId::Unsplash, &["a", "b", "c"]);
        let mut pool = CandidatePool::new();
        pool.ensure_populated(&p, "k").await;

        let mut seen = std::collections::HashSet::new();
        while let Some(c) = pool.take_next(SourceId::Unsplash) {
            assert!(seen.insert(c));
        }
        assert_eq!(seen.len(), 3);
        assert!(pool.take_next(SourceId::Unsplash).is_none());
    }

    #[tokio::test]
    async fn consumed_set_spans_sources() {
        let a = provider(SourceId::Unsplash, &["shared"]);
        let b = provider(SourceId::Pexels, &["shared"]);
        let mut pool = CandidatePool::new();
        pool.ensure_populated(&a, "k").await;
        pool.ensure_populated(&b, "k").await;

        assert_eq!(pool.take_next(SourceId::Unsplash).as_deref(), Some("shared"));
        assert_eq!(pool.take_next(SourceId::Pexels), None);
    }

    #[tokio::test]
    async fn failed_search_caches_empty_list() {
        let p = FakeListed {
            id: SourceId::Pixabay,
            candidates: vec!["x".to_string()],
            fail: true,
            queries: AtomicUsize::new(0),
        };
        let mut pool = CandidatePool::new();
        pool.ensure_populated(&p, "k").await;
        pool.ensure_populated(&p, "k").await;
        assert_eq!(p.queries.load(Ordering::SeqCst), 1);
        assert!(pool.take_next(SourceId::Pixabay).is_none());
    }

    #[tokio::test]
    async fn preset_marks_block_pool_candidates() {
        let p = provider(SourceId::Local, &["pic/a.jpg"]);
        let mut pool = CandidatePool::new();
        pool.mark_consumed("pic/a.jpg");
        pool.ensure_populated(&p, "k").await;
        assert!(pool.take_next(SourceId::Local).is_none());
    }
}
