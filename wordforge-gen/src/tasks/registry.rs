//! In-memory job registry
//!
//! All mutation funnels through one mutex held only for short synchronous
//! sections, never across an await point. Workers report outcomes here in
//! completion order; reconciliation and finalization make the final state
//! consistent even when workers vanish mid-batch.

use crate::tasks::{Job, JobSnapshot, JobStatus, TopicError, TopicResult, GHOST_TASK_ERROR};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct TaskRegistry {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

/// What a retry request resolved to.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryPlan {
    /// The job id is unknown; caller should start a fresh job.
    MissingJob,
    /// Every requested topic already succeeded; nothing to do.
    Skipped,
    /// These topics were re-armed and should be submitted again.
    Resubmit(Vec<String>),
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_job(
        &self,
        topics: &[String],
        topic_images: HashMap<String, Vec<String>>,
    ) -> Uuid {
        self.create_job_with_retries(topics, topic_images, HashMap::new())
    }

    /// Create a job with pre-seeded retry counts (used when a retry request
    /// names a job that no longer exists).
    pub fn create_job_with_retries(
        &self,
        topics: &[String],
        topic_images: HashMap<String, Vec<String>>,
        retry_counts: HashMap<String, u32>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let job = Job {
            id,
            status: JobStatus::Running,
            total: topics.len(),
            results: Vec::new(),
            errors: Vec::new(),
            retry_counts,
            progress: 0.0,
            topic_images,
            created_at: Utc::now(),
        };
        self.jobs.lock().expect("registry lock poisoned").insert(id, job);
        tracing::info!(task_id = %id, topics = topics.len(), "Job created");
        id
    }

    pub fn topic_images(&self, job_id: Uuid, topic: &str) -> Vec<String> {
        let jobs = self.jobs.lock().expect("registry lock poisoned");
        jobs.get(&job_id)
            .and_then(|job| job.topic_images.get(topic))
            .cloned()
            .unwrap_or_default()
    }

    /// Record a success. Duplicate topics are dropped so a racing retry can
    /// never double-count a document.
    pub fn record_success(&self, job_id: Uuid, result: TopicResult) {
        let mut jobs = self.jobs.lock().expect("registry lock poisoned");
        let Some(job) = jobs.get_mut(&job_id) else {
            return;
        };
        if job.results.iter().any(|r| r.topic == result.topic) {
            tracing::warn!(task_id = %job_id, topic = %result.topic, "Duplicate success ignored");
            return;
        }
        tracing::info!(task_id = %job_id, topic = %result.topic, "Topic succeeded");
        job.results.push(result);
        job.recompute_progress();
    }

    /// Record a terminal failure. The latest error wins for a topic, and the
    /// retry count only ever moves up.
    pub fn record_failure(&self, job_id: Uuid, topic: &str, error: String, retry_count: u32) {
        let mut jobs = self.jobs.lock().expect("registry lock poisoned");
        let Some(job) = jobs.get_mut(&job_id) else {
            return;
        };
        let counted = job
            .retry_counts
            .get(topic)
            .copied()
            .unwrap_or(0)
            .max(retry_count);
        job.retry_counts.insert(topic.to_string(), counted);

        tracing::warn!(task_id = %job_id, topic = %topic, error = %error, "Topic failed");
        if let Some(existing) = job.errors.iter_mut().find(|e| e.topic == topic) {
            existing.error = error;
            existing.retry_count = counted;
        } else {
            job.errors.push(TopicError {
                topic: topic.to_string(),
                error,
                retry_count: counted,
            });
        }
        job.recompute_progress();
    }

    /// Synthesize failure records for topics that were submitted but produced
    /// neither a result nor an error.
    pub fn reconcile(&self, job_id: Uuid, submitted: &[String]) {
        let mut jobs = self.jobs.lock().expect("registry lock poisoned");
        let Some(job) = jobs.get_mut(&job_id) else {
            return;
        };
        let processed: HashSet<&str> = job
            .results
            .iter()
            .map(|r| r.topic.as_str())
            .chain(job.errors.iter().map(|e| e.topic.as_str()))
            .collect();
        let ghosts: Vec<String> = submitted
            .iter()
            .filter(|t| !processed.contains(t.as_str()))
            .cloned()
            .collect();
        if ghosts.is_empty() {
            return;
        }

        tracing::warn!(task_id = %job_id, count = ghosts.len(), "Ghost tasks detected");
        for topic in ghosts {
            let retry_count = job.retry_counts.get(&topic).copied().unwrap_or(0);
            job.errors.push(TopicError {
                topic,
                error: GHOST_TASK_ERROR.to_string(),
                retry_count,
            });
        }
        job.recompute_progress();
    }

    /// De-duplicate results, recompute progress, and flip to `Completed` when
    /// every topic is accounted for. Always run after [`reconcile`].
    ///
    /// [`reconcile`]: TaskRegistry::reconcile
    pub fn finalize(&self, job_id: Uuid) {
        let mut jobs = self.jobs.lock().expect("registry lock poisoned");
        let Some(job) = jobs.get_mut(&job_id) else {
            return;
        };

        let mut seen = HashSet::new();
        let before = job.results.len();
        job.results.retain(|r| seen.insert(r.topic.clone()));
        if job.results.len() != before {
            tracing::warn!(
                task_id = %job_id,
                removed = before - job.results.len(),
                "Duplicate results removed during finalization"
            );
        }

        job.recompute_progress();
        if job.results.len() + job.errors.len() >= job.total {
            job.status = JobStatus::Completed;
            tracing::info!(
                task_id = %job_id,
                succeeded = job.results.len(),
                failed = job.errors.len(),
                "Job completed"
            );
        }
    }

    /// Re-arm failed topics for another run.
    pub fn prepare_retry(&self, job_id: Uuid, topics: &[String]) -> RetryPlan {
        let mut jobs = self.jobs.lock().expect("registry lock poisoned");
        let Some(job) = jobs.get_mut(&job_id) else {
            return RetryPlan::MissingJob;
        };

        let succeeded: HashSet<&str> = job.results.iter().map(|r| r.topic.as_str()).collect();
        let eligible: Vec<String> = topics
            .iter()
            .filter(|t| !succeeded.contains(t.as_str()))
            .cloned()
            .collect();
        if eligible.is_empty() {
            tracing::info!(task_id = %job_id, "All retry topics already succeeded");
            return RetryPlan::Skipped;
        }

        job.errors.retain(|e| !eligible.contains(&e.topic));
        for topic in &eligible {
            *job.retry_counts.entry(topic.clone()).or_insert(0) += 1;
        }
        job.status = JobStatus::Running;
        job.recompute_progress();
        tracing::info!(task_id = %job_id, topics = eligible.len(), "Retry prepared");
        RetryPlan::Resubmit(eligible)
    }

    pub fn retry_count(&self, job_id: Uuid, topic: &str) -> u32 {
        let jobs = self.jobs.lock().expect("registry lock poisoned");
        jobs.get(&job_id)
            .and_then(|job| job.retry_counts.get(topic))
            .copied()
            .unwrap_or(0)
    }

    pub fn snapshot(&self, job_id: Uuid) -> Option<JobSnapshot> {
        let jobs = self.jobs.lock().expect("registry lock poisoned");
        jobs.get(&job_id).map(|job| JobSnapshot {
            task_id: job.id,
            status: job.status,
            total: job.total,
            progress: job.progress,
            results: job.results.clone(),
            errors: job.errors.clone(),
            created_at: job.created_at,
        })
    }
}
