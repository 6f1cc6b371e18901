//! Batch orchestration
//!
//! The coordinator owns the registry and the article worker and runs each
//! job as a background batch: a bounded window of concurrent topic attempts,
//! with failed attempts re-queued into the same window until their attempt
//! budget runs out. Worker outcomes are data; nothing a topic does can take
//! the batch down.

use crate::tasks::registry::{RetryPlan, TaskRegistry};
use crate::tasks::worker::ArticleWorker;
use crate::tasks::TopicResult;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

/// One queued try for one topic. `limit` is the attempt ceiling, seeded from
/// the topic's prior retry count so manual retries get a fresh budget.
struct Ticket {
    topic: String,
    attempt: u32,
    limit: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The original job was gone; a fresh one was started.
    NewJob(Uuid),
    /// Failed topics were re-queued into the existing job.
    Resubmitted(Uuid),
    /// Every requested topic had already succeeded.
    Skipped,
}

pub struct TaskCoordinator {
    registry: Arc<TaskRegistry>,
    worker: Arc<ArticleWorker>,
    max_workers: usize,
    max_retry_attempts: u32,
}

impl TaskCoordinator {
    pub fn new(
        registry: Arc<TaskRegistry>,
        worker: Arc<ArticleWorker>,
        max_workers: usize,
        max_retry_attempts: u32,
    ) -> Self {
        Self {
            registry,
            worker,
            max_workers: max_workers.max(1),
            max_retry_attempts: max_retry_attempts.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Create a job and run its batch in the background.
    pub fn submit_batch(
        self: &Arc<Self>,
        topics: Vec<String>,
        topic_images: HashMap<String, Vec<String>>,
    ) -> Uuid {
        let job_id = self.registry.create_job(&topics, topic_images);
        self.spawn_batch(job_id, topics);
        job_id
    }

    fn spawn_batch(self: &Arc<Self>, job_id: Uuid, topics: Vec<String>) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.run_batch(job_id, topics).await;
        });
    }

    /// Run one batch to completion. In-flight attempts are capped by the
    /// worker limit; a failed attempt re-enters the queue until its budget
    /// is spent, then becomes a terminal error record.
    pub async fn run_batch(&self, job_id: Uuid, topics: Vec<String>) {
        tracing::info!(task_id = %job_id, topics = topics.len(), "Batch started");

        let mut queue: VecDeque<Ticket> = topics
            .iter()
            .map(|topic| {
                let base = self.registry.retry_count(job_id, topic);
                Ticket {
                    topic: topic.clone(),
                    attempt: base + 1,
                    limit: base + self.max_retry_attempts,
                }
            })
            .collect();

        let mut window = FuturesUnordered::new();
        loop {
            while window.len() < self.max_workers {
                match queue.pop_front() {
                    Some(ticket) => window.push(self.run_attempt(job_id, ticket)),
                    None => break,
                }
            }
            let Some((ticket, outcome)) = window.next().await else {
                break;
            };

            match outcome {
                Ok(result) => self.registry.record_success(job_id, result),
                Err(e) if ticket.attempt < ticket.limit => {
                    tracing::warn!(
                        task_id = %job_id,
                        topic = %ticket.topic,
                        attempt = ticket.attempt,
                        error = %e,
                        "Attempt failed, re-queuing"
                    );
                    queue.push_back(Ticket {
                        topic: ticket.topic,
                        attempt: ticket.attempt + 1,
                        limit: ticket.limit,
                    });
                }
                Err(e) => {
                    self.registry
                        .record_failure(job_id, &ticket.topic, e, ticket.attempt);
                }
            }
        }

        // Completion is only decided once ghosts are accounted for.
        self.registry.reconcile(job_id, &topics);
        self.registry.finalize(job_id);
    }

    /// One attempt, isolated in its own task so a panic inside the worker
    /// surfaces as a `JoinError` instead of unwinding the batch. Without the
    /// isolation a crashed attempt would skip reconcile/finalize and leave
    /// the job stuck in `Running`.
    async fn run_attempt(
        &self,
        job_id: Uuid,
        ticket: Ticket,
    ) -> (Ticket, Result<TopicResult, String>) {
        let presets = self.registry.topic_images(job_id, &ticket.topic);
        tracing::debug!(
            task_id = %job_id,
            topic = %ticket.topic,
            attempt = ticket.attempt,
            limit = ticket.limit,
            "Attempt started"
        );
        let worker = Arc::clone(&self.worker);
        let topic = ticket.topic.clone();
        let handle = tokio::spawn(async move { worker.generate(&topic, &presets).await });
        let outcome = match handle.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => {
                tracing::error!(
                    task_id = %job_id,
                    topic = %ticket.topic,
                    error = %e,
                    "Attempt task crashed"
                );
                Err(format!("article task crashed: {e}"))
            }
        };
        (ticket, outcome)
    }

    /// Re-run failed topics. Unknown job ids get a fresh job whose retry
    /// counts start at one, mirroring what a first retry would have been.
    pub fn retry(self: &Arc<Self>, job_id: Uuid, topics: Vec<String>) -> RetryOutcome {
        match self.registry.prepare_retry(job_id, &topics) {
            RetryPlan::MissingJob => {
                tracing::warn!(task_id = %job_id, "Retry for unknown job, starting fresh");
                let retry_counts = topics.iter().map(|t| (t.clone(), 1)).collect();
                let new_id =
                    self.registry
                        .create_job_with_retries(&topics, HashMap::new(), retry_counts);
                self.spawn_batch(new_id, topics);
                RetryOutcome::NewJob(new_id)
            }
            RetryPlan::Skipped => RetryOutcome::Skipped,
            RetryPlan::Resubmit(eligible) => {
                self.spawn_batch(job_id, eligible);
                RetryOutcome::Resubmitted(job_id)
            }
        }
    }
}
