//! Background job queue
//!
//! Typed job descriptors on an mpsc channel, consumed by a fixed pool of
//! workers. Enqueue is fire-and-forget: the triggering request returns
//! before the job runs. Every job runs against the worker's own cloned
//! handles, never the request's; a failing job is logged and recorded on
//! the entity it was working on, and never takes a worker down.

use rawi_common::config::RawiConfig;
use rawi_common::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::services::remote::{Catalog, Notifier, RemoteStore};
use crate::services::{PlacementEngine, Publisher};

/// One unit of background work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Pair and place the files of a finalized upload session
    ProcessUploadSession { session_id: Uuid },
    /// Run one publish attempt for a recitation
    PublishRecitation { recitation_id: i64, replace: bool },
    /// Rescan approved-but-stale recitations and resubmit them
    RetryPublish,
}

/// Shared handles the worker pool runs jobs against
#[derive(Clone)]
pub struct JobContext {
    pub db: SqlitePool,
    pub config: Arc<RawiConfig>,
    pub remote: Arc<dyn RemoteStore>,
    pub primary_catalog: Arc<dyn Catalog>,
    pub secondary_catalog: Arc<dyn Catalog>,
    pub notifier: Arc<dyn Notifier>,
}

impl JobContext {
    fn publisher(&self) -> Publisher {
        Publisher::new(
            self.db.clone(),
            self.remote.clone(),
            self.primary_catalog.clone(),
            self.secondary_catalog.clone(),
            self.notifier.clone(),
            self.config.remote.root_path.clone(),
            self.config.catalog.audio_base_url.clone(),
        )
    }
}

/// Handle for scheduling background jobs
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    /// Start `workers` consumers over a fresh queue
    pub fn start(workers: usize, ctx: JobContext) -> Self {
        let (queue, rx) = Self::channel();
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..workers.max(1) {
            let rx = rx.clone();
            let ctx = ctx.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                loop {
                    // Hold the lock only while waiting for the next job
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else { break };

                    tracing::debug!(worker_id, ?job, "Job started");
                    if let Err(e) = run_job(&ctx, &queue, &job).await {
                        tracing::error!(worker_id, ?job, error = %e, "Job failed");
                    }
                }
            });
        }

        queue
    }

    /// Queue without workers; the caller consumes jobs from the
    /// returned receiver. Used by tests asserting what gets scheduled.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Schedule a job; returns immediately
    pub fn enqueue(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::error!("Job queue is closed, dropping job");
        }
    }
}

async fn run_job(ctx: &JobContext, queue: &JobQueue, job: &Job) -> Result<()> {
    match job {
        Job::ProcessUploadSession { session_id } => {
            let engine = PlacementEngine::new(
                ctx.db.clone(),
                ctx.config.clone(),
                queue.clone(),
                ctx.notifier.clone(),
            );
            engine.process_session(*session_id).await
        }
        Job::PublishRecitation {
            recitation_id,
            replace,
        } => ctx.publisher().publish(*recitation_id, *replace).await,
        Job::RetryPublish => {
            let resubmitted = ctx.publisher().retry_pending().await?;
            tracing::info!(resubmitted, "Retry scan completed");
            Ok(())
        }
    }
}
