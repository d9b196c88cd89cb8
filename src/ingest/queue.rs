//! In-process job queue feeding a single ingestion worker.

use std::sync::Arc;

use serde_json::Map;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::orchestrator::IngestionOrchestrator;
use super::source::IngestPayload;
use crate::error::{AppResult, IngestError};
use crate::jobs::{IngestionJob, JobTracker};

/// Default number of undelivered jobs the queue holds.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// A job waiting for the worker
#[derive(Debug, Clone)]
pub struct IngestTask {
    pub job_id: String,
    pub payload: IngestPayload,
}

/// Producer side: records the job as queued, then hands it to the worker
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<IngestTask>,
    tracker: JobTracker,
}

impl JobQueue {
    /// Create a queue and the worker that drains it
    pub fn channel(
        orchestrator: Arc<IngestionOrchestrator>,
        capacity: usize,
    ) -> (Self, IngestWorker) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            sender,
            tracker: orchestrator.tracker().clone(),
        };
        let worker = IngestWorker {
            orchestrator,
            receiver,
        };
        (queue, worker)
    }

    pub fn new_job_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Queue a job. The record exists (status `queued`) before this returns.
    pub async fn submit(&self, job_id: &str, payload: IngestPayload) -> AppResult<IngestionJob> {
        let job = self
            .tracker
            .init_job(job_id, payload.source_label(), payload.file_name(), Map::new())
            .await?;

        let task = IngestTask {
            job_id: job_id.to_string(),
            payload,
        };
        if self.sender.send(task).await.is_err() {
            warn!(job_id = %job_id, "Ingest worker gone; failing job");
            let err = IngestError::QueueClosed {
                job_id: job_id.to_string(),
            };
            self.tracker
                .mark_job_failed(job_id, &err.to_string(), None)
                .await?;
            return Err(err.into());
        }

        info!(job_id = %job_id, source = %job.source, "Job submitted");
        Ok(job)
    }
}

/// Consumer side: processes one job at a time, in submission order
pub struct IngestWorker {
    orchestrator: Arc<IngestionOrchestrator>,
    receiver: mpsc::Receiver<IngestTask>,
}

impl IngestWorker {
    /// Run until every [`JobQueue`] handle is dropped and the queue drains
    pub async fn run(mut self) {
        info!("Ingest worker started");
        while let Some(task) = self.receiver.recv().await {
            match self.orchestrator.run_job(&task.job_id, task.payload).await {
                Ok(job) => info!(job_id = %job.job_id, status = %job.status, "Job finished"),
                Err(e) => error!(job_id = %task.job_id, error = %e, "Job could not be tracked"),
            }
        }
        info!("Ingest worker stopped");
    }
}
