use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::store::{JobStore, MemoryJobStore, RedisJobStore};
use super::types::{IngestionJob, JobProgress, JobStatus, JobSummary};
use crate::config::JobStoreConfig;
use crate::error::{JobStoreError, JobStoreResult};

/// Job status surface shared by the queue, the worker and the CLI.
///
/// Every mutation is a read-modify-write performed under one lock, so
/// concurrent progress updates within a process never lose increments.
#[derive(Clone)]
pub struct JobTracker {
    store: Arc<dyn JobStore>,
    write_lock: Arc<Mutex<()>>,
}

impl JobTracker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryJobStore::default()))
    }

    /// Use Redis when configured and reachable, else fall back to memory
    pub async fn connect(config: &JobStoreConfig) -> Self {
        let Some(url) = config.redis_url.as_deref() else {
            info!("REDIS_URL not set; job status kept in memory");
            return Self::new(Arc::new(MemoryJobStore::new(config.index_cap)));
        };

        match RedisJobStore::connect(url, config.ttl_secs, config.index_cap).await {
            Ok(store) => Self::new(Arc::new(store)),
            Err(e) => {
                warn!(error = %e, "Redis unavailable; job status kept in memory");
                Self::new(Arc::new(MemoryJobStore::new(config.index_cap)))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Create a queued job. An existing record is returned unchanged.
    pub async fn init_job(
        &self,
        job_id: &str,
        source: &str,
        file_name: Option<String>,
        metadata: Map<String, Value>,
    ) -> JobStoreResult<IngestionJob> {
        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.store.load(job_id).await? {
            debug!(job_id = %job_id, status = %existing.status, "Job already initialised");
            return Ok(existing);
        }

        let job = IngestionJob::new(job_id, source, file_name, metadata);
        self.store.save(&job).await?;
        info!(job_id = %job_id, source = %source, "Job queued");
        Ok(job)
    }

    /// Move to running; `started_at` is stamped only the first time
    pub async fn mark_job_running(&self, job_id: &str) -> JobStoreResult<IngestionJob> {
        self.transition(job_id, JobStatus::Running, |job| {
            if job.started_at.is_none() {
                job.started_at = Some(Utc::now());
            }
        })
        .await
    }

    pub async fn increment_job_progress(
        &self,
        job_id: &str,
        progress: JobProgress,
    ) -> JobStoreResult<IngestionJob> {
        self.update(job_id, |job| {
            job.records_processed += progress.processed;
            job.sentiment_records += progress.sentiment_records;
            job.entity_records += progress.entity_records;
        })
        .await
    }

    /// Merge keys into the job's free-form metadata
    pub async fn update_job_metadata(
        &self,
        job_id: &str,
        metadata: Map<String, Value>,
    ) -> JobStoreResult<IngestionJob> {
        self.update(job_id, |job| job.metadata.extend(metadata)).await
    }

    pub async fn set_total_rows(&self, job_id: &str, total_rows: u64) -> JobStoreResult<IngestionJob> {
        self.update(job_id, |job| job.total_rows = Some(total_rows))
            .await
    }

    pub async fn mark_job_completed(
        &self,
        job_id: &str,
        summary: JobSummary,
    ) -> JobStoreResult<IngestionJob> {
        self.transition(job_id, JobStatus::Completed, |job| {
            job.completed_at = Some(Utc::now());
            job.summary = Some(summary);
        })
        .await
    }

    pub async fn mark_job_failed(
        &self,
        job_id: &str,
        error: &str,
        summary: Option<JobSummary>,
    ) -> JobStoreResult<IngestionJob> {
        self.transition(job_id, JobStatus::Failed, |job| {
            job.completed_at = Some(Utc::now());
            job.error = Some(error.to_string());
            if summary.is_some() {
                job.summary = summary;
            }
        })
        .await
    }

    pub async fn get_job(&self, job_id: &str) -> JobStoreResult<Option<IngestionJob>> {
        self.store.load(job_id).await
    }

    /// Most recently updated jobs, optionally filtered by status
    pub async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> JobStoreResult<Vec<IngestionJob>> {
        // with a filter, scan past non-matching ids
        let scan = if status.is_some() {
            usize::MAX
        } else {
            limit
        };

        let mut jobs = Vec::new();
        for job_id in self.store.recent_ids(scan).await? {
            if jobs.len() >= limit {
                break;
            }
            let job = match self.store.load(&job_id).await {
                Ok(Some(job)) => job,
                // expired record still in the index
                Ok(None) => continue,
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Skipping unreadable job record");
                    continue;
                }
            };
            if status.map_or(true, |s| job.status == s) {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    async fn load_existing(&self, job_id: &str) -> JobStoreResult<IngestionJob> {
        self.store
            .load(job_id)
            .await?
            .ok_or_else(|| JobStoreError::NotFound {
                job_id: job_id.to_string(),
            })
    }

    /// Field update that leaves the status alone; no-op on terminal jobs
    async fn update<F>(&self, job_id: &str, apply: F) -> JobStoreResult<IngestionJob>
    where
        F: FnOnce(&mut IngestionJob) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut job = self.load_existing(job_id).await?;
        if job.is_terminal() {
            debug!(job_id = %job_id, status = %job.status, "Ignoring update to terminal job");
            return Ok(job);
        }

        apply(&mut job);
        job.touch();
        self.store.save(&job).await?;
        Ok(job)
    }

    async fn transition<F>(
        &self,
        job_id: &str,
        next: JobStatus,
        apply: F,
    ) -> JobStoreResult<IngestionJob>
    where
        F: FnOnce(&mut IngestionJob) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut job = self.load_existing(job_id).await?;

        if job.is_terminal() {
            debug!(
                job_id = %job_id,
                status = %job.status,
                requested = %next,
                "Ignoring transition of terminal job"
            );
            return Ok(job);
        }
        // re-delivery of a running job
        if job.status == next {
            return Ok(job);
        }
        if !job.status.can_transition_to(next) {
            return Err(JobStoreError::InvalidTransition {
                job_id: job_id.to_string(),
                from: job.status.to_string(),
                to: next.to_string(),
            });
        }

        let from = job.status;
        job.status = next;
        apply(&mut job);
        job.touch();
        self.store.save(&job).await?;

        info!(job_id = %job_id, from = %from, to = %next, "Job status changed");
        Ok(job)
    }
}
