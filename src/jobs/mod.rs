//! Ingestion job status tracking.
//!
//! Jobs move strictly forward through `queued → running → completed|failed`
//! (a queued job may also fail directly). Terminal records are immutable;
//! further updates return the stored record untouched.

mod store;
mod tracker;
mod types;

pub use store::{job_key, JobStore, MemoryJobStore, RedisJobStore, JOB_INDEX_KEY, JOB_KEY_PREFIX};
pub use tracker::JobTracker;
pub use types::{IngestionJob, JobProgress, JobStatus, JobSummary};
