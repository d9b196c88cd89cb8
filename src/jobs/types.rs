use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle state of an ingestion job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Forward-only transition table
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Outcome summary attached to a finished job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub duration_secs: f64,
    /// First errors encountered, bounded by configuration.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Total number of errors, including those not listed.
    #[serde(default)]
    pub error_count: usize,
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl JobSummary {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            ..Default::default()
        }
    }

    /// Record an error, keeping at most `max_listed` messages
    pub fn push_error(&mut self, message: impl Into<String>, max_listed: usize) {
        self.error_count += 1;
        if self.errors.len() < max_listed {
            self.errors.push(message.into());
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }
}

/// Counter deltas for [`super::JobTracker::increment_job_progress`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobProgress {
    pub processed: u64,
    pub sentiment_records: u64,
    pub entity_records: u64,
}

/// Job status record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub job_id: String,
    pub source: String,
    pub file_name: Option<String>,
    pub status: JobStatus,
    pub records_processed: u64,
    pub sentiment_records: u64,
    pub entity_records: u64,
    pub total_rows: Option<u64>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
    pub summary: Option<JobSummary>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl IngestionJob {
    /// Create a freshly queued job
    pub fn new(
        job_id: impl Into<String>,
        source: impl Into<String>,
        file_name: Option<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            source: source.into(),
            file_name,
            status: JobStatus::Queued,
            records_processed: 0,
            sentiment_records: 0,
            entity_records: 0,
            total_rows: None,
            submitted_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
            error: None,
            summary: None,
            metadata,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use JobStatus::*;
        assert!(Queued.can_transition_to(Running));
        assert!(Queued.can_transition_to(Failed));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));

        assert!(!Queued.can_transition_to(Completed));
        assert!(!Running.can_transition_to(Queued));
        for terminal in [Completed, Failed] {
            assert!(terminal.is_terminal());
            for next in [Queued, Running, Completed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("RUNNING".parse::<JobStatus>(), Ok(JobStatus::Running));
        assert!("paused".parse::<JobStatus>().is_err());
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_summary_bounds_listed_errors() {
        let mut summary = JobSummary::new(1.5);
        for i in 0..5 {
            summary.push_error(format!("row {i} failed"), 3);
        }
        assert_eq!(summary.errors.len(), 3);
        assert_eq!(summary.error_count, 5);
        assert!(summary.has_errors());
    }

    #[test]
    fn test_job_serialization_shape() {
        let job = IngestionJob::new("job-1", "csv_upload", Some("tickets.csv".into()), Map::new());
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "queued");
        assert_eq!(value["records_processed"], 0);
        assert!(value["started_at"].is_null());

        let back: IngestionJob = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }
}
