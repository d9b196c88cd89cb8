use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Job store error: {0}")]
    JobStore(#[from] JobStoreError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Ticket not found: {ticket_id}")]
    TicketNotFound { ticket_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Classification service errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Job status store errors
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Job not found: {job_id}")]
    NotFound { job_id: String },

    #[error("Job store backend error: {message}")]
    Backend { message: String },

    #[error("Invalid job transition for {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: String,
        to: String,
    },

    #[error("Job record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for JobStoreError {
    fn from(err: redis::RedisError) -> Self {
        JobStoreError::Backend {
            message: err.to_string(),
        }
    }
}

/// Ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("Malformed row {row}: {message}")]
    MalformedRow { row: usize, message: String },

    #[error("Job {job_id} cancelled at chunk {chunk}")]
    Cancelled { job_id: String, chunk: usize },

    #[error("Ingest queue closed; job {job_id} not delivered")]
    QueueClosed { job_id: String },
}

/// Errors raised by the pure analyzers.
///
/// These signal integration bugs (the caller handed over inconsistent
/// inputs) and are never swallowed.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for classifier operations
pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// Result type alias for job store operations
pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Result type alias for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Result type alias for analyzer operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;
