//! # Ticket Sentiment
//!
//! Ingests semi-structured support ticket exports, classifies sentiment per
//! fragment (summary, description, each embedded comment) and derives one
//! sentiment trajectory per ticket, plus population-level links between
//! issue categories and sentiment outcomes.
//!
//! ## Architecture
//!
//! ```text
//! CSV / JSON batch → JobQueue → IngestWorker → IngestionOrchestrator
//!                                                 │
//!       ColumnMapper → CommentParser → SentimentClassifier (HTTP)
//!                                                 │
//!                 SentimentAggregator → SQLite (tickets, fragments, entities)
//!
//! SQLite → InsightsService → TrajectoryAnalyzer → causal factors → report
//! ```
//!
//! Job status lives in Redis when `REDIS_URL` is set and reachable, otherwise
//! in process memory.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ticket_sentiment::{
//!     classifier::MlServiceClient, config::Config, ingest::{IngestionOrchestrator, IngestPayload},
//!     jobs::JobTracker, mapping::ColumnMapper, storage::SqliteStorage,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = Arc::new(SqliteStorage::new(&config.database).await?);
//!     let classifier = Arc::new(MlServiceClient::new(&config.classifier, config.request.clone())?);
//!     let tracker = JobTracker::connect(&config.job_store).await;
//!     let orchestrator = IngestionOrchestrator::new(
//!         storage, classifier, tracker, Arc::new(ColumnMapper::new()), config.ingest.clone(),
//!     );
//!     let payload = IngestPayload::CsvFile { path: "tickets.csv".into() };
//!     let job = orchestrator.run_job("job-1", payload).await?;
//!     println!("{} rows", job.records_processed);
//!     Ok(())
//! }
//! ```

/// Pure analyzers: aggregation, trajectories, causal factors, reports.
pub mod analysis;
/// Sentiment classification boundary and HTTP client.
pub mod classifier;
/// Configuration loaded from the environment.
pub mod config;
/// Error types and result aliases.
pub mod error;
/// Chunked batch ingestion: payloads, orchestrator, queue and worker.
pub mod ingest;
/// Population insights over stored tickets.
pub mod insights;
/// Ingestion job status tracking.
pub mod jobs;
/// Column detection for tabular exports.
pub mod mapping;
/// Parsers for semi-structured ticket text.
pub mod parsing;
/// SQLite storage layer for persistence.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
