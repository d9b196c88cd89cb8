use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Map;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::source::{IngestPayload, SourceChunk};
use crate::analysis::SentimentAggregator;
use crate::classifier::{Entity, SentimentClassifier, SentimentResult};
use crate::config::{ClassifierConfig, IngestConfig};
use crate::error::{AppResult, IngestError};
use crate::jobs::{IngestionJob, JobProgress, JobSummary, JobTracker};
use crate::mapping::{ColumnMapper, ColumnMapping, TableRow};
use crate::parsing::CommentParser;
use crate::storage::{
    SentimentFragment, Storage, TicketAggregate, TicketBatchEntry, TicketRecord,
};

/// Entity extraction input is cut to this many characters.
pub const ENTITY_INPUT_MAX_CHARS: usize = 5000;
/// Extracted entities with longer text are dropped.
pub const ENTITY_TEXT_MAX_CHARS: usize = 500;

const PARENT_COLUMN: &str = "Parent";
const ISSUE_TYPE_COLUMNS: &[&str] = &["Issue Type", "Issue type"];

/// Drives one job's rows through mapping, parsing, classification,
/// aggregation and persistence.
///
/// Chunks are processed in order. Row-level and chunk-level failures are
/// recorded in the job summary and processing continues; only failures that
/// make the whole source unusable (or lose the job store) fail the job.
pub struct IngestionOrchestrator {
    storage: Arc<dyn Storage>,
    classifier: Arc<dyn SentimentClassifier>,
    tracker: JobTracker,
    mapper: Arc<ColumnMapper>,
    config: IngestConfig,
    classifier_timeout: Duration,
    cancel_requested: Arc<AtomicBool>,
}

/// Running totals for one job
#[derive(Debug, Default)]
struct RunState {
    summary: JobSummary,
    progress: JobProgress,
}

impl IngestionOrchestrator {
    pub fn new(
        storage: Arc<dyn Storage>,
        classifier: Arc<dyn SentimentClassifier>,
        tracker: JobTracker,
        mapper: Arc<ColumnMapper>,
        config: IngestConfig,
    ) -> Self {
        Self {
            storage,
            classifier,
            tracker,
            mapper,
            config,
            classifier_timeout: Duration::from_millis(ClassifierConfig::default().timeout_ms),
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bound each classification call
    pub fn with_classifier_timeout(mut self, timeout: Duration) -> Self {
        self.classifier_timeout = timeout;
        self
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Handle that stops the running job at its next chunk boundary.
    ///
    /// A request is consumed by the job that observes it. Requests made while
    /// no job is running are discarded when the next job starts.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_requested)
    }

    /// Run one job to a terminal state.
    ///
    /// Returns the final job record. Re-delivering a job that is already
    /// terminal returns the stored record without doing any work. An `Err` is
    /// returned only when the job store itself cannot be updated.
    pub async fn run_job(&self, job_id: &str, payload: IngestPayload) -> AppResult<IngestionJob> {
        let job = self
            .tracker
            .init_job(job_id, payload.source_label(), payload.file_name(), Map::new())
            .await?;
        if job.is_terminal() {
            info!(job_id = %job_id, status = %job.status, "Skipping re-delivered job");
            return Ok(job);
        }

        if self.cancel_requested.swap(false, Ordering::SeqCst) {
            debug!(job_id = %job_id, "Discarding cancel request made between jobs");
        }

        let started = Instant::now();
        self.tracker.mark_job_running(job_id).await?;
        info!(job_id = %job_id, source = %payload.source_label(), "Ingestion started");

        let mapping_name = format!("upload_{}", job_id);
        let mut state = RunState::default();
        let outcome = self.process(job_id, &mapping_name, payload, &mut state).await;
        self.mapper.evict(&mapping_name);

        state.summary.duration_secs = started.elapsed().as_secs_f64();
        match outcome {
            Ok(()) => {
                info!(
                    job_id = %job_id,
                    records = state.progress.processed,
                    sentiment_records = state.progress.sentiment_records,
                    entity_records = state.progress.entity_records,
                    errors = state.summary.error_count,
                    duration_secs = state.summary.duration_secs,
                    "Ingestion completed"
                );
                Ok(self
                    .tracker
                    .mark_job_completed(job_id, state.summary)
                    .await?)
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Ingestion failed");
                state
                    .summary
                    .push_error(e.to_string(), self.config.max_reported_errors);
                match self
                    .tracker
                    .mark_job_failed(job_id, &e.to_string(), Some(state.summary))
                    .await
                {
                    Ok(job) => Ok(job),
                    Err(store_err) => {
                        error!(job_id = %job_id, error = %store_err, "Could not record job failure");
                        Err(e)
                    }
                }
            }
        }
    }

    async fn process(
        &self,
        job_id: &str,
        mapping_name: &str,
        payload: IngestPayload,
        state: &mut RunState,
    ) -> AppResult<()> {
        let chunks = payload.open(self.config.chunk_size).await?;

        let total_rows = chunks.total_rows();
        self.tracker.set_total_rows(job_id, total_rows).await?;
        debug!(job_id = %job_id, total_rows, columns = chunks.columns().len(), "Source opened");

        for chunk in chunks {
            if self.cancel_requested.swap(false, Ordering::SeqCst) {
                return Err(IngestError::Cancelled {
                    job_id: job_id.to_string(),
                    chunk: chunk.index,
                }
                .into());
            }

            for row_error in &chunk.row_errors {
                warn!(job_id = %job_id, chunk = chunk.index, error = %row_error, "Skipping unreadable row");
                state
                    .summary
                    .push_error(row_error.to_string(), self.config.max_reported_errors);
            }

            let entries = self.build_chunk(job_id, mapping_name, &chunk).await;
            if entries.is_empty() {
                debug!(job_id = %job_id, chunk = chunk.index, "No rows to write");
                continue;
            }

            if let Err(e) = self.storage.write_batch(&entries).await {
                let message = format!("Failed to write chunk {}: {}", chunk.index, e);
                error!(job_id = %job_id, chunk = chunk.index, error = %e, "Chunk write failed");
                state
                    .summary
                    .push_error(message, self.config.max_reported_errors);
                continue;
            }

            let delta = JobProgress {
                processed: entries.len() as u64,
                sentiment_records: entries.iter().map(|e| e.fragments.len() as u64).sum(),
                entity_records: entries.iter().map(|e| e.entities.len() as u64).sum(),
            };
            state.progress.processed += delta.processed;
            state.progress.sentiment_records += delta.sentiment_records;
            state.progress.entity_records += delta.entity_records;
            self.tracker.increment_job_progress(job_id, delta).await?;

            debug!(
                job_id = %job_id,
                chunk = chunk.index,
                rows = delta.processed,
                sentiment_records = delta.sentiment_records,
                "Chunk written"
            );
        }

        Ok(())
    }

    async fn build_chunk(
        &self,
        job_id: &str,
        mapping_name: &str,
        chunk: &SourceChunk,
    ) -> Vec<TicketBatchEntry> {
        let mapping = match self.mapper.get_mapping(mapping_name) {
            Some(mapping) => mapping,
            None => self
                .mapper
                .create_mapping_from_table(&chunk.table, mapping_name),
        };
        let projected = ColumnMapper::apply_mapping(&chunk.table, &mapping);

        let mut entries = Vec::with_capacity(projected.len());
        for row in projected.rows() {
            entries.push(self.build_entry(job_id, row, &mapping).await);
        }
        entries
    }

    /// Everything persisted for one row. Classifier failures degrade to the
    /// fallback result and never fail the row.
    async fn build_entry(
        &self,
        job_id: &str,
        row: TableRow<'_>,
        mapping: &ColumnMapping,
    ) -> TicketBatchEntry {
        let ticket_id = mapping
            .id_column
            .as_deref()
            .and_then(|column| row.get(column))
            .map(|id| id.trim().to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let text_at = |i: usize| {
            mapping
                .text_columns
                .get(i)
                .and_then(|column| row.get(column))
                .map(|value| value.trim().to_string())
                .unwrap_or_default()
        };
        let summary = text_at(0);
        let description = text_at(1);

        let ticket = TicketRecord {
            ticket_id: ticket_id.clone(),
            issue_type: row
                .get_any(ISSUE_TYPE_COLUMNS)
                .map(|v| v.trim().to_string()),
            parent_ticket_id: row.get(PARENT_COLUMN).map(|v| v.trim().to_string()),
            summary,
            description,
        };

        let mut fragments = Vec::new();
        if !ticket.summary.is_empty() {
            let result = self.classify(job_id, &ticket_id, &ticket.summary).await;
            fragments.push(SentimentFragment::summary(&ticket_id, &ticket.summary, result));
        }
        if !ticket.description.is_empty() {
            let result = self.classify(job_id, &ticket_id, &ticket.description).await;
            fragments.push(SentimentFragment::description(
                &ticket_id,
                &ticket.description,
                result,
            ));
        }

        let mut comment_count = 0i64;
        for column in &mapping.comment_columns {
            let Some(raw) = row.get(column) else {
                continue;
            };
            let parsed = CommentParser::parse(raw);
            if parsed.text().trim().is_empty() {
                continue;
            }

            comment_count += 1;
            let result = self.classify(job_id, &ticket_id, parsed.text()).await;
            let fragment = SentimentFragment::comment(&ticket_id, comment_count, parsed.text(), result)
                .with_metadata(parsed.timestamp(), parsed.author_id().map(str::to_string));
            fragments.push(fragment);
        }

        let ultimate = SentimentAggregator::calculate_ultimate(&fragments, self.config.strategy);
        let aggregate = TicketAggregate::from_ultimate(&ticket_id, &ultimate, comment_count);

        let combined = format!("{} {}", ticket.summary, ticket.description);
        let entities = self.extract_entities(job_id, &ticket_id, combined.trim()).await;

        TicketBatchEntry {
            ticket,
            fragments,
            entities,
            aggregate,
        }
    }

    async fn classify(&self, job_id: &str, ticket_id: &str, text: &str) -> SentimentResult {
        let started = Instant::now();
        match tokio::time::timeout(self.classifier_timeout, self.classifier.analyze_sentiment(text))
            .await
        {
            Ok(Ok(result)) => {
                debug!(
                    job_id = %job_id,
                    ticket_id = %ticket_id,
                    label = %result.label,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "Fragment classified"
                );
                result
            }
            Ok(Err(e)) => {
                warn!(job_id = %job_id, ticket_id = %ticket_id, error = %e, "Classification failed; using fallback");
                SentimentResult::fallback()
            }
            Err(_) => {
                warn!(
                    job_id = %job_id,
                    ticket_id = %ticket_id,
                    timeout_ms = self.classifier_timeout.as_millis() as u64,
                    "Classification timed out; using fallback"
                );
                SentimentResult::fallback()
            }
        }
    }

    async fn extract_entities(&self, job_id: &str, ticket_id: &str, text: &str) -> Vec<Entity> {
        if text.is_empty() {
            return Vec::new();
        }
        let input: String = text.chars().take(ENTITY_INPUT_MAX_CHARS).collect();

        let entities =
            match tokio::time::timeout(self.classifier_timeout, self.classifier.extract_entities(&input))
                .await
            {
                Ok(Ok(entities)) => entities,
                Ok(Err(e)) => {
                    warn!(job_id = %job_id, ticket_id = %ticket_id, error = %e, "Entity extraction failed");
                    return Vec::new();
                }
                Err(_) => {
                    warn!(job_id = %job_id, ticket_id = %ticket_id, "Entity extraction timed out");
                    return Vec::new();
                }
            };

        entities
            .into_iter()
            .filter(|entity| entity.text.chars().count() <= ENTITY_TEXT_MAX_CHARS)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{MockSentimentClassifier, SentimentLabel};
    use crate::error::ClassifierError;
    use crate::storage::SqliteStorage;

    async fn orchestrator(classifier: MockSentimentClassifier) -> IngestionOrchestrator {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        IngestionOrchestrator::new(
            Arc::new(storage),
            Arc::new(classifier),
            JobTracker::in_memory(),
            Arc::new(ColumnMapper::new()),
            IngestConfig::default(),
        )
    }

    fn entity(text: String) -> Entity {
        Entity {
            text,
            label: "ORG".to_string(),
            start: 0,
            end: 0,
        }
    }

    #[tokio::test]
    async fn test_classifier_error_uses_fallback() {
        let mut classifier = MockSentimentClassifier::new();
        classifier.expect_analyze_sentiment().times(1).returning(|_| {
            Err(ClassifierError::Unavailable {
                message: "connection refused".to_string(),
                retries: 3,
            })
        });

        let orchestrator = orchestrator(classifier).await;
        let result = orchestrator.classify("job-1", "T-1", "broken again").await;
        assert_eq!(result, SentimentResult::fallback());
    }

    #[tokio::test]
    async fn test_classifier_result_passed_through() {
        let mut classifier = MockSentimentClassifier::new();
        classifier
            .expect_analyze_sentiment()
            .withf(|text| text == "thanks")
            .returning(|_| Ok(SentimentResult::new(SentimentLabel::Positive, 0.9)));

        let orchestrator = orchestrator(classifier).await;
        let result = orchestrator.classify("job-1", "T-1", "thanks").await;
        assert_eq!(result.label, SentimentLabel::Positive);
    }

    #[tokio::test]
    async fn test_entity_input_truncated_and_long_entities_dropped() {
        let mut classifier = MockSentimentClassifier::new();
        classifier
            .expect_extract_entities()
            .withf(|text| text.chars().count() == ENTITY_INPUT_MAX_CHARS)
            .times(1)
            .returning(|_| {
                Ok(vec![
                    entity("Acme".to_string()),
                    entity("x".repeat(ENTITY_TEXT_MAX_CHARS + 1)),
                ])
            });

        let orchestrator = orchestrator(classifier).await;
        let long_text = "a".repeat(ENTITY_INPUT_MAX_CHARS * 2);
        let entities = orchestrator.extract_entities("job-1", "T-1", &long_text).await;

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "Acme");
    }

    #[tokio::test]
    async fn test_entity_failure_yields_no_entities() {
        let mut classifier = MockSentimentClassifier::new();
        classifier.expect_extract_entities().returning(|_| {
            Err(ClassifierError::InvalidResponse {
                message: "not json".to_string(),
            })
        });

        let orchestrator = orchestrator(classifier).await;
        assert!(orchestrator
            .extract_entities("job-1", "T-1", "Acme outage")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_skips_entity_call() {
        let mut classifier = MockSentimentClassifier::new();
        classifier.expect_extract_entities().times(0);

        let orchestrator = orchestrator(classifier).await;
        assert!(orchestrator.extract_entities("job-1", "T-1", "").await.is_empty());
    }
}
