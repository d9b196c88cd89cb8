//! Batch ingestion of ticket exports.
//!
//! A [`JobQueue`] records a job and hands it to the single [`IngestWorker`],
//! which runs it through the [`IngestionOrchestrator`] chunk by chunk.

mod orchestrator;
mod queue;
mod source;

pub use orchestrator::{IngestionOrchestrator, ENTITY_INPUT_MAX_CHARS, ENTITY_TEXT_MAX_CHARS};
pub use queue::{IngestTask, IngestWorker, JobQueue, DEFAULT_QUEUE_CAPACITY};
pub use source::{
    IngestPayload, RawTicket, SourceChunk, TableChunks, RECORD_DESCRIPTION_COLUMN,
    RECORD_ID_COLUMN, RECORD_SUMMARY_COLUMN,
};
