//! Storage layer for tickets, sentiment fragments and entities.
//!
//! The ingestion pipeline writes one [`TicketBatchEntry`] per ticket; each
//! batch is written in a single transaction so a ticket's fragments and its
//! aggregate never disagree.

mod sqlite;


pub use sqlite::SqliteStorage;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{Scored, SentimentTrend, UltimateSentiment};
use crate::classifier::{Entity, SentimentLabel, SentimentResult};
use crate::error::StorageResult;

/// Stored fragment text is truncated to this many characters.
pub const MAX_STORED_TEXT_CHARS: usize = 1000;

/// Ticket field a fragment was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Summary,
    Description,
    Comment,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Summary => "summary",
            FieldType::Description => "description",
            FieldType::Comment => "comment",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(FieldType::Summary),
            "description" => Ok(FieldType::Description),
            "comment" => Ok(FieldType::Comment),
            _ => Err(format!("Unknown field type: {}", s)),
        }
    }
}

/// One classified piece of a ticket.
///
/// Ordered within a ticket by `sequence_number`: summary = 0,
/// description = 1, comment k = k + 1 (comments are numbered from 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentFragment {
    pub ticket_id: String,
    pub field_type: FieldType,
    pub sequence_number: i64,
    pub comment_number: Option<i64>,
    pub text: String,
    pub sentiment_label: SentimentLabel,
    pub confidence: f64,
    pub timestamp: Option<NaiveDateTime>,
    pub author_id: Option<String>,
}

impl SentimentFragment {
    pub fn summary(ticket_id: impl Into<String>, text: &str, result: SentimentResult) -> Self {
        Self::build(ticket_id.into(), FieldType::Summary, None, text, result)
    }

    pub fn description(ticket_id: impl Into<String>, text: &str, result: SentimentResult) -> Self {
        Self::build(ticket_id.into(), FieldType::Description, None, text, result)
    }

    /// Comment fragment; `comment_number` starts at 1
    pub fn comment(
        ticket_id: impl Into<String>,
        comment_number: i64,
        text: &str,
        result: SentimentResult,
    ) -> Self {
        Self::build(
            ticket_id.into(),
            FieldType::Comment,
            Some(comment_number),
            text,
            result,
        )
    }

    pub fn with_metadata(mut self, timestamp: Option<NaiveDateTime>, author_id: Option<String>) -> Self {
        self.timestamp = timestamp;
        self.author_id = author_id;
        self
    }

    pub fn sequence_for(field_type: FieldType, comment_number: Option<i64>) -> i64 {
        match field_type {
            FieldType::Summary => 0,
            FieldType::Description => 1,
            FieldType::Comment => comment_number.unwrap_or(1) + 1,
        }
    }

    fn build(
        ticket_id: String,
        field_type: FieldType,
        comment_number: Option<i64>,
        text: &str,
        result: SentimentResult,
    ) -> Self {
        Self {
            ticket_id,
            field_type,
            sequence_number: Self::sequence_for(field_type, comment_number),
            comment_number,
            text: text.chars().take(MAX_STORED_TEXT_CHARS).collect(),
            sentiment_label: result.label,
            confidence: result.confidence,
            timestamp: None,
            author_id: None,
        }
    }

    pub fn result(&self) -> SentimentResult {
        SentimentResult::new(self.sentiment_label, self.confidence)
    }
}

impl Scored for SentimentFragment {
    fn label(&self) -> SentimentLabel {
        self.sentiment_label
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Ticket row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub ticket_id: String,
    pub summary: String,
    pub description: String,
    pub issue_type: Option<String>,
    pub parent_ticket_id: Option<String>,
}

/// Ticket-level sentiment, recomputed whenever fragments are rewritten
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketAggregate {
    pub ticket_id: String,
    pub ultimate_sentiment: SentimentLabel,
    pub ultimate_confidence: f64,
    pub trend: SentimentTrend,
    pub comment_count: i64,
}

impl TicketAggregate {
    pub fn from_ultimate(
        ticket_id: impl Into<String>,
        ultimate: &UltimateSentiment,
        comment_count: i64,
    ) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            ultimate_sentiment: ultimate.label,
            ultimate_confidence: ultimate.confidence,
            trend: ultimate.trend,
            comment_count,
        }
    }
}

/// Everything written for one ticket in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketBatchEntry {
    pub ticket: TicketRecord,
    pub fragments: Vec<SentimentFragment>,
    pub entities: Vec<Entity>,
    pub aggregate: TicketAggregate,
}

impl TicketBatchEntry {
    pub fn ticket_id(&self) -> &str {
        &self.ticket.ticket_id
    }
}

/// Ticket as read back from storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTicket {
    pub ticket: TicketRecord,
    pub aggregate: TicketAggregate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A ticket with its chronologically ordered fragments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketHistory {
    pub ticket: TicketRecord,
    pub fragments: Vec<SentimentFragment>,
}

impl TicketHistory {
    /// Fragment texts, parallel to [`Self::predictions`]
    pub fn texts(&self) -> Vec<&str> {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }

    pub fn predictions(&self) -> Vec<SentimentResult> {
        self.fragments.iter().map(SentimentFragment::result).collect()
    }
}

/// Storage trait for ticket sentiment persistence
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write a batch in one transaction.
    ///
    /// Per ticket: upsert the ticket row, replace its fragments, replace its
    /// entities and write its aggregate. Either every entry lands or none.
    async fn write_batch(&self, entries: &[TicketBatchEntry]) -> StorageResult<()>;

    async fn get_ticket(&self, ticket_id: &str) -> StorageResult<Option<StoredTicket>>;

    /// Fragments ordered by sequence number.
    async fn get_ticket_fragments(&self, ticket_id: &str) -> StorageResult<Vec<SentimentFragment>>;

    async fn get_ticket_entities(&self, ticket_id: &str) -> StorageResult<Vec<Entity>>;

    /// Most recently updated tickets with their fragments.
    async fn list_ticket_histories(&self, limit: usize) -> StorageResult<Vec<TicketHistory>>;

    async fn count_tickets(&self) -> StorageResult<u64>;
}
