use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::{
    FieldType, SentimentFragment, Storage, StoredTicket, TicketAggregate, TicketBatchEntry,
    TicketHistory, TicketRecord,
};
use crate::classifier::{Entity, SentimentLabel};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const COMMENT_TIMESTAMP_STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// In-memory database; a single connection keeps every query on the same database
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn write_entry(
        tx: &mut Transaction<'_, Sqlite>,
        entry: &TicketBatchEntry,
        now: &str,
    ) -> StorageResult<()> {
        let ticket = &entry.ticket;
        let aggregate = &entry.aggregate;

        sqlx::query(
            r#"
            INSERT INTO tickets (
                ticket_id, summary, description, issue_type, parent_ticket_id,
                ultimate_sentiment, ultimate_confidence, sentiment_trend, comment_count,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(ticket_id) DO UPDATE SET
                summary = excluded.summary,
                description = excluded.description,
                issue_type = excluded.issue_type,
                parent_ticket_id = excluded.parent_ticket_id,
                ultimate_sentiment = excluded.ultimate_sentiment,
                ultimate_confidence = excluded.ultimate_confidence,
                sentiment_trend = excluded.sentiment_trend,
                comment_count = excluded.comment_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&ticket.ticket_id)
        .bind(&ticket.summary)
        .bind(&ticket.description)
        .bind(&ticket.issue_type)
        .bind(&ticket.parent_ticket_id)
        .bind(aggregate.ultimate_sentiment.as_str())
        .bind(aggregate.ultimate_confidence)
        .bind(aggregate.trend.as_str())
        .bind(aggregate.comment_count)
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        sqlx::query("DELETE FROM sentiment_fragments WHERE ticket_id = ?")
            .bind(&ticket.ticket_id)
            .execute(&mut **tx)
            .await?;

        for fragment in &entry.fragments {
            sqlx::query(
                r#"
                INSERT INTO sentiment_fragments (
                    ticket_id, field_type, sequence_number, comment_number, text,
                    sentiment_label, confidence, comment_timestamp, author_id, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&ticket.ticket_id)
            .bind(fragment.field_type.as_str())
            .bind(fragment.sequence_number)
            .bind(fragment.comment_number)
            .bind(&fragment.text)
            .bind(fragment.sentiment_label.as_str())
            .bind(fragment.confidence)
            .bind(
                fragment
                    .timestamp
                    .map(|ts| ts.format(COMMENT_TIMESTAMP_STORAGE_FORMAT).to_string()),
            )
            .bind(&fragment.author_id)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }

        sqlx::query("DELETE FROM entities WHERE ticket_id = ?")
            .bind(&ticket.ticket_id)
            .execute(&mut **tx)
            .await?;

        for entity in &entry.entities {
            sqlx::query(
                r#"
                INSERT INTO entities (ticket_id, entity_text, entity_label, start_pos, end_pos, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&ticket.ticket_id)
            .bind(&entity.text)
            .bind(&entity.label)
            .bind(entity.start)
            .bind(entity.end)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn write_batch(&self, entries: &[TicketBatchEntry]) -> StorageResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            Self::write_entry(&mut tx, entry, &now).await?;
        }
        tx.commit().await?;

        debug!(tickets = entries.len(), "Wrote ticket batch");
        Ok(())
    }

    async fn get_ticket(&self, ticket_id: &str) -> StorageResult<Option<StoredTicket>> {
        let row: Option<TicketRow> = sqlx::query_as(
            r#"
            SELECT ticket_id, summary, description, issue_type, parent_ticket_id,
                   ultimate_sentiment, ultimate_confidence, sentiment_trend, comment_count,
                   created_at, updated_at
            FROM tickets
            WHERE ticket_id = ?
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_ticket_fragments(&self, ticket_id: &str) -> StorageResult<Vec<SentimentFragment>> {
        let rows: Vec<FragmentRow> = sqlx::query_as(
            r#"
            SELECT ticket_id, field_type, sequence_number, comment_number, text,
                   sentiment_label, confidence, comment_timestamp, author_id
            FROM sentiment_fragments
            WHERE ticket_id = ?
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_ticket_entities(&self, ticket_id: &str) -> StorageResult<Vec<Entity>> {
        let rows: Vec<EntityRow> = sqlx::query_as(
            r#"
            SELECT entity_text, entity_label, start_pos, end_pos
            FROM entities
            WHERE ticket_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list_ticket_histories(&self, limit: usize) -> StorageResult<Vec<TicketHistory>> {
        let rows: Vec<TicketRow> = sqlx::query_as(
            r#"
            SELECT ticket_id, summary, description, issue_type, parent_ticket_id,
                   ultimate_sentiment, ultimate_confidence, sentiment_trend, comment_count,
                   created_at, updated_at
            FROM tickets
            ORDER BY updated_at DESC, ticket_id ASC
            LIMIT ?
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut histories = Vec::with_capacity(rows.len());
        for row in rows {
            let stored: StoredTicket = row.into();
            let fragments = self.get_ticket_fragments(&stored.ticket.ticket_id).await?;
            histories.push(TicketHistory {
                ticket: stored.ticket,
                fragments,
            });
        }
        Ok(histories)
    }

    async fn count_tickets(&self) -> StorageResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tickets")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct TicketRow {
    ticket_id: String,
    summary: String,
    description: String,
    issue_type: Option<String>,
    parent_ticket_id: Option<String>,
    ultimate_sentiment: String,
    ultimate_confidence: f64,
    sentiment_trend: String,
    comment_count: i64,
    created_at: String,
    updated_at: String,
}

fn parse_rfc3339(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_label(value: &str) -> SentimentLabel {
    value.parse().unwrap_or_else(|e| {
        warn!(error = %e, "Unreadable stored sentiment label");
        SentimentLabel::Neutral
    })
}

impl From<TicketRow> for StoredTicket {
    fn from(row: TicketRow) -> Self {
        Self {
            aggregate: TicketAggregate {
                ticket_id: row.ticket_id.clone(),
                ultimate_sentiment: parse_label(&row.ultimate_sentiment),
                ultimate_confidence: row.ultimate_confidence,
                trend: row.sentiment_trend.parse().unwrap_or_default(),
                comment_count: row.comment_count,
            },
            ticket: TicketRecord {
                ticket_id: row.ticket_id,
                summary: row.summary,
                description: row.description,
                issue_type: row.issue_type,
                parent_ticket_id: row.parent_ticket_id,
            },
            created_at: parse_rfc3339(&row.created_at),
            updated_at: parse_rfc3339(&row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct FragmentRow {
    ticket_id: String,
    field_type: String,
    sequence_number: i64,
    comment_number: Option<i64>,
    text: String,
    sentiment_label: String,
    confidence: f64,
    comment_timestamp: Option<String>,
    author_id: Option<String>,
}

impl From<FragmentRow> for SentimentFragment {
    fn from(row: FragmentRow) -> Self {
        Self {
            ticket_id: row.ticket_id,
            field_type: row.field_type.parse().unwrap_or(FieldType::Comment),
            sequence_number: row.sequence_number,
            comment_number: row.comment_number,
            text: row.text,
            sentiment_label: parse_label(&row.sentiment_label),
            confidence: row.confidence,
            timestamp: row.comment_timestamp.and_then(|ts| {
                NaiveDateTime::parse_from_str(&ts, COMMENT_TIMESTAMP_STORAGE_FORMAT).ok()
            }),
            author_id: row.author_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    entity_text: String,
    entity_label: String,
    start_pos: i64,
    end_pos: i64,
}

impl From<EntityRow> for Entity {
    fn from(row: EntityRow) -> Self {
        Self {
            text: row.entity_text,
            label: row.entity_label,
            start: row.start_pos,
            end: row.end_pos,
        }
    }
}
