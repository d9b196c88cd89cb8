//! Ingestion payloads and the chunked row reader over them.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};
use crate::mapping::Table;

/// Column headers used when JSON records are laid out as a table.
pub const RECORD_ID_COLUMN: &str = "ticket_id";
pub const RECORD_SUMMARY_COLUMN: &str = "Summary";
pub const RECORD_DESCRIPTION_COLUMN: &str = "Description";

/// One ticket submitted as a JSON record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTicket {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub comments: Vec<String>,
}

/// What a job ingests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestPayload {
    CsvFile { path: PathBuf },
    CsvContent { content: String, file_name: String },
    Records { records: Vec<RawTicket> },
}

impl IngestPayload {
    /// Short label stored as the job's `source`
    pub fn source_label(&self) -> &'static str {
        match self {
            IngestPayload::CsvFile { .. } => "csv_file",
            IngestPayload::CsvContent { .. } => "csv_upload",
            IngestPayload::Records { .. } => "json_batch",
        }
    }

    pub fn file_name(&self) -> Option<String> {
        match self {
            IngestPayload::CsvFile { path } => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            IngestPayload::CsvContent { file_name, .. } => Some(file_name.clone()),
            IngestPayload::Records { .. } => None,
        }
    }

    /// Open the payload for chunked reading.
    ///
    /// Failures here are job-scope: the source is missing, unreadable or has
    /// no header row.
    pub async fn open(self, chunk_size: usize) -> IngestResult<TableChunks> {
        match self {
            IngestPayload::CsvFile { path } => {
                let content = tokio::fs::read(&path).await.map_err(|e| {
                    IngestError::SourceUnavailable {
                        message: format!("{}: {}", path.display(), e),
                    }
                })?;
                TableChunks::from_csv(content, chunk_size)
            }
            IngestPayload::CsvContent { content, .. } => TableChunks::from_csv(content, chunk_size),
            IngestPayload::Records { records } => Ok(TableChunks::from_records(records, chunk_size)),
        }
    }
}

type RowResult = Result<Vec<Option<String>>, IngestError>;

/// Repeated headers get `.1`, `.2`, ... so every column is addressable
/// (`Comment, Comment, Comment` becomes `Comment, Comment.1, Comment.2`).
fn dedupe_headers(headers: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::new();
    for header in headers {
        let count = seen.entry(header.clone()).or_insert(0);
        if *count == 0 {
            columns.push(header);
        } else {
            columns.push(format!("{}.{}", header, count));
        }
        *count += 1;
    }
    columns
}

/// One chunk of rows ready for mapping
#[derive(Debug)]
pub struct SourceChunk {
    /// 1-based
    pub index: usize,
    pub table: Table,
    /// Rows that could not be read; the rest of the chunk is still usable.
    pub row_errors: Vec<IngestError>,
}

/// Groups a row stream into tables of at most `chunk_size` rows
pub struct TableChunks {
    columns: Vec<String>,
    rows: Box<dyn Iterator<Item = RowResult> + Send>,
    total_rows: u64,
    chunk_size: usize,
    next_index: usize,
}

impl TableChunks {
    /// Read a CSV export held in memory.
    ///
    /// Short rows are padded. Rows wider than the header or with invalid
    /// UTF-8 become per-row `MalformedRow` errors.
    pub fn from_csv(content: impl Into<Vec<u8>>, chunk_size: usize) -> IngestResult<Self> {
        let content = content.into();
        let total_rows = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(content.as_slice())
            .records()
            .count() as u64;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(Cursor::new(content));

        let columns = dedupe_headers(
            reader
                .headers()
                .map_err(|e| IngestError::SourceUnavailable {
                    message: format!("Unreadable header row: {}", e),
                })?
                .iter()
                .map(|h| h.trim().to_string()),
        );

        if columns.iter().all(|c| c.is_empty()) {
            return Err(IngestError::SourceUnavailable {
                message: "CSV has no header row".to_string(),
            });
        }

        let width = columns.len();
        let rows = reader
            .into_records()
            .enumerate()
            .map(move |(i, record)| match record {
                Ok(record) if record.len() > width => Err(IngestError::MalformedRow {
                    row: i + 1,
                    message: format!(
                        "found record with {} fields, but the header has {}",
                        record.len(),
                        width
                    ),
                }),
                Ok(record) => Ok(record.iter().map(|v| Some(v.to_string())).collect()),
                Err(e) => Err(IngestError::MalformedRow {
                    row: i + 1,
                    message: e.to_string(),
                }),
            });

        Ok(Self {
            columns,
            rows: Box::new(rows),
            total_rows,
            chunk_size: chunk_size.max(1),
            next_index: 1,
        })
    }

    /// Lay records out as `ticket_id, Summary, Description, Comment 1..n`
    pub fn from_records(records: Vec<RawTicket>, chunk_size: usize) -> Self {
        let max_comments = records.iter().map(|r| r.comments.len()).max().unwrap_or(0);

        let mut columns = vec![
            RECORD_ID_COLUMN.to_string(),
            RECORD_SUMMARY_COLUMN.to_string(),
            RECORD_DESCRIPTION_COLUMN.to_string(),
        ];
        columns.extend((1..=max_comments).map(|k| format!("Comment {}", k)));

        let total_rows = records.len() as u64;
        let rows = records.into_iter().map(|record| {
            let mut row = Vec::with_capacity(3 + record.comments.len());
            row.push(record.id);
            row.push(Some(record.summary));
            row.push(Some(record.description));
            row.extend(record.comments.into_iter().map(Some));
            Ok(row)
        });

        Self {
            columns,
            rows: Box::new(rows),
            total_rows,
            chunk_size: chunk_size.max(1),
            next_index: 1,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows, malformed ones included
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }
}

impl Iterator for TableChunks {
    type Item = SourceChunk;

    fn next(&mut self) -> Option<SourceChunk> {
        let mut table = Table::new(self.columns.clone());
        let mut row_errors = Vec::new();

        for row in self.rows.by_ref().take(self.chunk_size) {
            match row {
                Ok(values) => table.push_row(values),
                Err(e) => row_errors.push(e),
            }
        }

        if table.is_empty() && row_errors.is_empty() {
            return None;
        }

        let index = self.next_index;
        self.next_index += 1;
        Some(SourceChunk {
            index,
            table,
            row_errors,
        })
    }
}
