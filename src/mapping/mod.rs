//! Column detection for arbitrary tabular ticket exports.
//!
//! A [`ColumnMapping`] records which columns hold free text, which hold
//! numbered comments and which one identifies the ticket. Mappings are
//! computed once per source and cached by [`ColumnMapper`].

mod rules;
mod table;

pub use rules::{
    classify, ColumnProfile, ColumnRole, DetectionRule, SampleStats, DETECTION_RULES,
    MIN_SAMPLED_TEXT_LEN, SAMPLE_SIZE, TEXT_KEYWORDS,
};
pub use table::{Table, TableRow};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Columns always considered text when present.
pub const HIGH_SIGNAL_COLUMNS: &[&str] =
    &["Summary", "Description", "Comment", "Comments", "Issue summary"];

/// When any of these exist they replace the detected text columns.
pub const PREFERRED_TEXT_COLUMNS: &[&str] = &["Summary", "Description", "Parent summary"];

/// Fallback identifier columns, in priority order.
pub const ID_ALIASES: &[&str] = &["Issue key", "Issue id", "ticket_id", "Ticket ID", "ID"];

/// Metadata columns carried through projection.
pub const METADATA_COLUMNS: &[&str] = &["Parent", "Issue Type", "Issue type"];

/// Detected column roles for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_name: String,
    pub text_columns: Vec<String>,
    /// Sorted by numeric suffix (`Comment.2` before `Comment.10`).
    pub comment_columns: Vec<String>,
    pub id_column: Option<String>,
}

impl ColumnMapping {
    /// Compute a mapping from column profiles without touching any cache
    pub fn detect(profiles: &[ColumnProfile], source_name: &str) -> Self {
        let mut detected: Vec<String> = Vec::new();

        for profile in profiles {
            if let Some(rule) = classify(profile) {
                if rule.role.is_text() {
                    debug!(column = %profile.name, rule = rule.name, "Detected text column");
                    push_unique(&mut detected, &profile.name);
                }
            }
        }

        for candidate in HIGH_SIGNAL_COLUMNS {
            if let Some(found) = find_header(profiles, candidate) {
                push_unique(&mut detected, found);
            }
        }

        let mut comment_columns: Vec<String> = detected
            .iter()
            .filter(|c| c.to_lowercase().starts_with("comment"))
            .cloned()
            .collect();
        comment_columns.sort_by_key(|c| comment_suffix(c));

        let preferred: Vec<String> = PREFERRED_TEXT_COLUMNS
            .iter()
            .filter_map(|c| find_header(profiles, c))
            .map(str::to_string)
            .collect();
        let text_columns = if preferred.is_empty() {
            detected
        } else {
            preferred
        };

        Self {
            source_name: source_name.to_string(),
            text_columns,
            comment_columns,
            id_column: detect_id_column(profiles),
        }
    }

    /// Column names a projection keeps, in output order
    pub fn projected_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        if let Some(id) = &self.id_column {
            push_unique(&mut columns, id);
        }
        for column in self.text_columns.iter().chain(&self.comment_columns) {
            push_unique(&mut columns, column);
        }
        for column in METADATA_COLUMNS {
            push_unique(&mut columns, column);
        }
        columns
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn find_header<'a>(profiles: &'a [ColumnProfile], name: &str) -> Option<&'a str> {
    let lower = name.to_lowercase();
    profiles
        .iter()
        .find(|p| p.lower == lower)
        .map(|p| p.name.as_str())
}

fn detect_id_column(profiles: &[ColumnProfile]) -> Option<String> {
    profiles
        .iter()
        .find(|p| p.lower.contains("id"))
        .map(|p| p.name.as_str())
        .or_else(|| ID_ALIASES.iter().find_map(|alias| find_header(profiles, alias)))
        .map(str::to_string)
}

/// Integer after the last '.', 0 when absent or not numeric
fn comment_suffix(column: &str) -> u64 {
    column
        .rsplit_once('.')
        .and_then(|(_, suffix)| suffix.trim().parse().ok())
        .unwrap_or(0)
}

/// Per-source cache of detected column mappings.
///
/// A cached mapping is never replaced; concurrent first requests for the same
/// source agree on whichever mapping was inserted first.
#[derive(Debug, Default)]
pub struct ColumnMapper {
    cache: RwLock<HashMap<String, Arc<ColumnMapping>>>,
}

impl ColumnMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect a mapping from headers alone, or return the cached one
    pub fn create_mapping(&self, headers: &[String], source_name: &str) -> Arc<ColumnMapping> {
        if let Some(existing) = self.get_mapping(source_name) {
            return existing;
        }
        let profiles: Vec<ColumnProfile> =
            headers.iter().map(|h| ColumnProfile::from_header(h)).collect();
        self.insert(ColumnMapping::detect(&profiles, source_name))
    }

    /// Detect a mapping using sampled cell values, or return the cached one
    pub fn create_mapping_from_table(&self, table: &Table, source_name: &str) -> Arc<ColumnMapping> {
        if let Some(existing) = self.get_mapping(source_name) {
            return existing;
        }
        let profiles: Vec<ColumnProfile> = table
            .columns()
            .iter()
            .map(|c| ColumnProfile::from_table(table, c))
            .collect();
        self.insert(ColumnMapping::detect(&profiles, source_name))
    }

    pub fn get_mapping(&self, source_name: &str) -> Option<Arc<ColumnMapping>> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.get(source_name).cloned()
    }

    /// Drop a cached mapping once its source is exhausted
    pub fn evict(&self, source_name: &str) -> bool {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.remove(source_name).is_some()
    }

    /// Project a table onto the mapped columns. Never fails.
    pub fn apply_mapping(table: &Table, mapping: &ColumnMapping) -> Table {
        table.project(&mapping.projected_columns())
    }

    fn insert(&self, mapping: ColumnMapping) -> Arc<ColumnMapping> {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        let entry = cache
            .entry(mapping.source_name.clone())
            .or_insert_with(|| {
                info!(
                    source = %mapping.source_name,
                    text_columns = mapping.text_columns.len(),
                    comment_columns = mapping.comment_columns.len(),
                    id_column = ?mapping.id_column,
                    "Created column mapping"
                );
                Arc::new(mapping)
            });
        Arc::clone(entry)
    }
}
