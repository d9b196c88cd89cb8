//! Ordered rule table for column role detection.
//!
//! Each rule pairs a predicate over a [`ColumnProfile`] with the role it
//! assigns. Rules are evaluated top to bottom and the first match wins.

use super::table::Table;

/// Header substrings that mark free-text columns.
pub const TEXT_KEYWORDS: &[&str] = &[
    "summary",
    "description",
    "comment",
    "text",
    "message",
    "feedback",
    "problem",
    "request",
];

/// Number of non-empty values inspected by the sampling rule.
pub const SAMPLE_SIZE: usize = 5;

/// Minimum average sampled length for the free-text fallback.
pub const MIN_SAMPLED_TEXT_LEN: f64 = 10.0;

/// Role a detection rule assigns to a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Free text to classify.
    Text,
    /// Numbered comment column; also classified as text.
    Comment,
}

impl ColumnRole {
    pub fn is_text(&self) -> bool {
        matches!(self, ColumnRole::Text | ColumnRole::Comment)
    }
}

/// Sample statistics for a column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStats {
    /// True when at least one sampled value is not numeric.
    pub string_typed: bool,
    pub avg_len: f64,
}

/// Everything the rules may look at for one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub lower: String,
    /// `None` when only headers are known.
    pub sample: Option<SampleStats>,
}

impl ColumnProfile {
    pub fn from_header(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lower: name.to_lowercase(),
            sample: None,
        }
    }

    /// Profile a column using up to [`SAMPLE_SIZE`] non-empty values
    pub fn from_table(table: &Table, name: &str) -> Self {
        let values: Vec<&str> = table.column_values(name).take(SAMPLE_SIZE).collect();
        let sample = if values.is_empty() {
            None
        } else {
            let total: usize = values.iter().map(|v| v.chars().count()).sum();
            Some(SampleStats {
                string_typed: values.iter().any(|v| v.trim().parse::<f64>().is_err()),
                avg_len: total as f64 / values.len() as f64,
            })
        };

        Self {
            sample,
            ..Self::from_header(name)
        }
    }
}

/// A single predicate → role entry
#[derive(Debug, Clone, Copy)]
pub struct DetectionRule {
    pub name: &'static str,
    pub role: ColumnRole,
    predicate: fn(&ColumnProfile) -> bool,
}

impl DetectionRule {
    pub fn matches(&self, profile: &ColumnProfile) -> bool {
        (self.predicate)(profile)
    }
}

fn is_comment_column(profile: &ColumnProfile) -> bool {
    profile.lower.starts_with("comment")
}

fn has_text_keyword(profile: &ColumnProfile) -> bool {
    TEXT_KEYWORDS.iter().any(|k| profile.lower.contains(k))
}

fn looks_like_free_text(profile: &ColumnProfile) -> bool {
    profile
        .sample
        .is_some_and(|s| s.string_typed && s.avg_len > MIN_SAMPLED_TEXT_LEN)
}

/// Detection rules, in evaluation order.
pub const DETECTION_RULES: &[DetectionRule] = &[
    DetectionRule {
        name: "comment_prefix",
        role: ColumnRole::Comment,
        predicate: is_comment_column,
    },
    DetectionRule {
        name: "text_keyword",
        role: ColumnRole::Text,
        predicate: has_text_keyword,
    },
    DetectionRule {
        name: "sampled_free_text",
        role: ColumnRole::Text,
        predicate: looks_like_free_text,
    },
];

/// First rule matching the profile
pub fn classify(profile: &ColumnProfile) -> Option<&'static DetectionRule> {
    DETECTION_RULES.iter().find(|rule| rule.matches(profile))
}
