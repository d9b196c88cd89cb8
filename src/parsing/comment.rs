//! Parser for comments carrying an embedded `timestamp;author;text` header.
//!
//! Jira exports each comment cell as
//! `10/Oct/25 11:45 AM;5f05c9e30b38b1002265;Message text...`. Anything that
//! does not have that shape is passed through untouched as raw text.

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// `DD/Mon/YY HH:MM AM|PM`
pub const COMMENT_TIMESTAMP_FORMAT: &str = "%d/%b/%y %I:%M %p";

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)^(\d{2}/\w{3}/\d{2}\s+\d{1,2}:\d{2}\s+[AP]M);([^;]+);(.+)")
            .expect("comment pattern is a valid regex")
    })
}

/// Outcome of parsing a single comment cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedComment {
    /// The cell matched the metadata header.
    ///
    /// `timestamp` is `None` when the header matched structurally but the
    /// date itself could not be parsed.
    Structured {
        timestamp: Option<NaiveDateTime>,
        author_id: String,
        text: String,
    },
    /// No header; the whole (trimmed) cell is comment text.
    Raw { text: String },
}

impl ParsedComment {
    pub fn text(&self) -> &str {
        match self {
            ParsedComment::Structured { text, .. } | ParsedComment::Raw { text } => text,
        }
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            ParsedComment::Structured { timestamp, .. } => *timestamp,
            ParsedComment::Raw { .. } => None,
        }
    }

    pub fn author_id(&self) -> Option<&str> {
        match self {
            ParsedComment::Structured { author_id, .. } => Some(author_id),
            ParsedComment::Raw { .. } => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParsedComment::Structured { .. })
    }
}

/// Stateless comment cell parser
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentParser;

impl CommentParser {
    /// Parse a comment cell. Defined for every input; never fails.
    pub fn parse(raw: &str) -> ParsedComment {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return ParsedComment::Raw {
                text: String::new(),
            };
        }

        match comment_pattern().captures(trimmed) {
            Some(caps) => {
                let timestamp = caps.get(1).and_then(|m| Self::parse_timestamp(m.as_str()));
                let author_id = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
                let text = caps.get(3).map_or("", |m| m.as_str()).trim().to_string();

                ParsedComment::Structured {
                    timestamp,
                    author_id,
                    text,
                }
            }
            None => ParsedComment::Raw {
                text: trimmed.to_string(),
            },
        }
    }

    /// Parse an optional cell; missing cells become empty raw text
    pub fn parse_optional(raw: Option<&str>) -> ParsedComment {
        Self::parse(raw.unwrap_or_default())
    }

    fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
        match NaiveDateTime::parse_from_str(value, COMMENT_TIMESTAMP_FORMAT) {
            Ok(ts) => Some(ts),
            Err(e) => {
                warn!(timestamp = %value, error = %e, "Failed to parse comment timestamp");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_well_formed_comment() {
        let parsed = CommentParser::parse("10/Oct/25 11:45 AM;5f05c9e30b38b1002265;Great, thanks!");

        let expected = NaiveDate::from_ymd_opt(2025, 10, 10)
            .and_then(|d| d.and_hms_opt(11, 45, 0))
            .unwrap();
        assert!(parsed.is_parsed());
        assert_eq!(parsed.timestamp(), Some(expected));
        assert_eq!(parsed.author_id(), Some("5f05c9e30b38b1002265"));
        assert_eq!(parsed.text(), "Great, thanks!");
    }

    #[test]
    fn test_parse_pm_timestamp() {
        let parsed = CommentParser::parse("03/Feb/24 4:05 PM;abc;Still broken");
        let expected = NaiveDate::from_ymd_opt(2024, 2, 3)
            .and_then(|d| d.and_hms_opt(16, 5, 0))
            .unwrap();
        assert_eq!(parsed.timestamp(), Some(expected));
    }

    #[test]
    fn test_structural_match_with_bad_date_keeps_author_and_text() {
        let parsed = CommentParser::parse("45/Foo/25 11:45 AM;user-1;Text survives");

        assert!(parsed.is_parsed());
        assert_eq!(parsed.timestamp(), None);
        assert_eq!(parsed.author_id(), Some("user-1"));
        assert_eq!(parsed.text(), "Text survives");
    }

    #[test]
    fn test_unstructured_comment_is_passthrough() {
        let parsed = CommentParser::parse("  just a plain comment; with a semicolon ");

        assert!(!parsed.is_parsed());
        assert_eq!(parsed.timestamp(), None);
        assert_eq!(parsed.author_id(), None);
        assert_eq!(parsed.text(), "just a plain comment; with a semicolon");
    }

    #[test]
    fn test_empty_and_missing_input() {
        for parsed in [
            CommentParser::parse(""),
            CommentParser::parse("   \n\t"),
            CommentParser::parse_optional(None),
        ] {
            assert!(!parsed.is_parsed());
            assert_eq!(parsed.text(), "");
            assert_eq!(parsed.author_id(), None);
        }
    }

    #[test]
    fn test_multiline_comment_text() {
        let parsed = CommentParser::parse("01/Jan/25 9:00 AM;bob;line one\nline two");
        assert_eq!(parsed.text(), "line one\nline two");
    }

    #[test]
    fn test_parse_is_total_over_garbage() {
        let inputs = [
            ";;;",
            "10/Oct/25",
            "10/Oct/25 11:45 AM;",
            "10/Oct/25 11:45 AM;;text",
            "\u{0}\u{1}\u{2}",
            "🙂🙂🙂;;",
            "99/ZZZ/99 99:99 PM;x;y",
        ];
        for input in inputs {
            let parsed = CommentParser::parse(input);
            assert!(parsed.text().len() <= input.len());
        }
    }
}
