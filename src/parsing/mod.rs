//! Parsers for semi-structured ticket text.

pub mod comment;

pub use comment::{CommentParser, ParsedComment, COMMENT_TIMESTAMP_FORMAT};
