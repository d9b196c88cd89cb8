//! Fragment sentiment classification boundary.
//!
//! Labels are produced by an external ML service. This module defines the
//! typed result records, the [`SentimentClassifier`] seam the ingestion
//! pipeline depends on, and the HTTP client that talks to the service.

mod client;
mod types;


pub use client::MlServiceClient;
pub use types::*;

use async_trait::async_trait;

use crate::error::ClassifierResult;

/// External capability that labels text.
///
/// Implementations may fail freely; callers substitute
/// [`SentimentResult::fallback`] and never propagate classifier errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Classify the sentiment of one fragment of text.
    async fn analyze_sentiment(&self, text: &str) -> ClassifierResult<SentimentResult>;

    /// Extract named entities from the text.
    async fn extract_entities(&self, text: &str) -> ClassifierResult<Vec<Entity>>;
}
