use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, ClassifierResult};

/// Categorical sentiment label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Signed score used by every aggregation: +1, 0, -1.
    pub fn score(&self) -> f64 {
        match self {
            SentimentLabel::Positive => 1.0,
            SentimentLabel::Neutral => 0.0,
            SentimentLabel::Negative => -1.0,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SentimentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            _ => Err(format!("Unknown sentiment label: {}", s)),
        }
    }
}

/// Validated sentiment for one piece of text
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

impl SentimentResult {
    /// Confidence substituted whenever the classifier cannot answer.
    pub const FALLBACK_CONFIDENCE: f64 = 0.3;

    /// Create a result, clamping confidence into [0, 1]
    pub fn new(label: SentimentLabel, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { label, confidence }
    }

    /// The neutral/0.3 result used when classification fails or times out
    pub fn fallback() -> Self {
        Self::new(SentimentLabel::Neutral, Self::FALLBACK_CONFIDENCE)
    }
}

/// Named entity span returned by the classification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
}

/// Request body for both classification endpoints
#[derive(Debug, Clone, Serialize)]
pub struct TextRequest {
    pub text: String,
}

impl TextRequest {
    /// Build a request, truncating the text to `max_chars` characters
    pub fn truncated(text: &str, max_chars: usize) -> Self {
        Self {
            text: text.chars().take(max_chars).collect::<String>().trim().to_string(),
        }
    }
}

/// Raw sentiment response before validation
#[derive(Debug, Clone, Deserialize)]
pub struct SentimentResponse {
    pub sentiment: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl SentimentResponse {
    /// Validate the wire payload into a typed result
    pub fn into_result(self) -> ClassifierResult<SentimentResult> {
        let label: SentimentLabel = self
            .sentiment
            .parse()
            .map_err(|message| ClassifierError::InvalidResponse { message })?;

        let confidence = match self.confidence {
            Some(c) if c.is_finite() => c,
            Some(c) => {
                return Err(ClassifierError::InvalidResponse {
                    message: format!("Non-finite confidence: {}", c),
                })
            }
            None => 0.5,
        };

        Ok(SentimentResult::new(label, confidence))
    }
}

/// Raw entity extraction response
#[derive(Debug, Clone, Deserialize)]
pub struct EntitiesResponse {
    #[serde(default)]
    pub entities: Vec<Entity>,
}
