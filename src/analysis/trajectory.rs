//! Per-ticket sentiment trajectory classification.
//!
//! Works on the ticket's fragment texts and the labels predicted for them.
//! Every function here is pure: same input, same output, no I/O.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::lexicon::{self, ASPECTS, DIMINISHERS, INTENSIFIERS};
use crate::classifier::{SentimentLabel, SentimentResult};
use crate::error::{AnalysisError, AnalysisResult};

const BASE_INTENSITY: f64 = 0.5;
const INTENSIFIER_WEIGHT: f64 = 0.15;
const DIMINISHER_WEIGHT: f64 = 0.1;
const EXCLAMATION_WEIGHT: f64 = 0.05;
const EXCLAMATION_CAP: f64 = 0.2;
const CAPS_WEIGHT: f64 = 0.05;
const CAPS_CAP: f64 = 0.15;

const VOLATILE_THRESHOLD: f64 = 0.7;
const POLARITY_THRESHOLD: f64 = 0.3;
const TURNING_POINT_CONFIDENCE: f64 = 0.7;

/// Shape of a ticket's sentiment over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrajectoryType {
    /// Started negative, ended positive.
    #[serde(rename = "disgruntled_to_satisfied")]
    Improving,
    /// Started positive, ended negative.
    #[serde(rename = "satisfied_to_disgruntled")]
    Deteriorating,
    #[serde(rename = "consistently_positive")]
    ConsistentlyPositive,
    #[serde(rename = "consistently_negative")]
    ConsistentlyNegative,
    /// Swinging between polarities.
    #[serde(rename = "volatile")]
    Volatile,
    #[serde(rename = "neutral_stable")]
    NeutralStable,
}

impl TrajectoryType {
    pub const ALL: [TrajectoryType; 6] = [
        TrajectoryType::Improving,
        TrajectoryType::Deteriorating,
        TrajectoryType::ConsistentlyPositive,
        TrajectoryType::ConsistentlyNegative,
        TrajectoryType::Volatile,
        TrajectoryType::NeutralStable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrajectoryType::Improving => "disgruntled_to_satisfied",
            TrajectoryType::Deteriorating => "satisfied_to_disgruntled",
            TrajectoryType::ConsistentlyPositive => "consistently_positive",
            TrajectoryType::ConsistentlyNegative => "consistently_negative",
            TrajectoryType::Volatile => "volatile",
            TrajectoryType::NeutralStable => "neutral_stable",
        }
    }

    fn from_label(label: SentimentLabel) -> Self {
        match label {
            SentimentLabel::Positive => TrajectoryType::ConsistentlyPositive,
            SentimentLabel::Negative => TrajectoryType::ConsistentlyNegative,
            SentimentLabel::Neutral => TrajectoryType::NeutralStable,
        }
    }
}

impl fmt::Display for TrajectoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TrajectoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrajectoryType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown trajectory type: {}", s))
    }
}

/// Detailed score for one fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentScore {
    pub label: SentimentLabel,
    pub confidence: f64,
    /// Linguistic emphasis in [0, 1]; informational, never changes the label.
    pub intensity: f64,
    /// Aspects mentioned in the fragment, tagged with the fragment's label.
    pub aspects: BTreeMap<String, SentimentLabel>,
}

impl FragmentScore {
    /// sign(label) · intensity
    pub fn signed_value(&self) -> f64 {
        self.label.score() * self.intensity
    }
}

/// A label change backed by a confident prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurningPoint {
    pub index: usize,
    /// `"negative→positive"` style description.
    pub change: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryAnalysis {
    pub ticket_id: String,
    pub trajectory_type: TrajectoryType,
    pub initial_sentiment: FragmentScore,
    pub final_sentiment: FragmentScore,
    pub turning_points: Vec<TurningPoint>,
    pub sentiment_history: Vec<FragmentScore>,
    /// Mean absolute step between consecutive signed values, in [0, 1].
    pub volatility_score: f64,
    /// Final minus initial signed value, in [-1, 1].
    pub improvement_score: f64,
}

/// Intensity of a fragment from intensifiers, diminishers and emphasis
pub fn calculate_intensity(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let words: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();
    let lower_words: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();

    let intensifiers = lower_words
        .iter()
        .filter(|w| INTENSIFIERS.contains(&w.as_str()))
        .count();

    let diminishers: usize = DIMINISHERS
        .iter()
        .map(|d| {
            if d.contains(' ') {
                count_phrase(&lower, d)
            } else {
                lower_words.iter().filter(|w| w.as_str() == *d).count()
            }
        })
        .sum();

    let exclamations = text.matches('!').count();
    let caps_words = words.iter().filter(|w| is_shouted(w)).count();

    let intensity = BASE_INTENSITY + INTENSIFIER_WEIGHT * intensifiers as f64
        - DIMINISHER_WEIGHT * diminishers as f64
        + (EXCLAMATION_WEIGHT * exclamations as f64).min(EXCLAMATION_CAP)
        + (CAPS_WEIGHT * caps_words as f64).min(CAPS_CAP);

    intensity.clamp(0.0, 1.0)
}

/// Count whole-word occurrences of a multi-word phrase
fn count_phrase(lower: &str, phrase: &str) -> usize {
    lower
        .match_indices(phrase)
        .filter(|(start, _)| {
            let before = lower[..*start].chars().next_back();
            let after = lower[start + phrase.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
        .count()
}

fn is_shouted(word: &str) -> bool {
    word.chars().count() > 2
        && word.chars().any(char::is_alphabetic)
        && word
            .chars()
            .filter(|c| c.is_alphabetic())
            .all(char::is_uppercase)
}

/// Aspects mentioned in the text
pub fn extract_aspects(text: &str) -> Vec<&'static str> {
    lexicon::matching_keys(ASPECTS, text)
}

/// Stateless trajectory classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct TrajectoryAnalyzer;

impl TrajectoryAnalyzer {
    /// Analyze one ticket.
    ///
    /// `fragments` and `predictions` are parallel, chronologically ordered
    /// lists. Either being empty, or their lengths differing, is a
    /// validation error.
    pub fn analyze_trajectory<T: AsRef<str>>(
        ticket_id: &str,
        fragments: &[T],
        predictions: &[SentimentResult],
    ) -> AnalysisResult<TrajectoryAnalysis> {
        if fragments.is_empty() {
            return Err(AnalysisError::Validation {
                field: "fragments".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if predictions.is_empty() {
            return Err(AnalysisError::Validation {
                field: "predictions".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if fragments.len() != predictions.len() {
            return Err(AnalysisError::Validation {
                field: "predictions".to_string(),
                reason: format!(
                    "expected {} predictions, got {}",
                    fragments.len(),
                    predictions.len()
                ),
            });
        }

        let history: Vec<FragmentScore> = fragments
            .iter()
            .zip(predictions)
            .map(|(text, prediction)| Self::score_fragment(text.as_ref(), prediction))
            .collect();

        let values: Vec<f64> = history.iter().map(FragmentScore::signed_value).collect();
        let volatility = Self::volatility(&values);
        let trajectory_type = Self::classify(&history, &values, volatility);
        let turning_points = Self::turning_points(&history);

        let initial = history[0].clone();
        let last = history[history.len() - 1].clone();
        let improvement = (last.signed_value() - initial.signed_value()).clamp(-1.0, 1.0);

        Ok(TrajectoryAnalysis {
            ticket_id: ticket_id.to_string(),
            trajectory_type,
            initial_sentiment: initial,
            final_sentiment: last,
            turning_points,
            sentiment_history: history,
            volatility_score: volatility.clamp(0.0, 1.0),
            improvement_score: improvement,
        })
    }

    fn score_fragment(text: &str, prediction: &SentimentResult) -> FragmentScore {
        FragmentScore {
            label: prediction.label,
            confidence: prediction.confidence,
            intensity: calculate_intensity(text),
            aspects: extract_aspects(text)
                .into_iter()
                .map(|aspect| (aspect.to_string(), prediction.label))
                .collect(),
        }
    }

    fn volatility(values: &[f64]) -> f64 {
        if values.len() < 2 {
            return 0.0;
        }
        let steps: f64 = values.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        steps / (values.len() - 1) as f64
    }

    fn classify(history: &[FragmentScore], values: &[f64], volatility: f64) -> TrajectoryType {
        if history.len() == 1 {
            return TrajectoryType::from_label(history[0].label);
        }

        let k = (values.len() / 3).max(1);
        let first = values[..k].iter().sum::<f64>() / k as f64;
        let last = values[values.len() - k..].iter().sum::<f64>() / k as f64;

        if volatility > VOLATILE_THRESHOLD {
            TrajectoryType::Volatile
        } else if first < -POLARITY_THRESHOLD && last > POLARITY_THRESHOLD {
            TrajectoryType::Improving
        } else if first > POLARITY_THRESHOLD && last < -POLARITY_THRESHOLD {
            TrajectoryType::Deteriorating
        } else if last > POLARITY_THRESHOLD {
            TrajectoryType::ConsistentlyPositive
        } else if last < -POLARITY_THRESHOLD {
            TrajectoryType::ConsistentlyNegative
        } else {
            TrajectoryType::NeutralStable
        }
    }

    fn turning_points(history: &[FragmentScore]) -> Vec<TurningPoint> {
        history
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| {
                pair[0].label != pair[1].label && pair[1].confidence > TURNING_POINT_CONFIDENCE
            })
            .map(|(i, pair)| TurningPoint {
                index: i + 1,
                change: format!("{}→{}", pair[0].label, pair[1].label),
            })
            .collect()
    }
}
