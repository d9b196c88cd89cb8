//! Collapse a ticket's chronological fragments into one "ultimate" sentiment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classifier::{SentimentLabel, SentimentResult};

/// Number of trailing fragments considered by the weighted-recent strategy.
///
/// Tunable; larger windows react more slowly to late changes.
pub const RECENT_WINDOW: usize = 5;

/// Score threshold separating neutral from polar labels.
const LABEL_THRESHOLD: f64 = 0.2;
/// Half-over-half difference for the trajectory strategy.
const TRAJECTORY_THRESHOLD: f64 = 0.2;
/// Half-over-half difference for the shared trend helper.
const TREND_THRESHOLD: f64 = 0.3;

/// Anything carrying a sentiment label and a confidence.
pub trait Scored {
    fn label(&self) -> SentimentLabel;
    fn confidence(&self) -> f64;
}

impl Scored for SentimentResult {
    fn label(&self) -> SentimentLabel {
        self.label
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

impl<T: Scored + ?Sized> Scored for &T {
    fn label(&self) -> SentimentLabel {
        (**self).label()
    }

    fn confidence(&self) -> f64 {
        (**self).confidence()
    }
}

/// Aggregation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// Most recent fragment wins.
    Latest,
    /// Recency-weighted mean over the last [`RECENT_WINDOW`] fragments.
    #[default]
    WeightedRecent,
    /// First half versus second half of the whole history.
    Trajectory,
}

impl AggregationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationStrategy::Latest => "latest",
            AggregationStrategy::WeightedRecent => "weighted_recent",
            AggregationStrategy::Trajectory => "trajectory",
        }
    }
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AggregationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Ok(AggregationStrategy::Latest),
            "weighted_recent" => Ok(AggregationStrategy::WeightedRecent),
            "trajectory" => Ok(AggregationStrategy::Trajectory),
            _ => Err(format!("Unknown aggregation strategy: {}", s)),
        }
    }
}

/// Direction of sentiment over a ticket's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentTrend {
    Improving,
    Declining,
    #[default]
    Stable,
}

impl SentimentTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentTrend::Improving => "improving",
            SentimentTrend::Declining => "declining",
            SentimentTrend::Stable => "stable",
        }
    }
}

impl fmt::Display for SentimentTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SentimentTrend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "improving" => Ok(SentimentTrend::Improving),
            "declining" => Ok(SentimentTrend::Declining),
            "stable" => Ok(SentimentTrend::Stable),
            _ => Err(format!("Unknown sentiment trend: {}", s)),
        }
    }
}

/// Ticket-level sentiment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UltimateSentiment {
    pub label: SentimentLabel,
    /// Rounded to 3 decimals, always within [0, 1].
    pub confidence: f64,
    pub trend: SentimentTrend,
}

impl UltimateSentiment {
    fn new(label: SentimentLabel, confidence: f64, trend: SentimentTrend) -> Self {
        Self {
            label,
            confidence: normalize_confidence(confidence),
            trend,
        }
    }

    /// Result for a ticket with no fragments
    pub fn empty() -> Self {
        Self::new(SentimentLabel::Neutral, 0.5, SentimentTrend::Stable)
    }
}

fn normalize_confidence(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    ((value * 1000.0).round() / 1000.0).clamp(0.0, 1.0)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Stateless ticket-level aggregation
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentAggregator;

impl SentimentAggregator {
    /// Aggregate chronologically ordered fragments
    pub fn calculate_ultimate<S: Scored>(
        fragments: &[S],
        strategy: AggregationStrategy,
    ) -> UltimateSentiment {
        match fragments {
            [] => UltimateSentiment::empty(),
            [only] => UltimateSentiment::new(only.label(), only.confidence(), SentimentTrend::Stable),
            _ => match strategy {
                AggregationStrategy::Latest => Self::latest(fragments),
                AggregationStrategy::WeightedRecent => Self::weighted_recent(fragments),
                AggregationStrategy::Trajectory => Self::trajectory(fragments),
            },
        }
    }

    fn latest<S: Scored>(fragments: &[S]) -> UltimateSentiment {
        let last = &fragments[fragments.len() - 1];
        UltimateSentiment::new(last.label(), last.confidence(), Self::trend(fragments))
    }

    fn weighted_recent<S: Scored>(fragments: &[S]) -> UltimateSentiment {
        let window = &fragments[fragments.len().saturating_sub(RECENT_WINDOW)..];

        let mut total_weight = 0.0;
        let mut weighted_score = 0.0;
        let mut weighted_confidence = 0.0;
        for (i, fragment) in window.iter().enumerate() {
            let weight = (i + 1) as f64;
            total_weight += weight;
            weighted_score += fragment.label().score() * weight * fragment.confidence();
            weighted_confidence += fragment.confidence() * weight;
        }

        let score = weighted_score / total_weight;
        let label = if score > LABEL_THRESHOLD {
            SentimentLabel::Positive
        } else if score < -LABEL_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        UltimateSentiment::new(label, weighted_confidence / total_weight, Self::trend(fragments))
    }

    fn trajectory<S: Scored>(fragments: &[S]) -> UltimateSentiment {
        let (first, second) = fragments.split_at(fragments.len() / 2);
        let first_avg = mean(first.iter().map(|f| f.label().score() * f.confidence()));
        let second_avg = mean(second.iter().map(|f| f.label().score() * f.confidence()));
        let diff = second_avg - first_avg;

        let (label, trend) = if diff > TRAJECTORY_THRESHOLD {
            (SentimentLabel::Positive, SentimentTrend::Improving)
        } else if diff < -TRAJECTORY_THRESHOLD {
            (SentimentLabel::Negative, SentimentTrend::Declining)
        } else {
            (fragments[fragments.len() - 1].label(), SentimentTrend::Stable)
        };

        UltimateSentiment::new(label, mean(fragments.iter().map(|f| f.confidence())), trend)
    }

    /// Shared half-over-half trend on unweighted label scores
    pub fn trend<S: Scored>(fragments: &[S]) -> SentimentTrend {
        if fragments.len() < 2 {
            return SentimentTrend::Stable;
        }

        let (first, second) = fragments.split_at(fragments.len() / 2);
        let diff = mean(second.iter().map(|f| f.label().score()))
            - mean(first.iter().map(|f| f.label().score()));

        if diff > TREND_THRESHOLD {
            SentimentTrend::Improving
        } else if diff < -TREND_THRESHOLD {
            SentimentTrend::Declining
        } else {
            SentimentTrend::Stable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SentimentLabel::{Negative, Neutral, Positive};

    fn results(items: &[(SentimentLabel, f64)]) -> Vec<SentimentResult> {
        items
            .iter()
            .map(|(label, confidence)| SentimentResult::new(*label, *confidence))
            .collect()
    }

    const ALL: [AggregationStrategy; 3] = [
        AggregationStrategy::Latest,
        AggregationStrategy::WeightedRecent,
        AggregationStrategy::Trajectory,
    ];

    #[test]
    fn test_empty_input() {
        for strategy in ALL {
            let ultimate = SentimentAggregator::calculate_ultimate::<SentimentResult>(&[], strategy);
            assert_eq!(ultimate, UltimateSentiment::empty());
            assert_eq!(ultimate.confidence, 0.5);
        }
    }

    #[test]
    fn test_single_fragment_is_its_own_result() {
        let fragments = results(&[(Negative, 0.87)]);
        for strategy in ALL {
            let ultimate = SentimentAggregator::calculate_ultimate(&fragments, strategy);
            assert_eq!(ultimate.label, Negative);
            assert_eq!(ultimate.confidence, 0.87);
            assert_eq!(ultimate.trend, SentimentTrend::Stable);
        }
    }

    #[test]
    fn test_weighted_recent_favours_late_negatives() {
        let fragments = results(&[
            (Positive, 0.9),
            (Positive, 0.8),
            (Negative, 0.95),
            (Negative, 0.9),
            (Negative, 0.85),
        ]);
        let ultimate =
            SentimentAggregator::calculate_ultimate(&fragments, AggregationStrategy::WeightedRecent);

        assert_eq!(ultimate.label, Negative);
        // (0.9 + 1.6 + 2.85 + 3.6 + 4.25) / 15
        assert_eq!(ultimate.confidence, 0.88);
        assert_eq!(ultimate.trend, SentimentTrend::Declining);
    }

    #[test]
    fn test_weighted_recent_only_uses_window() {
        let mut items = vec![(Negative, 1.0); 10];
        items.extend([(Positive, 0.9); RECENT_WINDOW]);
        let ultimate = SentimentAggregator::calculate_ultimate(
            &results(&items),
            AggregationStrategy::WeightedRecent,
        );
        assert_eq!(ultimate.label, Positive);
        assert_eq!(ultimate.confidence, 0.9);
    }

    #[test]
    fn test_weighted_recent_neutral_band() {
        let fragments = results(&[(Positive, 0.5), (Negative, 0.5), (Neutral, 0.9)]);
        let ultimate =
            SentimentAggregator::calculate_ultimate(&fragments, AggregationStrategy::WeightedRecent);
        assert_eq!(ultimate.label, Neutral);
    }

    #[test]
    fn test_latest_uses_final_fragment() {
        let fragments = results(&[(Negative, 0.9), (Negative, 0.8), (Positive, 0.61)]);
        let ultimate = SentimentAggregator::calculate_ultimate(&fragments, AggregationStrategy::Latest);
        assert_eq!(ultimate.label, Positive);
        assert_eq!(ultimate.confidence, 0.61);
        // first half [-1], second half [-1, +1] => diff 1.0
        assert_eq!(ultimate.trend, SentimentTrend::Improving);
    }

    #[test]
    fn test_trajectory_strategy() {
        let improving = results(&[(Negative, 0.9), (Negative, 0.7), (Positive, 0.8), (Positive, 0.6)]);
        let ultimate =
            SentimentAggregator::calculate_ultimate(&improving, AggregationStrategy::Trajectory);
        assert_eq!(ultimate.label, Positive);
        assert_eq!(ultimate.trend, SentimentTrend::Improving);
        assert_eq!(ultimate.confidence, 0.75);

        let flat = results(&[(Positive, 0.5), (Neutral, 0.5), (Negative, 0.1)]);
        let ultimate = SentimentAggregator::calculate_ultimate(&flat, AggregationStrategy::Trajectory);
        // first [0.5], second [0.0, -0.1] => diff -0.55
        assert_eq!(ultimate.label, Negative);
        assert_eq!(ultimate.trend, SentimentTrend::Declining);
    }

    #[test]
    fn test_trajectory_stable_keeps_latest_label() {
        let fragments = results(&[(Neutral, 0.9), (Neutral, 0.9), (Positive, 0.2)]);
        let ultimate =
            SentimentAggregator::calculate_ultimate(&fragments, AggregationStrategy::Trajectory);
        // second half mean 0.1 => diff 0.1, within the band
        assert_eq!(ultimate.label, Positive);
        assert_eq!(ultimate.trend, SentimentTrend::Stable);
    }

    #[test]
    fn test_trend_helper_thresholds() {
        assert_eq!(SentimentAggregator::trend::<SentimentResult>(&[]), SentimentTrend::Stable);
        let mild = results(&[(Neutral, 1.0), (Neutral, 1.0), (Neutral, 1.0), (Positive, 1.0)]);
        // diff 0.5
        assert_eq!(SentimentAggregator::trend(&mild), SentimentTrend::Improving);
        let mut flat = results(&[(Neutral, 1.0), (Neutral, 1.0), (Neutral, 1.0), (Positive, 1.0)]);
        flat.extend(results(&[(Neutral, 1.0); 4]));
        // diff -0.25
        assert_eq!(SentimentAggregator::trend(&flat), SentimentTrend::Stable);
    }

    struct Wild(f64);

    impl Scored for Wild {
        fn label(&self) -> SentimentLabel {
            Positive
        }

        fn confidence(&self) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_confidence_is_always_bounded() {
        for strategy in ALL {
            let fragments = [Wild(3.0), Wild(2.5), Wild(f64::NAN)];
            let ultimate = SentimentAggregator::calculate_ultimate(&fragments, strategy);
            assert!((0.0..=1.0).contains(&ultimate.confidence));
        }
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!(
            "weighted_recent".parse::<AggregationStrategy>(),
            Ok(AggregationStrategy::WeightedRecent)
        );
        assert_eq!(" Latest ".parse::<AggregationStrategy>(), Ok(AggregationStrategy::Latest));
        assert!("median".parse::<AggregationStrategy>().is_err());
        assert_eq!(AggregationStrategy::default(), AggregationStrategy::WeightedRecent);
    }
}
