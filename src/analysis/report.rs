//! Plain-text population report and per-ticket recommendations.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::causal::{categorize_issue, CausalFactor};
use super::trajectory::{TrajectoryAnalysis, TrajectoryType};

const RULE_WIDTH: usize = 80;
const TOP_FACTORS: usize = 10;

/// Improvement above which a ticket counts as improved in [`TrajectoryStats`].
const IMPROVED_THRESHOLD: f64 = 0.3;

/// Aggregate counts over a set of trajectories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStats {
    pub total_tickets: usize,
    /// Trajectory type counts, most frequent first (ties by name).
    pub distribution: Vec<(TrajectoryType, usize)>,
    pub average_improvement: f64,
    pub improved: usize,
    pub deteriorated: usize,
}

impl TrajectoryStats {
    pub fn from_analyses(analyses: &[TrajectoryAnalysis]) -> Self {
        let mut counts: BTreeMap<TrajectoryType, usize> = BTreeMap::new();
        for analysis in analyses {
            *counts.entry(analysis.trajectory_type).or_default() += 1;
        }
        let mut distribution: Vec<(TrajectoryType, usize)> = counts.into_iter().collect();
        distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

        let average_improvement = if analyses.is_empty() {
            0.0
        } else {
            analyses.iter().map(|a| a.improvement_score).sum::<f64>() / analyses.len() as f64
        };

        Self {
            total_tickets: analyses.len(),
            distribution,
            average_improvement,
            improved: analyses
                .iter()
                .filter(|a| a.improvement_score > IMPROVED_THRESHOLD)
                .count(),
            deteriorated: analyses
                .iter()
                .filter(|a| a.improvement_score < -IMPROVED_THRESHOLD)
                .count(),
        }
    }

    pub fn count(&self, trajectory_type: TrajectoryType) -> usize {
        self.distribution
            .iter()
            .find(|(t, _)| *t == trajectory_type)
            .map_or(0, |(_, n)| *n)
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Render the population report.
///
/// `total_tickets` is the number of tickets considered, which may exceed the
/// number of trajectories when some tickets could not be analyzed.
pub fn render_report(
    total_tickets: usize,
    trajectories: &[TrajectoryAnalysis],
    causal_factors: &[CausalFactor],
) -> String {
    let stats = TrajectoryStats::from_analyses(trajectories);
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    // writeln! into a String cannot fail
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "SENTIMENT TRAJECTORY ANALYSIS REPORT");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);

    let _ = writeln!(out, "## SUMMARY STATISTICS");
    let _ = writeln!(out, "Total Tickets Analyzed: {total_tickets}");
    let _ = writeln!(out, "Trajectories Identified: {}", trajectories.len());
    let _ = writeln!(out);

    let _ = writeln!(out, "## TRAJECTORY DISTRIBUTION");
    for (trajectory_type, count) in &stats.distribution {
        let _ = writeln!(
            out,
            "  {}: {} ({:.1}%)",
            trajectory_type,
            count,
            percent(*count, trajectories.len())
        );
    }
    let _ = writeln!(out);

    let improved = stats.count(TrajectoryType::Improving);
    let deteriorated = stats.count(TrajectoryType::Deteriorating);
    let _ = writeln!(out, "## KEY FINDINGS");
    let _ = writeln!(
        out,
        "  Tickets that improved: {} ({:.1}%)",
        improved,
        percent(improved, trajectories.len())
    );
    let _ = writeln!(
        out,
        "  Tickets that deteriorated: {} ({:.1}%)",
        deteriorated,
        percent(deteriorated, trajectories.len())
    );
    let _ = writeln!(out);

    if !causal_factors.is_empty() {
        let mut ranked: Vec<&CausalFactor> = causal_factors.iter().collect();
        ranked.sort_by(|a, b| {
            b.correlation_strength
                .abs()
                .total_cmp(&a.correlation_strength.abs())
                .then_with(|| a.issue_category.cmp(&b.issue_category))
        });

        let _ = writeln!(out, "## CAUSAL FACTORS");
        let _ = writeln!(out, "Top factors influencing sentiment:");
        for factor in ranked.into_iter().take(TOP_FACTORS) {
            let _ = writeln!(
                out,
                "  {}: correlation={:.3} (n={})",
                factor.issue_category, factor.correlation_strength, factor.sample_size
            );
        }
        let _ = writeln!(out);
    }

    out.push_str(&rule);
    out
}

/// Actionable follow-ups for one analyzed ticket
pub fn recommendations(analysis: &TrajectoryAnalysis, description: &str) -> Vec<String> {
    let mut out: Vec<&str> = Vec::new();

    match analysis.trajectory_type {
        TrajectoryType::Improving => {
            out.push("Customer sentiment improved significantly.");
            out.push("Document the resolution approach for future similar cases.");
        }
        TrajectoryType::Deteriorating => {
            out.push("Customer sentiment deteriorated despite initial satisfaction.");
            out.push("Escalate to a supervisor for immediate review.");
            out.push("Reach out proactively to understand the concerns.");
        }
        TrajectoryType::ConsistentlyNegative => {
            out.push("Persistent negative sentiment detected.");
            out.push("Assign a senior support agent if not already done.");
            out.push("Consider compensation or escalation to management.");
        }
        TrajectoryType::Volatile => {
            out.push("Unstable sentiment trajectory detected.");
            out.push("Customer may be receiving inconsistent information.");
        }
        TrajectoryType::ConsistentlyPositive | TrajectoryType::NeutralStable => {}
    }

    if analysis.volatility_score > 0.7 {
        out.push("High volatility: ensure consistent messaging across team members.");
    }
    if analysis.improvement_score < -0.5 {
        out.push("Significant deterioration: requires immediate management attention.");
    } else if analysis.improvement_score > 0.5 {
        out.push("Excellent recovery: share as a success story with the team.");
    }
    if analysis.turning_points.len() > 3 {
        out.push("Multiple sentiment changes: review the communication approach.");
    }

    let categories = categorize_issue(description);
    if categories.contains(&"security") {
        out.push("Security issue: ensure the compliance team is notified.");
    }
    if categories.contains(&"billing") {
        out.push("Billing issue: fast-track the refund if applicable.");
    }
    if categories.contains(&"bug") {
        out.push("Bug reported: link to an engineering ticket for tracking.");
    }

    if out.is_empty() {
        out.push("Continue monitoring ticket progress.");
    }
    out.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::trajectory::TrajectoryAnalyzer;
    use crate::classifier::{SentimentLabel, SentimentResult};

    fn analysis(id: &str, labels: &[SentimentLabel]) -> TrajectoryAnalysis {
        let texts: Vec<&str> = labels.iter().map(|_| "text").collect();
        let preds: Vec<SentimentResult> = labels
            .iter()
            .map(|l| SentimentResult::new(*l, 0.9))
            .collect();
        TrajectoryAnalyzer::analyze_trajectory(id, &texts, &preds).unwrap()
    }

    fn improving(id: &str) -> TrajectoryAnalysis {
        use SentimentLabel::*;
        analysis(id, &[Negative, Negative, Neutral, Positive, Positive])
    }

    #[test]
    fn test_stats_distribution_order() {
        use SentimentLabel::*;
        let analyses = vec![
            improving("1"),
            analysis("2", &[Positive]),
            analysis("3", &[Positive]),
            analysis("4", &[Neutral]),
        ];
        let stats = TrajectoryStats::from_analyses(&analyses);
        assert_eq!(stats.total_tickets, 4);
        assert_eq!(stats.distribution[0], (TrajectoryType::ConsistentlyPositive, 2));
        assert_eq!(stats.count(TrajectoryType::Improving), 1);
        assert_eq!(stats.improved, 1);
        assert_eq!(stats.deteriorated, 0);
    }

    #[test]
    fn test_render_report_sections() {
        use SentimentLabel::*;
        let analyses = vec![improving("1"), analysis("2", &[Positive])];
        let factors = vec![CausalFactor {
            issue_category: "bug".to_string(),
            correlation_strength: -0.4567,
            sample_size: 42,
            confidence_interval: (-0.6, -0.2),
            associated_trajectory_types: vec![TrajectoryType::Improving],
        }];

        let report = render_report(3, &analyses, &factors);
        assert!(report.starts_with(&"=".repeat(80)));
        assert!(report.contains("Total Tickets Analyzed: 3"));
        assert!(report.contains("Trajectories Identified: 2"));
        assert!(report.contains("  disgruntled_to_satisfied: 1 (50.0%)"));
        assert!(report.contains("  Tickets that improved: 1 (50.0%)"));
        assert!(report.contains("  bug: correlation=-0.457 (n=42)"));
    }

    #[test]
    fn test_render_report_handles_empty_population() {
        let report = render_report(0, &[], &[]);
        assert!(report.contains("Tickets that improved: 0 (0.0%)"));
        assert!(!report.contains("CAUSAL FACTORS"));
    }

    #[test]
    fn test_recommendations() {
        use SentimentLabel::*;
        let recovered = improving("1");
        let recs = recommendations(&recovered, "Refund was charged twice");
        assert!(recs.iter().any(|r| r.contains("improved significantly")));
        assert!(recs.iter().any(|r| r.starts_with("Billing issue")));

        let quiet = analysis("2", &[Neutral]);
        assert_eq!(
            recommendations(&quiet, "thanks"),
            vec!["Continue monitoring ticket progress.".to_string()]
        );
    }
}
