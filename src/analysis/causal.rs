//! Population-level links between issue categories and sentiment outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::lexicon::{self, GENERAL_CATEGORY, ISSUE_CATEGORIES};
use super::trajectory::{TrajectoryAnalysis, TrajectoryType};

/// z value for a two-sided 95% interval.
const Z_95: f64 = 1.96;

/// Issue categories matched by the text; `["general"]` when none match
pub fn categorize_issue(text: &str) -> Vec<&'static str> {
    let categories = lexicon::matching_keys(ISSUE_CATEGORIES, text);
    if categories.is_empty() {
        vec![GENERAL_CATEGORY]
    } else {
        categories
    }
}

/// One ticket's outcome as seen by the causal analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketOutcome {
    pub ticket_id: String,
    /// Text used for categorisation (usually the description).
    pub text: String,
    pub trajectory_type: TrajectoryType,
    pub improvement_score: f64,
}

impl TicketOutcome {
    pub fn new(text: impl Into<String>, analysis: &TrajectoryAnalysis) -> Self {
        Self {
            ticket_id: analysis.ticket_id.clone(),
            text: text.into(),
            trajectory_type: analysis.trajectory_type,
            improvement_score: analysis.improvement_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalFactor {
    pub issue_category: String,
    /// Pearson r between category membership and improvement score.
    pub correlation_strength: f64,
    pub sample_size: usize,
    pub confidence_interval: (f64, f64),
    /// Trajectory types seen in the category, most frequent first.
    pub associated_trajectory_types: Vec<TrajectoryType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCorrelation {
    pub category: String,
    pub correlation: f64,
    pub sample_size: usize,
}

/// Pearson correlation; 0 when either series has zero variance
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return 0.0;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

/// 95% interval for r via the Fisher z transform over `n` observations
pub fn fisher_confidence_interval(r: f64, n: usize) -> (f64, f64) {
    if n <= 3 {
        return (-1.0, 1.0);
    }
    // keep atanh finite at |r| = 1
    let z = r.clamp(-0.999_999, 0.999_999).atanh();
    let margin = Z_95 / ((n - 3) as f64).sqrt();
    ((z - margin).tanh(), (z + margin).tanh())
}

fn membership(categories: &[Vec<&'static str>], name: &str) -> Vec<f64> {
    categories
        .iter()
        .map(|cats| if cats.contains(&name) { 1.0 } else { 0.0 })
        .collect()
}

fn ranked_trajectory_types<'a>(
    members: impl Iterator<Item = &'a TicketOutcome>,
) -> Vec<TrajectoryType> {
    let mut counts: BTreeMap<TrajectoryType, usize> = BTreeMap::new();
    for ticket in members {
        *counts.entry(ticket.trajectory_type).or_default() += 1;
    }
    let mut ranked: Vec<(TrajectoryType, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
    ranked.into_iter().map(|(t, _)| t).collect()
}

/// Causal factors for every category with at least `min_sample_size` tickets.
///
/// A ticket may belong to several categories. Correlations are computed
/// across the whole population. Results are ordered by |r| descending, then
/// by category name.
pub fn analyze_causal_factors(tickets: &[TicketOutcome], min_sample_size: usize) -> Vec<CausalFactor> {
    let categories: Vec<Vec<&'static str>> =
        tickets.iter().map(|t| categorize_issue(&t.text)).collect();
    let improvements: Vec<f64> = tickets.iter().map(|t| t.improvement_score).collect();

    let mut groups: BTreeMap<&'static str, usize> = BTreeMap::new();
    for cats in &categories {
        for cat in cats {
            *groups.entry(*cat).or_default() += 1;
        }
    }

    let mut factors: Vec<CausalFactor> = groups
        .into_iter()
        .filter(|(_, size)| *size >= min_sample_size)
        .map(|(name, size)| {
            let indicator = membership(&categories, name);
            let r = pearson(&indicator, &improvements);
            let members = tickets
                .iter()
                .zip(&categories)
                .filter(|(_, cats)| cats.contains(&name))
                .map(|(t, _)| t);

            CausalFactor {
                issue_category: name.to_string(),
                correlation_strength: r,
                sample_size: size,
                confidence_interval: fisher_confidence_interval(r, tickets.len()),
                associated_trajectory_types: ranked_trajectory_types(members),
            }
        })
        .collect();

    factors.sort_by(|a, b| {
        b.correlation_strength
            .abs()
            .total_cmp(&a.correlation_strength.abs())
            .then_with(|| a.issue_category.cmp(&b.issue_category))
    });
    factors
}

/// Correlation of every dictionary category with improvement, no threshold
pub fn category_correlations(tickets: &[TicketOutcome]) -> Vec<CategoryCorrelation> {
    let categories: Vec<Vec<&'static str>> =
        tickets.iter().map(|t| categorize_issue(&t.text)).collect();
    let improvements: Vec<f64> = tickets.iter().map(|t| t.improvement_score).collect();

    lexicon::category_names()
        .map(|name| {
            let indicator = membership(&categories, name);
            CategoryCorrelation {
                category: name.to_string(),
                correlation: pearson(&indicator, &improvements),
                sample_size: indicator.iter().filter(|v| **v > 0.0).count(),
            }
        })
        .collect()
}
