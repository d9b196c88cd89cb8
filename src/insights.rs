//! Population-level insights over stored tickets.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::{
    analyze_causal_factors, category_correlations, recommendations, render_report,
    CategoryCorrelation,
    CausalFactor, TicketOutcome, TrajectoryAnalysis, TrajectoryAnalyzer, TrajectoryStats,
};
use crate::error::AppResult;
use crate::storage::{Storage, TicketHistory};

/// Everything derived from one pass over stored ticket histories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationInsights {
    /// Tickets loaded, including those without fragments.
    pub total_tickets: usize,
    pub trajectories: Vec<TrajectoryAnalysis>,
    pub stats: TrajectoryStats,
    pub causal_factors: Vec<CausalFactor>,
    pub correlations: Vec<CategoryCorrelation>,
    /// Follow-up suggestions keyed by ticket id; tickets without any are omitted.
    pub recommendations: BTreeMap<String, Vec<String>>,
    pub report: String,
}

/// Runs trajectory and causal analysis over what storage holds
pub struct InsightsService {
    storage: Arc<dyn Storage>,
    min_sample_size: usize,
}

impl InsightsService {
    pub fn new(storage: Arc<dyn Storage>, min_sample_size: usize) -> Self {
        Self {
            storage,
            min_sample_size,
        }
    }

    /// Analyze the `limit` most recently updated tickets
    pub async fn analyze(&self, limit: usize) -> AppResult<PopulationInsights> {
        let histories = self.storage.list_ticket_histories(limit).await?;
        let total_tickets = histories.len();

        let mut trajectories = Vec::with_capacity(histories.len());
        let mut outcomes = Vec::with_capacity(histories.len());
        let mut suggestions = BTreeMap::new();
        for history in &histories {
            if history.fragments.is_empty() {
                debug!(ticket_id = %history.ticket.ticket_id, "No fragments; skipping trajectory");
                continue;
            }
            let analysis = TrajectoryAnalyzer::analyze_trajectory(
                &history.ticket.ticket_id,
                &history.texts(),
                &history.predictions(),
            )?;
            let text = outcome_text(history);
            let recs = recommendations(&analysis, &text);
            if !recs.is_empty() {
                suggestions.insert(history.ticket.ticket_id.clone(), recs);
            }
            outcomes.push(TicketOutcome::new(text, &analysis));
            trajectories.push(analysis);
        }

        let causal_factors = analyze_causal_factors(&outcomes, self.min_sample_size);
        let correlations = category_correlations(&outcomes);
        let report = render_report(total_tickets, &trajectories, &causal_factors);
        let stats = TrajectoryStats::from_analyses(&trajectories);

        info!(
            total_tickets,
            trajectories = trajectories.len(),
            causal_factors = causal_factors.len(),
            min_sample_size = self.min_sample_size,
            "Population analysis complete"
        );

        Ok(PopulationInsights {
            total_tickets,
            trajectories,
            stats,
            causal_factors,
            correlations,
            recommendations: suggestions,
            report,
        })
    }
}

/// Text used to categorise a ticket's issue
fn outcome_text(history: &TicketHistory) -> String {
    format!("{} {}", history.ticket.summary, history.ticket.description)
        .trim()
        .to_string()
}
