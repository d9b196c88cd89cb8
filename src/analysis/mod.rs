//! Pure sentiment analysis over classified fragments.
//!
//! - [`aggregator`]: one ultimate sentiment per ticket
//! - [`trajectory`]: per-ticket trajectory shape
//! - [`causal`]: issue category ↔ outcome correlations across tickets
//! - [`report`]: plain-text population report

pub mod aggregator;
pub mod causal;
pub mod lexicon;
pub mod report;
pub mod trajectory;

pub use aggregator::{
    AggregationStrategy, Scored, SentimentAggregator, SentimentTrend, UltimateSentiment,
    RECENT_WINDOW,
};
pub use causal::{
    analyze_causal_factors, categorize_issue, category_correlations, CategoryCorrelation,
    CausalFactor, TicketOutcome,
};
pub use report::{recommendations, render_report, TrajectoryStats};
pub use trajectory::{
    FragmentScore, TrajectoryAnalysis, TrajectoryAnalyzer, TrajectoryType, TurningPoint,
};
