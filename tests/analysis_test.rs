//! Integration tests for aggregation, trajectory and causal analysis

use std::sync::Arc;

use pretty_assertions::assert_eq;

use ticket_sentiment::analysis::{
    analyze_causal_factors, AggregationStrategy, SentimentAggregator, SentimentTrend,
    TicketOutcome, TrajectoryAnalyzer, TrajectoryType, UltimateSentiment,
};
use ticket_sentiment::classifier::{SentimentLabel, SentimentResult};
use ticket_sentiment::insights::InsightsService;
use ticket_sentiment::mapping::{ColumnMapper, Table};
use ticket_sentiment::storage::{
    SentimentFragment, SqliteStorage, Storage, TicketAggregate, TicketBatchEntry, TicketRecord,
};

use SentimentLabel::{Negative, Neutral, Positive};

fn predictions(items: &[(SentimentLabel, f64)]) -> Vec<SentimentResult> {
    items
        .iter()
        .map(|(label, confidence)| SentimentResult::new(*label, *confidence))
        .collect()
}

fn outcome(id: &str, text: &str, improvement: f64) -> TicketOutcome {
    TicketOutcome {
        ticket_id: id.to_string(),
        text: text.to_string(),
        trajectory_type: TrajectoryType::NeutralStable,
        improvement_score: improvement,
    }
}

#[cfg(test)]
mod aggregation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_weighted_recent_favours_late_negatives() {
        let fragments = predictions(&[
            (Positive, 0.9),
            (Positive, 0.8),
            (Negative, 0.95),
            (Negative, 0.9),
            (Negative, 0.85),
        ]);

        let result =
            SentimentAggregator::calculate_ultimate(&fragments, AggregationStrategy::WeightedRecent);

        assert_eq!(result.label, Negative);
        assert_eq!(result.confidence, 0.88);
        assert_eq!(result.trend, SentimentTrend::Declining);
    }

    #[test]
    fn test_single_fragment_is_its_own_ultimate() {
        let fragments = predictions(&[(Positive, 0.77)]);

        for strategy in [
            AggregationStrategy::Latest,
            AggregationStrategy::WeightedRecent,
            AggregationStrategy::Trajectory,
        ] {
            let result = SentimentAggregator::calculate_ultimate(&fragments, strategy);
            assert_eq!(result.label, Positive);
            assert_eq!(result.confidence, 0.77);
            assert_eq!(result.trend, SentimentTrend::Stable);
        }
    }

    #[test]
    fn test_no_fragments_is_neutral_default() {
        let fragments: Vec<SentimentResult> = Vec::new();
        let result = SentimentAggregator::calculate_ultimate(&fragments, AggregationStrategy::Latest);
        assert_eq!(result, UltimateSentiment::empty());
    }
}

#[cfg(test)]
mod trajectory_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_negative_to_positive_is_improving() {
        let texts = [
            "This is completely broken and I am really angry",
            "Still not working",
            "Any update on this?",
            "That seems to help",
            "Absolutely perfect, thank you so much!",
        ];
        let preds = predictions(&[
            (Negative, 0.95),
            (Negative, 0.8),
            (Neutral, 0.7),
            (Positive, 0.8),
            (Positive, 0.95),
        ]);

        let analysis = TrajectoryAnalyzer::analyze_trajectory("T-7", &texts[..], &preds).unwrap();

        assert_eq!(analysis.trajectory_type, TrajectoryType::Improving);
        assert!(analysis.improvement_score > 0.0);
        assert!(analysis.volatility_score <= 0.7);
        assert_eq!(analysis.sentiment_history.len(), 5);
        assert_eq!(analysis.initial_sentiment.label, Negative);
        assert_eq!(analysis.final_sentiment.label, Positive);

        // the negative→neutral step has confidence 0.7, which is not above the bar
        assert_eq!(analysis.turning_points.len(), 1);
        assert_eq!(analysis.turning_points[0].index, 3);
    }

    #[test]
    fn test_single_fragment_trajectory() {
        let analysis = TrajectoryAnalyzer::analyze_trajectory(
            "T-8",
            &["Thanks, that fixed it"][..],
            &predictions(&[(Positive, 0.9)]),
        )
        .unwrap();

        assert_eq!(analysis.trajectory_type, TrajectoryType::ConsistentlyPositive);
        assert_eq!(analysis.volatility_score, 0.0);
        assert_eq!(analysis.improvement_score, 0.0);
        assert!(analysis.turning_points.is_empty());
        assert_eq!(analysis.initial_sentiment, analysis.final_sentiment);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let result = TrajectoryAnalyzer::analyze_trajectory(
            "T-9",
            &["one", "two"][..],
            &predictions(&[(Neutral, 0.5)]),
        );
        assert!(result.is_err());
    }
}

#[cfg(test)]
mod causal_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_small_categories_excluded() {
        let tickets = vec![
            outcome("T-1", "Duplicate charge on invoice", 0.8),
            outcome("T-2", "Refund still pending", 0.6),
            outcome("T-3", "Payment declined twice", 0.9),
            outcome("T-4", "Report of a vulnerability", -0.4),
            outcome("T-5", "Report of a vulnerability", -0.5),
        ];

        let factors = analyze_causal_factors(&tickets, 3);
        let names: Vec<&str> = factors.iter().map(|f| f.issue_category.as_str()).collect();
        assert_eq!(names, vec!["billing"]);
        assert_eq!(factors[0].sample_size, 3);
        assert!(factors[0].correlation_strength > 0.0);

        let (low, high) = factors[0].confidence_interval;
        assert!(low <= factors[0].correlation_strength);
        assert!(high >= factors[0].correlation_strength);

        let factors = analyze_causal_factors(&tickets, 2);
        assert_eq!(factors.len(), 2);
    }

    #[test]
    fn test_no_tickets_no_factors() {
        assert!(analyze_causal_factors(&[], 1).is_empty());
    }
}

#[cfg(test)]
mod mapping_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_apply_mapping_keeps_id_and_never_invents_columns() {
        let table = Table::from_rows(
            columns(&["Issue key", "Summary", "Priority", "Comment", "Comment.1"]),
            vec![vec![
                "PROJ-1",
                "Checkout page crashes",
                "High",
                "Still broken after update",
                "Works now, thank you",
            ]],
        );

        let mapper = ColumnMapper::new();
        let mapping = mapper.create_mapping_from_table(&table, "export.csv");
        let projected = ColumnMapper::apply_mapping(&table, &mapping);

        assert_eq!(mapping.id_column.as_deref(), Some("Issue key"));
        assert_eq!(projected.columns()[0], "Issue key");
        assert!(projected
            .columns()
            .iter()
            .all(|c| table.has_column(c)));
        assert!(!projected.has_column("Parent"));
        assert_eq!(projected.len(), table.len());
    }

    #[test]
    fn test_mapping_is_cached_per_source() {
        let mapper = ColumnMapper::new();
        let first = mapper.create_mapping(&columns(&["ID", "Summary"]), "a.csv");
        let second = mapper.create_mapping(&columns(&["Other", "Fields"]), "a.csv");
        assert_eq!(first, second);

        assert!(mapper.evict("a.csv"));
        assert!(mapper.get_mapping("a.csv").is_none());
    }
}

#[cfg(test)]
mod insights_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ticket(id: &str, summary: &str, fragments: Vec<SentimentFragment>) -> TicketBatchEntry {
        let comment_count = fragments.iter().filter(|f| f.comment_number.is_some()).count() as i64;
        TicketBatchEntry {
            ticket: TicketRecord {
                ticket_id: id.to_string(),
                summary: summary.to_string(),
                description: String::new(),
                issue_type: None,
                parent_ticket_id: None,
            },
            fragments,
            entities: Vec::new(),
            aggregate: TicketAggregate::from_ultimate(id, &UltimateSentiment::empty(), comment_count),
        }
    }

    #[tokio::test]
    async fn test_population_insights_over_storage() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        storage
            .write_batch(&[
                ticket(
                    "T-1",
                    "Refund not received",
                    vec![
                        SentimentFragment::summary(
                            "T-1",
                            "Refund not received",
                            SentimentResult::new(Negative, 0.9),
                        ),
                        SentimentFragment::comment(
                            "T-1",
                            1,
                            "Any news on this?",
                            SentimentResult::new(Neutral, 0.6),
                        ),
                        SentimentFragment::comment(
                            "T-1",
                            2,
                            "Got it, thanks",
                            SentimentResult::new(Positive, 0.9),
                        ),
                    ],
                ),
                ticket(
                    "T-2",
                    "Duplicate charge",
                    vec![SentimentFragment::summary(
                        "T-2",
                        "Duplicate charge",
                        SentimentResult::new(Negative, 0.8),
                    )],
                ),
                ticket(
                    "T-3",
                    "Export fails",
                    vec![SentimentFragment::summary(
                        "T-3",
                        "Export fails",
                        SentimentResult::new(Neutral, 0.6),
                    )],
                ),
            ])
            .await
            .unwrap();

        let service = InsightsService::new(Arc::new(storage), 2);
        let insights = service.analyze(10).await.unwrap();

        assert_eq!(insights.total_tickets, 3);
        assert_eq!(insights.trajectories.len(), 3);
        assert_eq!(insights.stats.total_tickets, 3);
        assert_eq!(insights.stats.count(TrajectoryType::Improving), 1);

        let names: Vec<&str> = insights
            .causal_factors
            .iter()
            .map(|f| f.issue_category.as_str())
            .collect();
        assert_eq!(names, vec!["billing"]);
        assert!(insights.causal_factors[0].correlation_strength > 0.0);
        assert!(insights.recommendations["T-1"]
            .iter()
            .any(|r| r.contains("improved")));
        assert!(!insights.report.is_empty());
    }

    #[tokio::test]
    async fn test_empty_storage_yields_empty_insights() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let service = InsightsService::new(Arc::new(storage), 5);
        let insights = service.analyze(10).await.unwrap();

        assert_eq!(insights.total_tickets, 0);
        assert!(insights.trajectories.is_empty());
        assert!(insights.causal_factors.is_empty());
    }
}
