mod common;

use trajectory_memory::domain::errors::DomainError;
use trajectory_memory::domain::models::Trajectory;
use trajectory_memory::domain::ports::TrajectoryRepository;
use trajectory_memory::services::{analyze_trajectories, TrajectoryAnalyzer};

use common::{scored, seed_scores, setup_store};

const SCORES: [f64; 7] = [0.95, 0.85, 0.80, 0.65, 0.55, 0.40, 0.30];

#[tokio::test]
async fn test_cohort_split() {
    let store = setup_store().await;
    seed_scores(&store.trajectories, "briefing", &SCORES).await;
    let analyzer = TrajectoryAnalyzer::new(store.trajectories.clone());

    let analysis = analyzer.analyze("briefing", 5).await.unwrap();

    assert_eq!(analysis.total_sessions, 7);
    assert_eq!(analysis.high_score_sessions, 3);
    assert_eq!(analysis.medium_score_sessions, 2);
    assert_eq!(analysis.low_score_sessions, 2);
    assert!((analysis.high_score_mean - (0.95 + 0.85 + 0.80) / 3.0).abs() < 1e-9);
    assert!((analysis.low_score_mean - 0.35).abs() < 1e-9);
}

#[tokio::test]
async fn test_thorough_high_cohort_yields_patterns_and_anti_patterns() {
    let store = setup_store().await;
    seed_scores(&store.trajectories, "briefing", &SCORES).await;
    let analyzer = TrajectoryAnalyzer::new(store.trajectories.clone());

    let analysis = analyzer.analyze("briefing", 5).await.unwrap();

    let heuristics: Vec<_> = analysis.patterns.iter().map(|f| f.heuristic.as_str()).collect();
    assert!(heuristics.contains(&"research"), "got {heuristics:?}");
    assert!(!analysis.anti_patterns.is_empty());
    assert!(analysis
        .recommendations
        .contains(&"Read all available context before starting work".to_string()));

    // Recommendations never repeat.
    let unique: std::collections::HashSet<_> = analysis.recommendations.iter().collect();
    assert_eq!(unique.len(), analysis.recommendations.len());
}

#[tokio::test]
async fn test_insufficient_data() {
    let store = setup_store().await;
    seed_scores(&store.trajectories, "briefing", &[0.9, 0.1]).await;
    let analyzer = TrajectoryAnalyzer::new(store.trajectories.clone());

    let err = analyzer.analyze("briefing", 5).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientData { have: 2, need: 5, .. }));

    let err = analyzer.analyze("unknown", 1).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientData { have: 0, need: 1, .. }));
}

#[tokio::test]
async fn test_unscored_sessions_are_ignored() {
    let store = setup_store().await;
    seed_scores(&store.trajectories, "briefing", &[0.9, 0.8]).await;
    store
        .trajectories
        .save(&Trajectory::new("pending", "still running").with_tag("briefing"))
        .await
        .unwrap();

    let analyzer = TrajectoryAnalyzer::new(store.trajectories.clone());
    let analysis = analyzer.analyze("briefing", 2).await.unwrap();
    assert_eq!(analysis.total_sessions, 2);
}

#[test]
fn test_curation_prefers_diverse_prompts() {
    let trajectories = vec![
        scored("a", "summarize the market news for monday", "briefing", 0.95),
        scored("b", "summarize the market news for monday morning", "briefing", 0.94),
        scored("c", "draft release notes covering database migration", "briefing", 0.90),
        scored("d", "write onboarding checklist for engineers", "briefing", 0.85),
        scored("e", "quick note", "briefing", 0.2),
    ];

    let analysis = analyze_trajectories("briefing", &trajectories, 3, 3).unwrap();
    let positives: Vec<_> = analysis.positive_examples().map(|e| e.trajectory_id.as_str()).collect();

    // "b" repeats "a" almost word for word, so a lower scorer takes its place.
    assert_eq!(positives, vec!["a", "c", "d"]);
    assert_eq!(analysis.negative_example().map(|e| e.trajectory_id.as_str()), Some("e"));
}

#[test]
fn test_curation_backfills_when_too_few_are_diverse() {
    let trajectories = vec![
        scored("a", "summarize market news monday", "briefing", 0.95),
        scored("b", "summarize market news monday", "briefing", 0.90),
        scored("c", "summarize market news monday", "briefing", 0.85),
    ];

    let analysis = analyze_trajectories("briefing", &trajectories, 1, 2).unwrap();
    let positives: Vec<_> = analysis.positive_examples().map(|e| e.trajectory_id.as_str()).collect();
    assert_eq!(positives, vec!["a", "b"]);
    assert!(analysis.negative_example().is_none());
}
