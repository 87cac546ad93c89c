mod common;

use trajectory_memory::domain::errors::DomainError;
use trajectory_memory::domain::models::TrajectoryStatus;
use trajectory_memory::services::{CurationService, TrajectoryService};

use common::{seed_scores, setup_store, write_document};

const EXPORTED: &str = r#"{"id":"run-1","task_prompt":"Summarize overnight news","tags":["briefing"],"steps":[{"timestamp":"2024-05-01T08:00:00Z","tool_name":"Read","input_summary":"feeds/world.md"},{"timestamp":"2024-05-01T08:02:00Z","tool_name":"Write","input_summary":"briefing.md"}],"summary":"Covered four regions","started_at":"2024-05-01T08:00:00Z"}
{"id":"run-2","task_prompt":"Summarize market moves","tags":["briefing","markets"],"outcome":{"score":0.8,"notes":"solid","scored_at":"2024-05-02T09:00:00Z"},"started_at":"2024-05-02T08:00:00Z"}
"#;

#[tokio::test]
async fn test_import_score_and_export() {
    let store = setup_store().await;
    let service = TrajectoryService::new(store.trajectories.clone(), store.usages.clone());

    assert_eq!(service.import(EXPORTED).await.unwrap(), 2);

    let first = service.get("run-1").await.unwrap();
    assert_eq!(first.steps.len(), 2);
    assert!(first.outcome.is_none());

    let scored = service.score("run-1", 0.9, "thorough").await.unwrap();
    assert_eq!(scored.status, TrajectoryStatus::Scored);
    assert_eq!(service.get("run-1").await.unwrap().score_value(), Some(0.9));

    let markets = service.export(Some("markets")).await.unwrap();
    assert_eq!(markets.lines().count(), 1);
    assert!(markets.contains("\"id\":\"run-2\""));

    // A full export can be imported into a fresh store.
    let everything = service.export(None).await.unwrap();
    let other = setup_store().await;
    let copy = TrajectoryService::new(other.trajectories.clone(), other.usages.clone());
    assert_eq!(copy.import(&everything).await.unwrap(), 2);
    assert_eq!(copy.get("run-1").await.unwrap().score_value(), Some(0.9));
}

#[tokio::test]
async fn test_import_is_all_or_nothing() {
    let store = setup_store().await;
    let service = TrajectoryService::new(store.trajectories.clone(), store.usages.clone());

    let input = format!("{EXPORTED}{{\"id\":\"broken\"\n");
    let err = service.import(&input).await.unwrap_err();
    assert!(matches!(&err, DomainError::ValidationFailed(msg) if msg.starts_with("line 3:")));
    assert!(service.list(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_score_validation() {
    let store = setup_store().await;
    let service = TrajectoryService::new(store.trajectories.clone(), store.usages.clone());
    service.import(EXPORTED).await.unwrap();

    for bad in [-0.1, 1.5, f64::NAN] {
        let err = service.score("run-1", bad, "").await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)), "score {bad} accepted");
    }
    let err = service.score("missing", 0.5, "").await.unwrap_err();
    assert!(matches!(err, DomainError::TrajectoryNotFound(id) if id == "missing"));
}

#[tokio::test]
async fn test_stats_histogram() {
    let store = setup_store().await;
    seed_scores(&store.trajectories, "briefing", &[0.95, 0.85, 0.65, 0.30, 0.0]).await;
    let service = TrajectoryService::new(store.trajectories.clone(), store.usages.clone());

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.total, 5);
    assert_eq!(stats.scored, 5);
    assert_eq!(stats.histogram, [1, 1, 0, 1, 2]);
    assert_eq!(stats.tags.get("briefing"), Some(&5));
}

#[tokio::test]
async fn test_curated_examples_written_to_document() {
    let store = setup_store().await;
    seed_scores(&store.trajectories, "briefing", &[0.95, 0.85, 0.80, 0.30]).await;
    let (_dir, path) = write_document(
        "# Guide\n<!-- trajectory-examples:briefing max=2 -->\nold examples\n<!-- /trajectory-examples:briefing -->\n",
    );

    let curation = CurationService::new(store.trajectories.clone());
    let set = curation.curate("briefing", 2, true).await.unwrap();
    assert_eq!(set.examples.len(), 3);
    curation.apply(&path, "briefing", &set.content).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("old examples"));
    assert!(text.contains("### What Works Well (from past sessions)"));
    assert!(text.contains("### What to Avoid"));
    assert!(text.starts_with("# Guide\n<!-- trajectory-examples:briefing max=2 -->\n"));
    assert!(text.ends_with("<!-- /trajectory-examples:briefing -->\n"));
}
