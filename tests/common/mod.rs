//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::SqlitePool;
use tempfile::TempDir;
use trajectory_memory::adapters::sqlite::{
    create_migrated_test_pool, SqliteOptimizationRepository, SqliteStrategyUsageRepository,
    SqliteTrajectoryRepository,
};
use trajectory_memory::domain::models::{Trajectory, TrajectoryStep};
use trajectory_memory::domain::ports::TrajectoryRepository;

/// Repositories sharing one migrated in-memory database.
pub struct TestStore {
    pub pool: SqlitePool,
    pub trajectories: Arc<SqliteTrajectoryRepository>,
    pub records: Arc<SqliteOptimizationRepository>,
    pub usages: Arc<SqliteStrategyUsageRepository>,
}

pub async fn setup_store() -> TestStore {
    let pool = create_migrated_test_pool().await.expect("Failed to create test pool");
    TestStore {
        trajectories: Arc::new(SqliteTrajectoryRepository::new(pool.clone())),
        records: Arc::new(SqliteOptimizationRepository::new(pool.clone())),
        usages: Arc::new(SqliteStrategyUsageRepository::new(pool.clone())),
        pool,
    }
}

/// A session that reads, writes, checks and re-reads its output.
pub fn thorough_steps() -> Vec<TrajectoryStep> {
    [
        ("Read", "docs/brief.md"),
        ("Grep", "deadline"),
        ("Read", "notes/sources.md"),
        ("Write", "draft.md"),
        ("Bash", "wc -w draft.md"),
        ("Edit", "draft.md"),
        ("Read", "draft.md"),
    ]
    .into_iter()
    .map(|(tool, input)| TrajectoryStep::new(tool, input))
    .collect()
}

/// A session that writes once and stops.
pub fn rushed_steps() -> Vec<TrajectoryStep> {
    vec![TrajectoryStep::new("Write", "draft.md")]
}

/// Build a scored trajectory; high scores get thorough steps, others rushed ones.
pub fn scored(id: &str, prompt: &str, label: &str, score: f64) -> Trajectory {
    let steps = if score >= 0.75 { thorough_steps() } else { rushed_steps() };
    let mut trajectory = Trajectory::new(id, prompt)
        .with_tag(label)
        .with_summary(format!("Session {id} on {prompt}"))
        .with_steps(steps);
    trajectory.score(score, "");
    trajectory
}

/// Save one scored trajectory per score, with distinct prompts.
pub async fn seed_scores(repo: &SqliteTrajectoryRepository, label: &str, scores: &[f64]) {
    for (i, score) in scores.iter().enumerate() {
        let t = scored(&format!("{label}-{i}"), &format!("topic{i} subject{i} item{i}"), label, *score);
        repo.save(&t).await.expect("Failed to save trajectory");
    }
}

/// Write `text` to a fresh instruction document.
pub fn write_document(text: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("CLAUDE.md");
    std::fs::write(&path, text).expect("Failed to write document");
    (dir, path)
}

/// Setup test logging
///
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
