//! Strategy usage repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{StrategyStats, StrategyUsage};

/// Repository interface for strategy usage records.
#[async_trait]
pub trait StrategyUsageRepository: Send + Sync {
    /// Insert or overwrite the usage for `(label, trajectory_id)`.
    async fn upsert(&self, usage: &StrategyUsage) -> DomainResult<()>;

    /// Get the usage recorded for a trajectory under a label.
    async fn get(&self, label: &str, trajectory_id: &str) -> DomainResult<Option<StrategyUsage>>;

    /// All usages recorded under a label, oldest first.
    async fn list_by_label(&self, label: &str) -> DomainResult<Vec<StrategyUsage>>;

    /// Per-strategy aggregates for a label.
    async fn stats(&self, label: &str) -> DomainResult<Vec<StrategyStats>>;

    /// Back-fill the score on every usage of a trajectory.
    ///
    /// Returns the number of usages updated.
    async fn update_score_by_trajectory(&self, trajectory_id: &str, score: f64) -> DomainResult<u64>;
}
