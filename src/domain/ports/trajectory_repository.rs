//! Trajectory repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Outcome, Trajectory};

/// Repository interface for recorded trajectories.
///
/// Recording owns writes to the step sequence; the optimization engine reads
/// trajectories by tag and attaches outcomes.
#[async_trait]
pub trait TrajectoryRepository: Send + Sync {
    /// Insert a trajectory, replacing any existing one with the same id.
    ///
    /// A trajectory without an outcome keeps the stored outcome and status
    /// of the one it replaces.
    async fn save(&self, trajectory: &Trajectory) -> DomainResult<()>;

    /// Get a trajectory by id.
    async fn get(&self, id: &str) -> DomainResult<Option<Trajectory>>;

    /// All trajectories carrying `tag`, newest first.
    async fn list_by_tag(&self, tag: &str) -> DomainResult<Vec<Trajectory>>;

    /// Most recent trajectories, newest first.
    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<Trajectory>>;

    /// Attach or replace the outcome of a trajectory.
    async fn set_outcome(&self, id: &str, outcome: &Outcome) -> DomainResult<()>;

    /// Record the strategy a trajectory followed.
    async fn set_strategy(&self, id: &str, strategy_name: &str) -> DomainResult<()>;

    /// Delete a trajectory by id.
    async fn delete(&self, id: &str) -> DomainResult<()>;
}
