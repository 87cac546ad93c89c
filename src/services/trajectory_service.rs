//! Trajectory bookkeeping: scoring, import/export and corpus statistics.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Outcome, Trajectory, TrajectoryStatus};
use crate::domain::ports::{StrategyUsageRepository, TrajectoryRepository};

/// Number of equal-width buckets in the score histogram.
pub const HISTOGRAM_BUCKETS: usize = 5;

/// Overview of the recorded corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStats {
    pub total: usize,
    pub scored: usize,
    pub mean_score: Option<f64>,
    /// Scored sessions per fifth of the score range; 1.0 falls in the last bucket
    pub histogram: [usize; HISTOGRAM_BUCKETS],
    /// Sessions per tag, alphabetically
    pub tags: BTreeMap<String, usize>,
}

pub struct TrajectoryService<T, U>
where
    T: TrajectoryRepository,
    U: StrategyUsageRepository,
{
    trajectories: Arc<T>,
    usages: Arc<U>,
}

impl<T, U> TrajectoryService<T, U>
where
    T: TrajectoryRepository,
    U: StrategyUsageRepository,
{
    pub fn new(trajectories: Arc<T>, usages: Arc<U>) -> Self {
        Self { trajectories, usages }
    }

    pub async fn get(&self, id: &str) -> DomainResult<Trajectory> {
        self.trajectories
            .get(id)
            .await?
            .ok_or_else(|| DomainError::TrajectoryNotFound(id.to_string()))
    }

    /// Newest first, optionally restricted to one tag.
    pub async fn list(&self, tag: Option<&str>, limit: usize) -> DomainResult<Vec<Trajectory>> {
        let mut trajectories = match tag {
            Some(tag) => self.trajectories.list_by_tag(tag).await?,
            None => self.trajectories.list_recent(limit).await?,
        };
        trajectories.truncate(limit);
        Ok(trajectories)
    }

    /// Attach an outcome and back-fill the score of any linked strategy usage.
    ///
    /// Re-scoring replaces the previous outcome.
    #[instrument(skip(self, notes))]
    pub async fn score(&self, id: &str, score: f64, notes: &str) -> DomainResult<Trajectory> {
        validate_score(score)?;
        let mut trajectory = self.get(id).await?;

        let outcome = Outcome { score, notes: notes.to_string(), scored_at: Utc::now() };
        self.trajectories.set_outcome(id, &outcome).await?;
        trajectory.outcome = Some(outcome);
        trajectory.status = TrajectoryStatus::Scored;

        let updated = self.usages.update_score_by_trajectory(id, score).await?;
        info!(usages_updated = updated, "trajectory scored");
        Ok(trajectory)
    }

    /// Load trajectories from JSON lines, one trajectory per line.
    ///
    /// The whole input is validated before anything is written. A line
    /// without an outcome keeps the stored outcome of an existing
    /// trajectory; a line with one re-scores it like `score` does.
    #[instrument(skip(self, input))]
    pub async fn import(&self, input: &str) -> DomainResult<usize> {
        let mut parsed = Vec::new();
        for (index, line) in input.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let trajectory: Trajectory = serde_json::from_str(line).map_err(|e| {
                DomainError::ValidationFailed(format!("line {}: invalid trajectory: {e}", index + 1))
            })?;
            if trajectory.id.trim().is_empty() {
                return Err(DomainError::ValidationFailed(format!("line {}: trajectory id is empty", index + 1)));
            }
            if let Some(outcome) = &trajectory.outcome {
                validate_score(outcome.score)
                    .map_err(|e| DomainError::ValidationFailed(format!("line {}: {e}", index + 1)))?;
            }
            parsed.push(trajectory);
        }

        for trajectory in &parsed {
            self.trajectories.save(trajectory).await?;
            if let Some(outcome) = &trajectory.outcome {
                self.usages.update_score_by_trajectory(&trajectory.id, outcome.score).await?;
            }
            debug!(id = %trajectory.id, steps = trajectory.steps.len(), "trajectory imported");
        }
        info!(count = parsed.len(), "trajectories imported");
        Ok(parsed.len())
    }

    /// Serialize trajectories as JSON lines, newest first.
    pub async fn export(&self, tag: Option<&str>) -> DomainResult<String> {
        let trajectories = self.list(tag, usize::MAX).await?;
        let mut out = String::new();
        for trajectory in &trajectories {
            out.push_str(&serde_json::to_string(trajectory)?);
            out.push('\n');
        }
        Ok(out)
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub async fn stats(&self) -> DomainResult<TrajectoryStats> {
        let trajectories = self.trajectories.list_recent(usize::MAX).await?;

        let mut histogram = [0usize; HISTOGRAM_BUCKETS];
        let mut tags: BTreeMap<String, usize> = BTreeMap::new();
        let mut scores = Vec::new();

        for trajectory in &trajectories {
            for tag in &trajectory.tags {
                *tags.entry(tag.clone()).or_default() += 1;
            }
            if let Some(score) = trajectory.score_value() {
                let bucket = ((score * HISTOGRAM_BUCKETS as f64) as usize).min(HISTOGRAM_BUCKETS - 1);
                histogram[bucket] += 1;
                scores.push(score);
            }
        }

        let mean_score = (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);

        Ok(TrajectoryStats {
            total: trajectories.len(),
            scored: scores.len(),
            mean_score,
            histogram,
            tags,
        })
    }
}

fn validate_score(score: f64) -> DomainResult<()> {
    if (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(DomainError::ValidationFailed(format!("score must be between 0.0 and 1.0, got {score}")))
    }
}
