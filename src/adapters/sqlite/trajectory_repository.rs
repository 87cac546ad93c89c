//! SQLite implementation of the TrajectoryRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::adapters::sqlite::{parse_datetime, parse_json_or_default, parse_optional_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Outcome, Trajectory, TrajectoryStatus};
use crate::domain::ports::TrajectoryRepository;

const SELECT_TRAJECTORY: &str = r#"SELECT t.id, t.task_prompt, t.working_dir, t.steps, t.summary, t.score, t.score_notes,
       t.scored_at, t.strategy, t.started_at, t.completed_at, t.status,
       (SELECT json_group_array(tag) FROM
           (SELECT tag FROM trajectory_tags WHERE trajectory_id = t.id ORDER BY position)) AS tags
   FROM trajectories t"#;

#[derive(Clone)]
pub struct SqliteTrajectoryRepository {
    pool: SqlitePool,
}

impl SqliteTrajectoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrajectoryRepository for SqliteTrajectoryRepository {
    async fn save(&self, trajectory: &Trajectory) -> DomainResult<()> {
        let steps_json = serde_json::to_string(&trajectory.steps)?;
        let outcome = trajectory.outcome.as_ref();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO trajectories (id, task_prompt, working_dir, steps, summary, score, score_notes, scored_at,
                                        strategy, started_at, completed_at, status)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   task_prompt = excluded.task_prompt,
                   working_dir = excluded.working_dir,
                   steps = excluded.steps,
                   summary = excluded.summary,
                   score = COALESCE(excluded.score, trajectories.score),
                   score_notes = COALESCE(excluded.score_notes, trajectories.score_notes),
                   scored_at = COALESCE(excluded.scored_at, trajectories.scored_at),
                   strategy = excluded.strategy,
                   started_at = excluded.started_at,
                   completed_at = excluded.completed_at,
                   status = CASE WHEN excluded.score IS NULL AND trajectories.score IS NOT NULL
                                 THEN trajectories.status ELSE excluded.status END"#,
        )
        .bind(&trajectory.id)
        .bind(&trajectory.task_prompt)
        .bind(&trajectory.working_dir)
        .bind(&steps_json)
        .bind(&trajectory.summary)
        .bind(outcome.map(|o| o.score))
        .bind(outcome.map(|o| o.notes.clone()))
        .bind(outcome.map(|o| o.scored_at.to_rfc3339()))
        .bind(&trajectory.strategy)
        .bind(trajectory.started_at.to_rfc3339())
        .bind(trajectory.completed_at.map(|t| t.to_rfc3339()))
        .bind(trajectory.status.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM trajectory_tags WHERE trajectory_id = ?")
            .bind(&trajectory.id)
            .execute(&mut *tx)
            .await?;

        for (position, tag) in trajectory.tags.iter().enumerate() {
            sqlx::query("INSERT OR IGNORE INTO trajectory_tags (trajectory_id, tag, position) VALUES (?, ?, ?)")
                .bind(&trajectory.id)
                .bind(tag)
                .bind(i64::try_from(position).unwrap_or(i64::MAX))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> DomainResult<Option<Trajectory>> {
        let row: Option<TrajectoryRow> = sqlx::query_as(&format!("{SELECT_TRAJECTORY} WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_by_tag(&self, tag: &str) -> DomainResult<Vec<Trajectory>> {
        let rows: Vec<TrajectoryRow> = sqlx::query_as(&format!(
            "{SELECT_TRAJECTORY}
             WHERE t.id IN (SELECT trajectory_id FROM trajectory_tags WHERE tag = ?)
             ORDER BY t.started_at DESC, t.id DESC"
        ))
        .bind(tag)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<Trajectory>> {
        let rows: Vec<TrajectoryRow> =
            sqlx::query_as(&format!("{SELECT_TRAJECTORY} ORDER BY t.started_at DESC, t.id DESC LIMIT ?"))
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn set_outcome(&self, id: &str, outcome: &Outcome) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE trajectories
               SET score = ?, score_notes = ?, scored_at = ?, status = ?,
                   completed_at = COALESCE(completed_at, ?)
               WHERE id = ?"#,
        )
        .bind(outcome.score)
        .bind(&outcome.notes)
        .bind(outcome.scored_at.to_rfc3339())
        .bind(TrajectoryStatus::Scored.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TrajectoryNotFound(id.to_string()));
        }

        Ok(())
    }

    async fn set_strategy(&self, id: &str, strategy_name: &str) -> DomainResult<()> {
        let result = sqlx::query("UPDATE trajectories SET strategy = ? WHERE id = ?")
            .bind(strategy_name)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TrajectoryNotFound(id.to_string()));
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM trajectories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TrajectoryNotFound(id.to_string()));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct TrajectoryRow {
    id: String,
    task_prompt: String,
    working_dir: String,
    steps: String,
    summary: Option<String>,
    score: Option<f64>,
    score_notes: Option<String>,
    scored_at: Option<String>,
    strategy: Option<String>,
    started_at: String,
    completed_at: Option<String>,
    status: String,
    tags: Option<String>,
}

impl TryFrom<TrajectoryRow> for Trajectory {
    type Error = DomainError;

    fn try_from(row: TrajectoryRow) -> Result<Self, Self::Error> {
        let status = TrajectoryStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid trajectory status: {}", row.status)))?;

        let outcome = match (row.score, parse_optional_datetime(row.scored_at)?) {
            (Some(score), Some(scored_at)) => Some(Outcome {
                score,
                notes: row.score_notes.unwrap_or_default(),
                scored_at,
            }),
            _ => None,
        };

        Ok(Trajectory {
            id: row.id,
            task_prompt: row.task_prompt,
            working_dir: row.working_dir,
            steps: serde_json::from_str(&row.steps)?,
            summary: row.summary,
            outcome,
            tags: parse_json_or_default(row.tags)?,
            strategy: row.strategy,
            started_at: parse_datetime(&row.started_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
            status,
        })
    }
}
