//! SQLite implementation of the StrategyUsageRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::parse_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{StrategyStats, StrategyUsage};
use crate::domain::ports::StrategyUsageRepository;

#[derive(Clone)]
pub struct SqliteStrategyUsageRepository {
    pool: SqlitePool,
}

impl SqliteStrategyUsageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StrategyUsageRepository for SqliteStrategyUsageRepository {
    async fn upsert(&self, usage: &StrategyUsage) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO strategy_usages (label, strategy_name, trajectory_id, score, created_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(label, trajectory_id) DO UPDATE SET
                   strategy_name = excluded.strategy_name,
                   score = excluded.score,
                   created_at = excluded.created_at"#,
        )
        .bind(&usage.label)
        .bind(&usage.strategy_name)
        .bind(&usage.trajectory_id)
        .bind(usage.score)
        .bind(usage.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, label: &str, trajectory_id: &str) -> DomainResult<Option<StrategyUsage>> {
        let row: Option<UsageRow> = sqlx::query_as(
            "SELECT label, strategy_name, trajectory_id, score, created_at FROM strategy_usages
             WHERE label = ? AND trajectory_id = ?",
        )
        .bind(label)
        .bind(trajectory_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_by_label(&self, label: &str) -> DomainResult<Vec<StrategyUsage>> {
        let rows: Vec<UsageRow> = sqlx::query_as(
            "SELECT label, strategy_name, trajectory_id, score, created_at FROM strategy_usages
             WHERE label = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(label)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn stats(&self, label: &str) -> DomainResult<Vec<StrategyStats>> {
        let rows: Vec<(String, i64, i64, Option<f64>)> = sqlx::query_as(
            "SELECT strategy_name, COUNT(*), COUNT(score), AVG(score) FROM strategy_usages
             WHERE label = ? GROUP BY strategy_name ORDER BY strategy_name",
        )
        .bind(label)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(strategy_name, usage_count, scored_count, mean_score)| StrategyStats {
                strategy_name,
                usage_count: usize::try_from(usage_count).unwrap_or_default(),
                scored_count: usize::try_from(scored_count).unwrap_or_default(),
                mean_score,
            })
            .collect())
    }

    async fn update_score_by_trajectory(&self, trajectory_id: &str, score: f64) -> DomainResult<u64> {
        let result = sqlx::query("UPDATE strategy_usages SET score = ? WHERE trajectory_id = ?")
            .bind(score)
            .bind(trajectory_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct UsageRow {
    label: String,
    strategy_name: String,
    trajectory_id: String,
    score: Option<f64>,
    created_at: String,
}

impl TryFrom<UsageRow> for StrategyUsage {
    type Error = DomainError;

    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        Ok(StrategyUsage {
            label: row.label,
            strategy_name: row.strategy_name,
            trajectory_id: row.trajectory_id,
            score: row.score,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
