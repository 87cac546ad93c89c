//! SQLite implementation of the OptimizationRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{OptimizationRecord, OptimizationStatus};
use crate::domain::ports::{OptimizationFilter, OptimizationRepository};

const SELECT_RECORD: &str = r#"SELECT id, target_path, label, trajectory_count, high_score_mean, low_score_mean,
       previous_content, new_content, diff, status, created_at, applied_at, rolled_back_at
   FROM optimization_records"#;

#[derive(Clone)]
pub struct SqliteOptimizationRepository {
    pool: SqlitePool,
}

impl SqliteOptimizationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OptimizationRepository for SqliteOptimizationRepository {
    async fn create(&self, record: &OptimizationRecord) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO optimization_records (id, target_path, label, trajectory_count, high_score_mean,
                   low_score_mean, previous_content, new_content, diff, status, created_at, applied_at, rolled_back_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(&record.target_path)
        .bind(&record.label)
        .bind(i64::try_from(record.trajectory_count).unwrap_or(i64::MAX))
        .bind(record.high_score_mean)
        .bind(record.low_score_mean)
        .bind(&record.previous_content)
        .bind(&record.new_content)
        .bind(&record.diff)
        .bind(record.status.as_str())
        .bind(record.created_at.to_rfc3339())
        .bind(record.applied_at.map(|t| t.to_rfc3339()))
        .bind(record.rolled_back_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<OptimizationRecord>> {
        let row: Option<OptimizationRow> = sqlx::query_as(&format!("{SELECT_RECORD} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, record: &OptimizationRecord) -> DomainResult<()> {
        // previous_content, new_content and identity never change after creation
        let result = sqlx::query(
            "UPDATE optimization_records SET status = ?, applied_at = ?, rolled_back_at = ? WHERE id = ?",
        )
        .bind(record.status.as_str())
        .bind(record.applied_at.map(|t| t.to_rfc3339()))
        .bind(record.rolled_back_at.map(|t| t.to_rfc3339()))
        .bind(record.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::RecordNotFound(record.id));
        }

        Ok(())
    }

    async fn list(&self, filter: OptimizationFilter) -> DomainResult<Vec<OptimizationRecord>> {
        let mut query = format!("{SELECT_RECORD} WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(path) = &filter.target_path {
            query.push_str(" AND target_path = ?");
            bindings.push(path.clone());
        }

        if let Some(label) = &filter.label {
            query.push_str(" AND label = ?");
            bindings.push(label.clone());
        }

        if let Some(status) = &filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }

        query.push_str(" ORDER BY created_at DESC, rowid DESC");

        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, OptimizationRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<OptimizationRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct OptimizationRow {
    id: String,
    target_path: String,
    label: String,
    trajectory_count: i64,
    high_score_mean: f64,
    low_score_mean: f64,
    previous_content: String,
    new_content: String,
    diff: String,
    status: String,
    created_at: String,
    applied_at: Option<String>,
    rolled_back_at: Option<String>,
}

impl TryFrom<OptimizationRow> for OptimizationRecord {
    type Error = DomainError;

    fn try_from(row: OptimizationRow) -> Result<Self, Self::Error> {
        let status = OptimizationStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid optimization status: {}", row.status)))?;

        Ok(OptimizationRecord {
            id: parse_uuid(&row.id)?,
            target_path: row.target_path,
            label: row.label,
            trajectory_count: usize::try_from(row.trajectory_count).unwrap_or_default(),
            high_score_mean: row.high_score_mean,
            low_score_mean: row.low_score_mean,
            previous_content: row.previous_content,
            new_content: row.new_content,
            diff: row.diff,
            status,
            created_at: parse_datetime(&row.created_at)?,
            applied_at: parse_optional_datetime(row.applied_at)?,
            rolled_back_at: parse_optional_datetime(row.rolled_back_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup_repo() -> SqliteOptimizationRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteOptimizationRepository::new(pool)
    }

    fn record(path: &str, label: &str) -> OptimizationRecord {
        let mut record = OptimizationRecord::new(path, label, "old line\n");
        record.new_content = "new line\n".to_string();
        record.diff = "--- current\n+++ proposed\n".to_string();
        record.trajectory_count = 12;
        record
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup_repo().await;
        let record = record("CLAUDE.md", "writing");
        repo.create(&record).await.unwrap();

        let loaded = repo.get(record.id).await.unwrap().expect("record should exist");
        assert_eq!(loaded, OptimizationRecord { created_at: loaded.created_at, ..record });
        assert_eq!(loaded.previous_content, "old line\n");
        assert_eq!(loaded.trajectory_count, 12);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let repo = setup_repo().await;
        let record = record("CLAUDE.md", "writing");
        repo.create(&record).await.unwrap();
        assert!(repo.create(&record).await.is_err());
    }

    #[tokio::test]
    async fn test_update_persists_status_only() {
        let repo = setup_repo().await;
        let mut record = record("CLAUDE.md", "writing");
        repo.create(&record).await.unwrap();

        record.mark_accepted().unwrap();
        record.new_content = "tampered\n".to_string();
        repo.update(&record).await.unwrap();

        let loaded = repo.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OptimizationStatus::Accepted);
        assert!(loaded.applied_at.is_some());
        assert_eq!(loaded.new_content, "new line\n", "content is immutable after creation");
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let repo = setup_repo().await;
        let record = record("CLAUDE.md", "writing");
        let err = repo.update(&record).await.unwrap_err();
        assert!(matches!(err, DomainError::RecordNotFound(id) if id == record.id));
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_most_recent_first() {
        let repo = setup_repo().await;
        let first = record("CLAUDE.md", "writing");
        let second = record("CLAUDE.md", "review");
        let third = record("OTHER.md", "writing");
        for r in [&first, &second, &third] {
            repo.create(r).await.unwrap();
        }

        let all = repo.list(OptimizationFilter::default()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let writing = repo
            .list(OptimizationFilter { label: Some("writing".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(writing.len(), 2);

        let scoped = repo
            .list(OptimizationFilter {
                target_path: Some("CLAUDE.md".to_string()),
                label: Some("writing".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, first.id);

        let limited = repo.list(OptimizationFilter { limit: Some(1), ..Default::default() }).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, third.id);
    }
}
