//! Optimization record repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{OptimizationRecord, OptimizationStatus};

/// Filter criteria for listing optimization records.
#[derive(Debug, Clone, Default)]
pub struct OptimizationFilter {
    pub target_path: Option<String>,
    pub label: Option<String>,
    pub status: Option<OptimizationStatus>,
    pub limit: Option<usize>,
}

/// Repository interface for optimization record persistence.
#[async_trait]
pub trait OptimizationRepository: Send + Sync {
    /// Create a new record. Fails if the id already exists.
    async fn create(&self, record: &OptimizationRecord) -> DomainResult<()>;

    /// Get a record by id.
    async fn get(&self, id: Uuid) -> DomainResult<Option<OptimizationRecord>>;

    /// Persist the mutable part of a record (status and timestamps).
    async fn update(&self, record: &OptimizationRecord) -> DomainResult<()>;

    /// List records, most recent first.
    async fn list(&self, filter: OptimizationFilter) -> DomainResult<Vec<OptimizationRecord>>;
}
