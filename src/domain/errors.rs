//! Domain errors for the trajectory optimization engine.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::OptimizationStatus;

/// Domain-level errors that can occur in the trajectory optimization engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Malformed markers at line {line}: {reason}")]
    MalformedMarkers { line: usize, reason: String },

    #[error("Region start marker at line {line} has no tag")]
    MissingLabel { line: usize },

    #[error(
        "Region '{label}' in {} no longer matches lines {expected_start}-{expected_end}; re-read the document",
        path.display()
    )]
    StaleRegion {
        path: PathBuf,
        label: String,
        expected_start: usize,
        expected_end: usize,
    },

    #[error("Insufficient data: have {have} scored sessions for tag '{label}', need at least {need}")]
    InsufficientData { label: String, have: usize, need: usize },

    #[error("Optimization record not found: {0}")]
    RecordNotFound(Uuid),

    #[error("{0}")]
    IllegalTransition(#[from] IllegalTransition),

    #[error("No region tagged '{label}' found in {}", path.display())]
    TargetNotFound { path: PathBuf, label: String },

    #[error("Strategy '{name}' not found for tag '{label}'")]
    StrategyNotFound { label: String, name: String },

    #[error("Trajectory not found: {0}")]
    TrajectoryNotFound(String),

    #[error("Document I/O failed for {}: {source}", path.display())]
    DocumentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{path} was rewritten but storing optimization {id} failed ({update}); \
         restoring the previous body also failed ({restore})"
    )]
    DocumentDiverged { path: String, id: Uuid, update: String, restore: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// A lifecycle operation requested on a record in the wrong status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IllegalTransition {
    #[error("Optimization {id} is {status}, only proposed records can be applied or rejected")]
    NotProposed { id: Uuid, status: OptimizationStatus },

    #[error("Optimization {id} is {status}, only accepted records can be rolled back")]
    NotApplied { id: Uuid, status: OptimizationStatus },
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub(crate) fn document_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DocumentIo { path: path.into(), source }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
