//! Optimization record domain model.
//!
//! An optimization record captures one proposed rewrite of an optimize region:
//! the text it replaces, the text it introduces, and where it is in its
//! review lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::IllegalTransition;

/// Review status of an optimization record.
///
/// ```text
/// proposed ──► accepted ──► rolled_back
///     │
///     └──────► rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    /// Saved and awaiting review
    #[default]
    Proposed,
    /// Written into the document
    Accepted,
    /// Discarded without touching the document
    Rejected,
    /// Applied, then reverted to the previous content
    RolledBack,
}

impl OptimizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::RolledBack => "rolled_back",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "proposed" => Some(Self::Proposed),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "rolled_back" => Some(Self::RolledBack),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        matches!(
            (self, new_status),
            (Self::Proposed, Self::Accepted)
                | (Self::Proposed, Self::Rejected)
                | (Self::Accepted, Self::RolledBack)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::RolledBack)
    }
}

impl std::fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A versioned rewrite of one optimize region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecord {
    pub id: Uuid,
    pub target_path: String,
    pub label: String,
    /// Scored sessions behind the proposal
    pub trajectory_count: usize,
    pub high_score_mean: f64,
    pub low_score_mean: f64,
    pub previous_content: String,
    pub new_content: String,
    pub diff: String,
    pub status: OptimizationStatus,
    pub created_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
    pub rolled_back_at: Option<DateTime<Utc>>,
}

impl OptimizationRecord {
    /// Create a draft record for a region's current content.
    pub fn new(target_path: impl Into<String>, label: impl Into<String>, previous_content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_path: target_path.into(),
            label: label.into(),
            trajectory_count: 0,
            high_score_mean: 0.0,
            low_score_mean: 0.0,
            previous_content: previous_content.into(),
            new_content: String::new(),
            diff: String::new(),
            status: OptimizationStatus::Proposed,
            created_at: Utc::now(),
            applied_at: None,
            rolled_back_at: None,
        }
    }

    /// Ensure the record can still be applied or rejected.
    pub fn require_proposed(&self) -> Result<(), IllegalTransition> {
        if self.status == OptimizationStatus::Proposed {
            Ok(())
        } else {
            Err(IllegalTransition::NotProposed { id: self.id, status: self.status })
        }
    }

    /// Ensure the record can be rolled back.
    pub fn require_accepted(&self) -> Result<(), IllegalTransition> {
        if self.status == OptimizationStatus::Accepted {
            Ok(())
        } else {
            Err(IllegalTransition::NotApplied { id: self.id, status: self.status })
        }
    }

    pub fn mark_accepted(&mut self) -> Result<(), IllegalTransition> {
        self.require_proposed()?;
        self.transition_to(OptimizationStatus::Accepted);
        self.applied_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_rejected(&mut self) -> Result<(), IllegalTransition> {
        self.require_proposed()?;
        self.transition_to(OptimizationStatus::Rejected);
        Ok(())
    }

    pub fn mark_rolled_back(&mut self) -> Result<(), IllegalTransition> {
        self.require_accepted()?;
        self.transition_to(OptimizationStatus::RolledBack);
        self.rolled_back_at = Some(Utc::now());
        Ok(())
    }

    fn transition_to(&mut self, new_status: OptimizationStatus) {
        debug_assert!(self.status.can_transition_to(new_status));
        self.status = new_status;
    }
}
