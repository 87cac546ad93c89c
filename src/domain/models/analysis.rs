//! Results produced by the trajectory analyzer.

use serde::{Deserialize, Serialize};

/// Sessions scoring at or above this are in the high cohort.
pub const HIGH_SCORE_THRESHOLD: f64 = 0.75;
/// Sessions scoring below this are in the low cohort.
pub const LOW_SCORE_THRESHOLD: f64 = 0.5;

/// Performance bucket of a scored trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortKind {
    High,
    Medium,
    Low,
}

impl CohortKind {
    pub fn for_score(score: f64) -> Self {
        if score >= HIGH_SCORE_THRESHOLD {
            Self::High
        } else if score < LOW_SCORE_THRESHOLD {
            Self::Low
        } else {
            Self::Medium
        }
    }
}

/// A behavioral statement backed by the number that justified it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Name of the heuristic that produced the statement
    pub heuristic: String,
    pub statement: String,
    /// The cohort measure the statement was derived from
    pub statistic: f64,
}

/// A past session chosen to illustrate good or poor practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedExample {
    pub trajectory_id: String,
    pub task_prompt: String,
    pub summary: String,
    pub score: f64,
    pub notes: String,
    pub step_count: usize,
    /// Whether the example shows what to do (true) or what to avoid (false)
    pub positive: bool,
    pub reason: String,
}

/// Outcome of analyzing every scored session that carries one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub label: String,
    pub total_sessions: usize,
    pub high_score_sessions: usize,
    pub medium_score_sessions: usize,
    pub low_score_sessions: usize,
    pub high_score_mean: f64,
    pub low_score_mean: f64,
    pub patterns: Vec<Finding>,
    pub anti_patterns: Vec<Finding>,
    pub recommendations: Vec<String>,
    /// Positive examples first, then at most one negative example
    pub examples: Vec<CuratedExample>,
}

impl AnalysisResult {
    pub fn positive_examples(&self) -> impl Iterator<Item = &CuratedExample> {
        self.examples.iter().filter(|e| e.positive)
    }

    pub fn negative_example(&self) -> Option<&CuratedExample> {
        self.examples.iter().find(|e| !e.positive)
    }
}
