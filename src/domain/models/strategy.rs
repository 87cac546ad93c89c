//! Strategy domain model.
//!
//! Strategies are named approaches declared in a document's strategies
//! region. They are parsed on demand and hydrated with usage statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum recorded usages before a strategy's mean score is trusted.
pub const MIN_USAGES_FOR_RECOMMENDATION: usize = 2;
/// Below this many usages a strategy is still considered under-explored.
pub const EXPLORATION_USAGE_THRESHOLD: usize = 3;

/// A named approach for a recurring task label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Prompt text describing how to carry out the approach
    #[serde(default)]
    pub approach: String,
    #[serde(default)]
    pub usage_count: usize,
    #[serde(default)]
    pub scored_count: usize,
    /// Mean of scored usages, `None` until at least one is scored
    #[serde(default)]
    pub mean_score: Option<f64>,
}

impl Strategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            approach: String::new(),
            usage_count: 0,
            scored_count: 0,
            mean_score: None,
        }
    }

    pub fn hydrate(&mut self, stats: &StrategyStats) {
        self.usage_count = stats.usage_count;
        self.scored_count = stats.scored_count;
        self.mean_score = stats.mean_score;
    }
}

/// Links one trajectory to the strategy it followed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyUsage {
    pub label: String,
    pub strategy_name: String,
    pub trajectory_id: String,
    /// Back-filled once the trajectory is scored
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl StrategyUsage {
    pub fn new(label: impl Into<String>, strategy_name: impl Into<String>, trajectory_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            strategy_name: strategy_name.into(),
            trajectory_id: trajectory_id.into(),
            score: None,
            created_at: Utc::now(),
        }
    }
}

/// Aggregated usage statistics for one strategy under one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub strategy_name: String,
    pub usage_count: usize,
    pub scored_count: usize,
    pub mean_score: Option<f64>,
}

/// Policy used to pick a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// The caller names the strategy
    Explicit,
    /// Exploit the best-scoring strategy with enough data
    Recommend,
    /// Explore the least-used strategy
    Rotate,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Recommend => "recommend",
            Self::Rotate => "rotate",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "explicit" => Some(Self::Explicit),
            "recommend" => Some(Self::Recommend),
            "rotate" => Some(Self::Rotate),
            _ => None,
        }
    }
}

/// The strategy chosen for a task, with the reason it was chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySelection {
    pub label: String,
    pub mode: SelectionMode,
    pub strategy: Strategy,
    pub reason: String,
}

/// Performance overview of every strategy declared for a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategiesAnalysis {
    pub label: String,
    pub strategies: Vec<Strategy>,
    pub total_usages: usize,
    /// Highest mean among strategies with enough usages
    pub best_strategy: Option<String>,
    pub least_used: Option<String>,
    /// True while some strategy is still under-explored
    pub rotation_suggested: bool,
    pub recommended_next: Option<String>,
}
