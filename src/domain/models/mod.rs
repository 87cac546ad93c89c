//! Domain models for the trajectory optimization engine.

pub mod analysis;
pub mod config;
pub mod optimization;
pub mod region;
pub mod strategy;
pub mod trajectory;

pub use analysis::{
    AnalysisResult, CohortKind, CuratedExample, Finding, HIGH_SCORE_THRESHOLD, LOW_SCORE_THRESHOLD,
};
pub use config::{Config, DatabaseConfig, LoggingConfig, OptimizerConfig};
pub use optimization::{OptimizationRecord, OptimizationStatus};
pub use region::{
    Region, RegionKind, RegionParams, DEFAULT_INCLUDE_NEGATIVE, DEFAULT_MAX_EXAMPLES, DEFAULT_MIN_SESSIONS,
};
pub use strategy::{
    SelectionMode, StrategiesAnalysis, Strategy, StrategySelection, StrategyStats, StrategyUsage,
    EXPLORATION_USAGE_THRESHOLD, MIN_USAGES_FOR_RECOMMENDATION,
};
pub use trajectory::{ActionKind, Outcome, Trajectory, TrajectoryStatus, TrajectoryStep};
