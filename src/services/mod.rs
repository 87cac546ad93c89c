//! Service layer for the trajectory optimization engine.

pub mod curation;
pub mod diff;
pub mod document;
pub mod heuristics;
pub mod marker_parser;
pub mod optimization_service;
pub mod strategy_selector;
pub mod trajectory_analyzer;
pub mod trajectory_service;

pub use curation::{CuratedSet, CurationService, CURATION_MIN_SAMPLES};
pub use diff::generate_diff;
pub use heuristics::{registry, Cohort, Heuristic};
pub use optimization_service::{OptimizationService, Proposal, ProposalOutcome, SaveRequest};
pub use strategy_selector::{parse_strategies, StrategySelector};
pub use trajectory_analyzer::{analyze_trajectories, TrajectoryAnalyzer, SIMILARITY_THRESHOLD};
pub use trajectory_service::{TrajectoryService, TrajectoryStats};
