//! Ports (interfaces) for the trajectory optimization engine.

pub mod optimization_repository;
pub mod strategy_usage_repository;
pub mod trajectory_repository;

pub use optimization_repository::{OptimizationFilter, OptimizationRepository};
pub use strategy_usage_repository::StrategyUsageRepository;
pub use trajectory_repository::TrajectoryRepository;
