//! trajectory-memory - Trajectory Optimization Engine
//!
//! Records agent session trajectories, learns which behaviors separate
//! high-scoring sessions from low-scoring ones, and feeds that back into
//! marked regions of instruction documents.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors, and repository ports
//! - **Service Layer** (`services`): Marker parsing, trajectory analysis,
//!   the optimization lifecycle, curation, and strategy selection
//! - **Adapters** (`adapters`): SQLite implementations of the ports
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use trajectory_memory::adapters::sqlite::{initialize_database, SqliteTrajectoryRepository};
//! use trajectory_memory::services::TrajectoryAnalyzer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = initialize_database("sqlite:.trajectory-memory/trajectory-memory.db", None).await?;
//!     let analyzer = TrajectoryAnalyzer::new(Arc::new(SqliteTrajectoryRepository::new(pool)));
//!     let analysis = analyzer.analyze("debugging", 5).await?;
//!     println!("{} high-scoring sessions", analysis.high_score_sessions);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    AnalysisResult, Config, DatabaseConfig, LoggingConfig, OptimizationRecord, OptimizationStatus,
    OptimizerConfig, Region, RegionKind, SelectionMode, Strategy, StrategySelection, Trajectory,
};
pub use domain::ports::{OptimizationRepository, StrategyUsageRepository, TrajectoryRepository};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{OptimizationService, StrategySelector, TrajectoryAnalyzer, TrajectoryService};
