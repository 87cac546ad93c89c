//! Command-line front-end.

pub mod commands;
pub mod id_resolver;
pub mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;

use crate::adapters::sqlite::{initialize_database, PoolConfig};
use crate::domain::errors::DomainError;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

use commands::curate::CurateArgs;
use commands::init::InitArgs;
use commands::optimize::OptimizeArgs;
use commands::strategy::StrategyArgs;
use commands::trajectory::TrajectoryArgs;

/// Exit status for failures other than missing data.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status when a label does not have enough scored sessions yet.
pub const EXIT_INSUFFICIENT_DATA: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "trajectory-memory")]
#[command(about = "Learn from scored agent sessions and rewrite marked regions of instruction documents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .trajectory-memory/
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration and database in a project
    Init(InitArgs),
    /// Propose, review, apply and roll back region rewrites
    Optimize(OptimizeArgs),
    /// Curate example sessions into examples regions
    Curate(CurateArgs),
    /// Select and track strategies for a task label
    Strategy(StrategyArgs),
    /// Import, inspect and score recorded trajectories
    Trajectory(TrajectoryArgs),
}

/// Load configuration from an explicit file or the project directory.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Open the configured database, applying pending migrations.
pub async fn open_database(config: &Config) -> Result<SqlitePool> {
    initialize_database(&config.database.url(), Some(PoolConfig::from(&config.database)))
        .await
        .context("Failed to initialize database. Run 'trajectory-memory init' first.")
}

/// Exit status for a failed command.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DomainError>() {
        Some(DomainError::InsufficientData { .. }) => EXIT_INSUFFICIENT_DATA,
        _ => EXIT_FAILURE,
    }
}

/// Report a failed command and exit.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let code = exit_code(&err);
    if json_mode {
        let body = serde_json::json!({
            "error": format!("{err:#}"),
            "insufficient_data": code == EXIT_INSUFFICIENT_DATA,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }
    std::process::exit(code)
}
