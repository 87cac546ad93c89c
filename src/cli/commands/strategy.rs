//! Strategy CLI commands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::sqlite::{SqliteStrategyUsageRepository, SqliteTrajectoryRepository};
use crate::cli::open_database;
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::{Config, SelectionMode, StrategiesAnalysis, Strategy, StrategySelection, StrategyUsage};
use crate::services::strategy_selector::StrategySelector;

#[derive(Args, Debug)]
pub struct StrategyArgs {
    #[command(subcommand)]
    pub command: StrategyCommands,
}

#[derive(Subcommand, Debug)]
pub enum StrategyCommands {
    /// List the strategies declared for a label
    List {
        /// Task label
        label: String,
        /// Document holding the strategies region
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Choose a strategy for the next task
    Select {
        /// Task label
        label: String,
        /// Selection policy (explicit, recommend, rotate)
        #[arg(short, long, default_value = "recommend")]
        mode: String,
        /// Strategy name, required for explicit mode
        #[arg(short, long)]
        name: Option<String>,
        /// Document holding the strategies region
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Record that a trajectory followed a strategy
    Record {
        /// Task label
        label: String,
        /// Strategy name
        strategy: String,
        /// Trajectory ID
        trajectory_id: String,
    },
    /// Compare recorded strategy performance
    Analyze {
        /// Task label
        label: String,
    },
}

fn stats_line(strategy: &Strategy) -> String {
    match strategy.mean_score {
        Some(mean) => format!("{} sessions, avg score {mean:.2}", strategy.usage_count),
        None => format!("{} sessions, no scores yet", strategy.usage_count),
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StrategyListOutput {
    pub label: String,
    pub strategies: Vec<Strategy>,
}

impl CommandOutput for StrategyListOutput {
    fn to_human(&self) -> String {
        if self.strategies.is_empty() {
            return format!("No strategies declared for \"{}\".", self.label);
        }
        let mut lines = vec![format!("Strategies for \"{}\"", self.label)];
        for strategy in &self.strategies {
            lines.push(String::new());
            lines.push(format!("{} ({})", console::style(&strategy.name).bold(), stats_line(strategy)));
            if let Some(description) = &strategy.description {
                lines.push(format!("  {description}"));
            }
            lines.extend(strategy.approach.lines().map(|l| format!("    {l}")));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SelectionOutput {
    #[serde(flatten)]
    pub selection: StrategySelection,
}

impl CommandOutput for SelectionOutput {
    fn to_human(&self) -> String {
        let strategy = &self.selection.strategy;
        let mut lines = vec![
            format!("Selected strategy: {}", console::style(&strategy.name).bold()),
            format!("Reason: {}", self.selection.reason),
        ];
        if let Some(description) = &strategy.description {
            lines.push(format!("Description: {description}"));
        }
        lines.push(String::new());
        lines.push("Approach:".to_string());
        lines.extend(strategy.approach.lines().map(|l| format!("  {l}")));
        lines.push(String::new());
        lines.push(format!(
            "Record it with: trajectory-memory strategy record {} {} <TRAJECTORY_ID>",
            self.selection.label, strategy.name
        ));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RecordUsageOutput {
    pub success: bool,
    pub usage: StrategyUsage,
}

impl CommandOutput for RecordUsageOutput {
    fn to_human(&self) -> String {
        format!(
            "Recorded strategy '{}' for trajectory {} (label: {})",
            self.usage.strategy_name, self.usage.trajectory_id, self.usage.label
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StrategyAnalysisOutput {
    #[serde(flatten)]
    pub analysis: StrategiesAnalysis,
}

impl CommandOutput for StrategyAnalysisOutput {
    fn to_human(&self) -> String {
        let analysis = &self.analysis;
        if analysis.strategies.is_empty() {
            return format!("No strategy usage recorded for \"{}\" yet.", analysis.label);
        }

        let mut table = list_table(&["strategy", "sessions", "scored", "avg score"]);
        for strategy in &analysis.strategies {
            table.add_row(vec![
                strategy.name.clone(),
                strategy.usage_count.to_string(),
                strategy.scored_count.to_string(),
                strategy.mean_score.map_or_else(|| "N/A".to_string(), |m| format!("{m:.2}")),
            ]);
        }

        let mut lines = vec![render_list("strategy", &table, analysis.strategies.len()), String::new()];
        lines.push(match &analysis.best_strategy {
            Some(best) => format!("Best performer: {best}"),
            None => "Best performer: not enough data yet (need at least 2 sessions per strategy)".to_string(),
        });
        if let Some(next) = &analysis.recommended_next {
            let why = if analysis.rotation_suggested { "to gather more comparison data" } else { "best performer" };
            lines.push(format!("Suggested next: {next} ({why})"));
        }
        lines.push(format!("Total sessions analyzed: {}", analysis.total_usages));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: StrategyArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let selector = StrategySelector::new(
        Arc::new(SqliteStrategyUsageRepository::new(pool.clone())),
        Arc::new(SqliteTrajectoryRepository::new(pool)),
    );
    let document = |file: Option<PathBuf>| file.unwrap_or_else(|| PathBuf::from(&config.optimizer.default_document));

    match args.command {
        StrategyCommands::List { label, file } => {
            let strategies = selector.list(&document(file), &label).await?;
            output(&StrategyListOutput { label, strategies }, json_mode);
        }

        StrategyCommands::Select { label, mode, name, file } => {
            let mode = SelectionMode::from_str(&mode)
                .ok_or_else(|| anyhow!("Invalid mode: {mode} (use explicit, recommend, or rotate)"))?;
            let selection = selector.select(&document(file), &label, mode, name.as_deref()).await?;
            output(&SelectionOutput { selection }, json_mode);
        }

        StrategyCommands::Record { label, strategy, trajectory_id } => {
            let usage = selector.record_usage(&label, &strategy, &trajectory_id).await?;
            output(&RecordUsageOutput { success: true, usage }, json_mode);
        }

        StrategyCommands::Analyze { label } => {
            let analysis = selector.analyze(&label).await?;
            output(&StrategyAnalysisOutput { analysis }, json_mode);
        }
    }

    Ok(())
}
