//! Trajectory CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::sqlite::{SqliteStrategyUsageRepository, SqliteTrajectoryRepository};
use crate::cli::open_database;
use crate::cli::output::{list_table, output, percent, render_list, truncate, CommandOutput};
use crate::domain::models::{Config, Trajectory};
use crate::services::trajectory_service::{TrajectoryService, TrajectoryStats, HISTOGRAM_BUCKETS};

#[derive(Args, Debug)]
pub struct TrajectoryArgs {
    #[command(subcommand)]
    pub command: TrajectoryCommands,
}

#[derive(Subcommand, Debug)]
pub enum TrajectoryCommands {
    /// Import trajectories from a JSON lines file ("-" for stdin)
    Import {
        /// Input file
        path: PathBuf,
    },
    /// Export trajectories as JSON lines
    Export {
        /// Only export trajectories with this tag
        #[arg(short, long)]
        tag: Option<String>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List recent trajectories
    List {
        /// Filter by tag
        #[arg(short, long)]
        tag: Option<String>,
        /// Maximum number of trajectories
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show a trajectory with its steps
    Show {
        /// Trajectory ID
        id: String,
    },
    /// Score a trajectory between 0.0 and 1.0
    Score {
        /// Trajectory ID
        id: String,
        /// Score in [0.0, 1.0]
        score: f64,
        /// Notes on the outcome
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Summarize the recorded corpus
    Stats,
}

#[derive(Debug, serde::Serialize)]
pub struct TrajectoryRow {
    pub id: String,
    pub task_prompt: String,
    pub tags: Vec<String>,
    pub steps: usize,
    pub score: Option<f64>,
    pub status: String,
    pub started_at: String,
}

impl From<&Trajectory> for TrajectoryRow {
    fn from(t: &Trajectory) -> Self {
        Self {
            id: t.id.clone(),
            task_prompt: t.task_prompt.clone(),
            tags: t.tags.clone(),
            steps: t.steps.len(),
            score: t.score_value(),
            status: t.status.as_str().to_string(),
            started_at: t.started_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TrajectoryListOutput {
    pub trajectories: Vec<TrajectoryRow>,
    pub total: usize,
}

impl CommandOutput for TrajectoryListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "task", "tags", "steps", "score", "status"]);
        for t in &self.trajectories {
            table.add_row(vec![
                truncate(&t.id, 12),
                truncate(&t.task_prompt, 40),
                t.tags.join(","),
                t.steps.to_string(),
                t.score.map_or_else(|| "-".to_string(), percent),
                t.status.clone(),
            ]);
        }
        render_list("trajectory", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TrajectoryDetailOutput {
    pub trajectory: Trajectory,
}

impl CommandOutput for TrajectoryDetailOutput {
    fn to_human(&self) -> String {
        let t = &self.trajectory;
        let mut lines = vec![
            format!("Trajectory: {}", t.id),
            format!("Task:       {}", t.task_prompt),
            format!("Tags:       {}", t.tags.join(", ")),
            format!("Status:     {}", t.status.as_str()),
        ];
        if let Some(strategy) = &t.strategy {
            lines.push(format!("Strategy:   {strategy}"));
        }
        if let Some(outcome) = &t.outcome {
            lines.push(format!("Score:      {}", percent(outcome.score)));
            if !outcome.notes.is_empty() {
                lines.push(format!("Notes:      {}", outcome.notes));
            }
        }
        if let Some(summary) = t.summary_text() {
            lines.push(format!("Summary:    {summary}"));
        }
        lines.push(String::new());
        lines.push(format!("Steps ({}):", t.steps.len()));
        for (i, step) in t.steps.iter().enumerate() {
            lines.push(format!("  {:>3}. {:<12} {}", i + 1, step.tool_name, truncate(&step.input_summary, 60)));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct MessageOutput {
    pub success: bool,
    pub message: String,
}

impl CommandOutput for MessageOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StatsOutput {
    #[serde(flatten)]
    pub stats: TrajectoryStats,
}

impl CommandOutput for StatsOutput {
    #[allow(clippy::cast_precision_loss)]
    fn to_human(&self) -> String {
        let stats = &self.stats;
        let mut lines = vec![
            format!("Trajectories: {} ({} scored)", stats.total, stats.scored),
            format!("Mean score:   {}", stats.mean_score.map_or_else(|| "-".to_string(), percent)),
        ];

        if stats.scored > 0 {
            lines.push(String::new());
            lines.push("Score distribution:".to_string());
            let width = 1.0 / HISTOGRAM_BUCKETS as f64;
            for (i, count) in stats.histogram.iter().enumerate() {
                let low = i as f64 * width;
                lines.push(format!("  {:.1}-{:.1} {:>4} {}", low, low + width, count, "#".repeat(*count)));
            }
        }

        if !stats.tags.is_empty() {
            lines.push(String::new());
            lines.push("Tags:".to_string());
            lines.extend(stats.tags.iter().map(|(tag, count)| format!("  {tag:<20} {count}")));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: TrajectoryArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let service = TrajectoryService::new(
        Arc::new(SqliteTrajectoryRepository::new(pool.clone())),
        Arc::new(SqliteStrategyUsageRepository::new(pool)),
    );

    match args.command {
        TrajectoryCommands::Import { path } => {
            let input = if path == PathBuf::from("-") {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
                buf
            } else {
                tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?
            };
            let count = service.import(&input).await?;
            let out = MessageOutput { success: true, message: format!("Imported {count} trajectories") };
            output(&out, json_mode);
        }

        TrajectoryCommands::Export { tag, output: target } => {
            let lines = service.export(tag.as_deref()).await?;
            match target {
                Some(path) => {
                    tokio::fs::write(&path, &lines)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    let out = MessageOutput {
                        success: true,
                        message: format!("Exported {} trajectories to {}", lines.lines().count(), path.display()),
                    };
                    output(&out, json_mode);
                }
                None => print!("{lines}"),
            }
        }

        TrajectoryCommands::List { tag, limit } => {
            let trajectories = service.list(tag.as_deref(), limit).await?;
            let out = TrajectoryListOutput {
                total: trajectories.len(),
                trajectories: trajectories.iter().map(TrajectoryRow::from).collect(),
            };
            output(&out, json_mode);
        }

        TrajectoryCommands::Show { id } => {
            let trajectory = service.get(&id).await?;
            output(&TrajectoryDetailOutput { trajectory }, json_mode);
        }

        TrajectoryCommands::Score { id, score, notes } => {
            let trajectory = service.score(&id, score, &notes).await?;
            let out = MessageOutput {
                success: true,
                message: format!("Scored {} at {}", trajectory.id, percent(score)),
            };
            output(&out, json_mode);
        }

        TrajectoryCommands::Stats => {
            let stats = service.stats().await?;
            output(&StatsOutput { stats }, json_mode);
        }
    }

    Ok(())
}
