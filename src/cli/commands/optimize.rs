//! Optimization CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::sqlite::{SqliteOptimizationRepository, SqliteTrajectoryRepository};
use crate::cli::id_resolver::resolve_optimization_id;
use crate::cli::output::{list_table, output, percent, render_list, truncate, CommandOutput};
use crate::cli::open_database;
use crate::domain::models::{AnalysisResult, Config, OptimizationRecord, RegionKind};
use crate::services::marker_parser;
use crate::services::optimization_service::{OptimizationService, ProposalOutcome};
use crate::services::trajectory_analyzer::TrajectoryAnalyzer;

#[derive(Args, Debug)]
pub struct OptimizeArgs {
    #[command(subcommand)]
    pub command: OptimizeCommands,
}

#[derive(Subcommand, Debug)]
pub enum OptimizeCommands {
    /// Analyze the scored sessions of a label
    Analyze {
        /// Task label
        label: String,
        /// Minimum scored sessions required
        #[arg(short, long, default_value = "1")]
        min_sessions: usize,
    },
    /// Draft rewrite proposals for the optimize regions of a document
    Propose {
        /// Only propose the region with this label
        #[arg(short, long)]
        label: Option<String>,
        /// Document to read (defaults to the configured document)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Save a reviewed rewrite as a proposed optimization
    Save {
        /// Optimization ID (from `propose`)
        id: Uuid,
        /// Region label
        #[arg(short, long)]
        label: String,
        /// Document holding the region
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// New region content
        #[arg(short, long, conflicts_with = "content_file")]
        content: Option<String>,
        /// Read new region content from a file ("-" for stdin)
        #[arg(long, value_name = "PATH")]
        content_file: Option<PathBuf>,
    },
    /// Write a proposed optimization into its document
    Apply {
        /// Optimization ID or unique prefix
        id: String,
    },
    /// Discard a proposed optimization
    Reject {
        /// Optimization ID or unique prefix
        id: String,
    },
    /// Restore the content an applied optimization replaced
    Rollback {
        /// Optimization ID or unique prefix
        id: String,
    },
    /// List optimizations, most recent first
    History {
        /// Filter by label
        #[arg(short, long)]
        label: Option<String>,
        /// Filter by document
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Maximum number of records (defaults to the configured history limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Print the diff of an optimization
    Diff {
        /// Optimization ID or unique prefix
        id: String,
    },
    /// Show an optimization in full
    Show {
        /// Optimization ID or unique prefix
        id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct AnalysisOutput {
    pub analysis: AnalysisResult,
    pub target: Option<String>,
    pub current_content: Option<String>,
}

impl CommandOutput for AnalysisOutput {
    fn to_human(&self) -> String {
        format_analysis(&self.analysis, self.target.as_deref(), self.current_content.as_deref())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Human-readable analysis summary, optionally with the region it targets.
pub fn format_analysis(analysis: &AnalysisResult, target: Option<&str>, current: Option<&str>) -> String {
    let mut lines = vec![match target {
        Some(target) => format!("Optimization Analysis for \"{0}\" ({0}) in {target}", analysis.label),
        None => format!("Optimization Analysis for \"{}\"", analysis.label),
    }];
    lines.push(String::new());
    lines.push(format!(
        "Sessions analyzed: {} scored ({} high, {} medium, {} low)",
        analysis.total_sessions,
        analysis.high_score_sessions,
        analysis.medium_score_sessions,
        analysis.low_score_sessions
    ));
    lines.push(format!("High-scoring average: {:.2}", analysis.high_score_mean));
    lines.push(format!("Low-scoring average: {:.2}", analysis.low_score_mean));

    if !analysis.patterns.is_empty() {
        lines.push(String::new());
        lines.push("Patterns in high-scoring sessions:".to_string());
        lines.extend(analysis.patterns.iter().map(|p| format!("  ✓ {}", p.statement)));
    }
    if !analysis.anti_patterns.is_empty() {
        lines.push(String::new());
        lines.push("Anti-patterns in low-scoring sessions:".to_string());
        lines.extend(analysis.anti_patterns.iter().map(|p| format!("  ✗ {}", p.statement)));
    }
    if !analysis.recommendations.is_empty() {
        lines.push(String::new());
        lines.push("Recommended practices:".to_string());
        lines.extend(analysis.recommendations.iter().map(|r| format!("  - {r}")));
    }
    if let Some(current) = current {
        lines.push(String::new());
        lines.push("Current content:".to_string());
        lines.extend(current.lines().map(|l| format!("  {l}")));
    }
    lines.join("\n")
}

#[derive(Debug, serde::Serialize)]
pub struct ProposalView {
    pub id: String,
    pub target_path: String,
    pub label: String,
    pub analysis: AnalysisResult,
    pub previous_content: String,
    pub prompt: String,
}

#[derive(Debug, serde::Serialize)]
pub struct SkippedView {
    pub label: String,
    pub reason: String,
}

#[derive(Debug, serde::Serialize)]
pub struct ProposeOutput {
    pub proposals: Vec<ProposalView>,
    pub skipped: Vec<SkippedView>,
}

impl CommandOutput for ProposeOutput {
    fn to_human(&self) -> String {
        if self.proposals.is_empty() && self.skipped.is_empty() {
            return "No optimize regions found.".to_string();
        }

        let mut sections = Vec::new();
        for proposal in &self.proposals {
            sections.push(format!(
                "{}\n\n{}\n\n{}\nSave the rewrite with:\n  trajectory-memory optimize save {} --label {} --file {} --content-file <PATH>",
                format_analysis(&proposal.analysis, Some(&proposal.target_path), None),
                "-".repeat(60),
                proposal.prompt,
                proposal.id,
                proposal.label,
                proposal.target_path,
            ));
        }
        for skipped in &self.skipped {
            sections.push(format!("Skipped \"{}\": {}", skipped.label, skipped.reason));
        }
        sections.join("\n\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RecordOutput {
    pub id: String,
    pub target_path: String,
    pub label: String,
    pub status: String,
    pub trajectory_count: usize,
    pub high_score_mean: f64,
    pub low_score_mean: f64,
    pub created_at: String,
    pub applied_at: Option<String>,
    pub rolled_back_at: Option<String>,
    pub previous_content: String,
    pub new_content: String,
    pub diff: String,
}

impl From<&OptimizationRecord> for RecordOutput {
    fn from(record: &OptimizationRecord) -> Self {
        Self {
            id: record.id.to_string(),
            target_path: record.target_path.clone(),
            label: record.label.clone(),
            status: record.status.as_str().to_string(),
            trajectory_count: record.trajectory_count,
            high_score_mean: record.high_score_mean,
            low_score_mean: record.low_score_mean,
            created_at: record.created_at.to_rfc3339(),
            applied_at: record.applied_at.map(|t| t.to_rfc3339()),
            rolled_back_at: record.rolled_back_at.map(|t| t.to_rfc3339()),
            previous_content: record.previous_content.clone(),
            new_content: record.new_content.clone(),
            diff: record.diff.clone(),
        }
    }
}

impl CommandOutput for RecordOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Optimization: {}", self.id),
            format!("File:        {}", self.target_path),
            format!("Label:       {}", self.label),
            format!("Status:      {}", self.status),
            format!(
                "Sessions:    {} (high avg {}, low avg {})",
                self.trajectory_count,
                percent(self.high_score_mean),
                percent(self.low_score_mean)
            ),
            format!("Created:     {}", self.created_at),
        ];
        if let Some(applied) = &self.applied_at {
            lines.push(format!("Applied:     {applied}"));
        }
        if let Some(rolled_back) = &self.rolled_back_at {
            lines.push(format!("Rolled back: {rolled_back}"));
        }
        lines.push(String::new());
        lines.push(self.diff.trim_end().to_string());
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ActionOutput {
    pub success: bool,
    pub message: String,
    pub record: RecordOutput,
}

impl CommandOutput for ActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct HistoryOutput {
    pub records: Vec<RecordOutput>,
    pub total: usize,
}

impl CommandOutput for HistoryOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "file", "label", "status", "sessions", "date"]);
        for record in &self.records {
            table.add_row(vec![
                record.id[..8].to_string(),
                truncate(&record.target_path, 30),
                record.label.clone(),
                record.status.clone(),
                record.trajectory_count.to_string(),
                record.created_at.get(..16).unwrap_or(&record.created_at).replace('T', " "),
            ]);
        }
        render_list("optimization", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct DiffOutput {
    pub id: String,
    pub diff: String,
}

impl CommandOutput for DiffOutput {
    fn to_human(&self) -> String {
        self.diff.trim_end().to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn document_path(file: Option<PathBuf>, config: &Config) -> PathBuf {
    file.unwrap_or_else(|| PathBuf::from(&config.optimizer.default_document))
}

fn read_content(content: Option<String>, content_file: Option<&Path>) -> Result<String> {
    match (content, content_file) {
        (Some(content), _) => Ok(content),
        (None, Some(path)) if path == Path::new("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("Failed to read content from stdin")?;
            Ok(buf)
        }
        (None, Some(path)) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        (None, None) => anyhow::bail!("Provide the new content with --content or --content-file"),
    }
}

pub async fn execute(args: OptimizeArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let trajectories = Arc::new(SqliteTrajectoryRepository::new(pool.clone()));
    let records = Arc::new(SqliteOptimizationRepository::new(pool.clone()));
    let service = OptimizationService::new(trajectories.clone(), records);

    match args.command {
        OptimizeCommands::Analyze { label, min_sessions } => {
            let analysis = TrajectoryAnalyzer::new(trajectories).analyze(&label, min_sessions).await?;
            let out = AnalysisOutput { analysis, target: None, current_content: None };
            output(&out, json_mode);
        }

        OptimizeCommands::Propose { label, file } => {
            let path = document_path(file, config);
            let outcomes = service.propose(&path, label.as_deref()).await?;

            let mut out = ProposeOutput { proposals: vec![], skipped: vec![] };
            for outcome in outcomes {
                match outcome {
                    ProposalOutcome::Proposed(proposal) => out.proposals.push(ProposalView {
                        id: proposal.record.id.to_string(),
                        target_path: proposal.record.target_path.clone(),
                        label: proposal.record.label.clone(),
                        previous_content: proposal.record.previous_content.clone(),
                        prompt: proposal.prompt,
                        analysis: proposal.analysis,
                    }),
                    ProposalOutcome::Skipped { label, reason } => out.skipped.push(SkippedView { label, reason }),
                }
            }
            output(&out, json_mode);
        }

        OptimizeCommands::Save { id, label, file, content, content_file } => {
            let path = document_path(file, config);
            let new_content = read_content(content, content_file.as_deref())?;
            let region = marker_parser::find_region(&path, RegionKind::Optimize, &label).await?;
            let record = service.save_region(id, &region, new_content).await?;
            let out = ActionOutput {
                success: true,
                message: format!("Optimization saved: {} (apply with `optimize apply {}`)", record.id, &record.id.to_string()[..8]),
                record: RecordOutput::from(&record),
            };
            output(&out, json_mode);
        }

        OptimizeCommands::Apply { id } => {
            let id = resolve_optimization_id(&pool, &id).await?;
            let record = service.apply(id).await?;
            let out = ActionOutput {
                success: true,
                message: format!("Applied optimization {} to \"{}\" in {}", record.id, record.label, record.target_path),
                record: RecordOutput::from(&record),
            };
            output(&out, json_mode);
        }

        OptimizeCommands::Reject { id } => {
            let id = resolve_optimization_id(&pool, &id).await?;
            let record = service.reject(id).await?;
            let out = ActionOutput {
                success: true,
                message: format!("Rejected optimization {}", record.id),
                record: RecordOutput::from(&record),
            };
            output(&out, json_mode);
        }

        OptimizeCommands::Rollback { id } => {
            let id = resolve_optimization_id(&pool, &id).await?;
            let record = service.rollback(id).await?;
            let out = ActionOutput {
                success: true,
                message: format!("Rolled back optimization {} in {}", record.id, record.target_path),
                record: RecordOutput::from(&record),
            };
            output(&out, json_mode);
        }

        OptimizeCommands::History { label, file, limit } => {
            let target = file.map(|f| f.to_string_lossy().to_string());
            let records = service
                .history(target.as_deref(), label.as_deref(), Some(limit.unwrap_or(config.optimizer.history_limit)))
                .await?;
            let out = HistoryOutput { total: records.len(), records: records.iter().map(RecordOutput::from).collect() };
            output(&out, json_mode);
        }

        OptimizeCommands::Diff { id } => {
            let id = resolve_optimization_id(&pool, &id).await?;
            let out = DiffOutput { id: id.to_string(), diff: service.diff(id).await? };
            output(&out, json_mode);
        }

        OptimizeCommands::Show { id } => {
            let id = resolve_optimization_id(&pool, &id).await?;
            let record = service.get(id).await?;
            output(&RecordOutput::from(&record), json_mode);
        }
    }

    Ok(())
}
