//! Optimization lifecycle manager.
//!
//! Turns an optimize region plus its trajectory analysis into a rewrite
//! proposal, persists reviewed rewrites as records, and applies or reverts
//! them in the document.

use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AnalysisResult, OptimizationRecord, Region, RegionKind};
use crate::domain::ports::{OptimizationFilter, OptimizationRepository, TrajectoryRepository};
use crate::services::diff::generate_diff;
use crate::services::marker_parser;
use crate::services::trajectory_analyzer::TrajectoryAnalyzer;

/// Records returned by `history` when the caller does not set a limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Everything needed to write a better version of one region.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub region: Region,
    pub analysis: AnalysisResult,
    /// Unsaved draft; `save` is the durable creation point
    pub record: OptimizationRecord,
    /// Instructions for whoever writes the new region body
    pub prompt: String,
}

/// Result of proposing one region while proposing a whole document.
#[derive(Debug, Clone)]
pub enum ProposalOutcome {
    Proposed(Box<Proposal>),
    Skipped { label: String, reason: String },
}

/// Input to [`OptimizationService::save`].
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub id: Uuid,
    pub target_path: String,
    pub label: String,
    pub previous_content: String,
    pub new_content: String,
    pub trajectory_count: usize,
    pub high_score_mean: f64,
    pub low_score_mean: f64,
}

impl SaveRequest {
    pub fn new(
        id: Uuid,
        target_path: impl Into<String>,
        label: impl Into<String>,
        previous_content: impl Into<String>,
        new_content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            target_path: target_path.into(),
            label: label.into(),
            previous_content: previous_content.into(),
            new_content: new_content.into(),
            trajectory_count: 0,
            high_score_mean: 0.0,
            low_score_mean: 0.0,
        }
    }

    /// Save a proposal's draft with the rewritten body.
    pub fn from_proposal(proposal: &Proposal, new_content: impl Into<String>) -> Self {
        let draft = &proposal.record;
        Self {
            trajectory_count: draft.trajectory_count,
            high_score_mean: draft.high_score_mean,
            low_score_mean: draft.low_score_mean,
            ..Self::new(draft.id, &draft.target_path, &draft.label, &draft.previous_content, new_content)
        }
    }
}

pub struct OptimizationService<T, O>
where
    T: TrajectoryRepository,
    O: OptimizationRepository,
{
    analyzer: TrajectoryAnalyzer<T>,
    records: Arc<O>,
    // Serializes the read-modify-write of every lifecycle transition.
    transitions: Mutex<()>,
}

impl<T, O> OptimizationService<T, O>
where
    T: TrajectoryRepository,
    O: OptimizationRepository,
{
    pub fn new(trajectories: Arc<T>, records: Arc<O>) -> Self {
        Self {
            analyzer: TrajectoryAnalyzer::new(trajectories),
            records,
            transitions: Mutex::new(()),
        }
    }

    /// Build a proposal for one optimize region.
    ///
    /// Fails with `InsufficientData` when the region's label does not yet
    /// have `min_sessions` scored trajectories. Nothing is persisted.
    #[instrument(skip(self, region), fields(label = %region.label))]
    pub async fn propose_region(&self, region: &Region) -> DomainResult<Proposal> {
        let analysis = self.analyzer.analyze(&region.label, region.params.min_sessions).await?;

        let mut record = OptimizationRecord::new(
            region.path.to_string_lossy(),
            &region.label,
            &region.content,
        );
        record.trajectory_count = analysis.total_sessions;
        record.high_score_mean = analysis.high_score_mean;
        record.low_score_mean = analysis.low_score_mean;

        let prompt = build_meta_prompt(region, &analysis);
        info!(draft_id = %record.id, sessions = analysis.total_sessions, "proposal drafted");

        Ok(Proposal { region: region.clone(), analysis, record, prompt })
    }

    /// Propose the optimize regions of a document.
    ///
    /// With a label, exactly that region is proposed and its errors are
    /// returned as-is. Without one, every optimize region is tried and those
    /// lacking data are reported as skipped.
    pub async fn propose(&self, path: &Path, label: Option<&str>) -> DomainResult<Vec<ProposalOutcome>> {
        if let Some(label) = label {
            let region = marker_parser::find_region(path, RegionKind::Optimize, label).await?;
            let proposal = self.propose_region(&region).await?;
            return Ok(vec![ProposalOutcome::Proposed(Box::new(proposal))]);
        }

        let regions = marker_parser::find_regions(path).await?;
        let mut outcomes = Vec::new();
        for region in regions.iter().filter(|r| r.kind == RegionKind::Optimize) {
            match self.propose_region(region).await {
                Ok(proposal) => outcomes.push(ProposalOutcome::Proposed(Box::new(proposal))),
                Err(err @ DomainError::InsufficientData { .. }) => {
                    warn!(label = %region.label, error = %err, "skipping region");
                    outcomes.push(ProposalOutcome::Skipped { label: region.label.clone(), reason: err.to_string() });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(outcomes)
    }

    /// Persist a reviewed rewrite with status `proposed`.
    #[instrument(skip(self, request), fields(id = %request.id, label = %request.label))]
    pub async fn save(&self, request: SaveRequest) -> DomainResult<OptimizationRecord> {
        if request.new_content.trim().is_empty() {
            return Err(DomainError::ValidationFailed("new content must not be empty".to_string()));
        }
        if request.label.trim().is_empty() {
            return Err(DomainError::ValidationFailed("label must not be empty".to_string()));
        }
        marker_parser::check_body(&request.new_content, 1)?;

        let _guard = self.transitions.lock().await;
        if self.records.get(request.id).await?.is_some() {
            return Err(DomainError::ValidationFailed(format!(
                "optimization {} has already been saved",
                request.id
            )));
        }

        let mut record = OptimizationRecord::new(request.target_path, request.label, request.previous_content);
        record.id = request.id;
        record.diff = generate_diff(&record.previous_content, &request.new_content);
        record.new_content = request.new_content;
        record.trajectory_count = request.trajectory_count;
        record.high_score_mean = request.high_score_mean;
        record.low_score_mean = request.low_score_mean;

        self.records.create(&record).await?;
        info!("optimization saved");
        Ok(record)
    }

    /// Save a rewrite of `region`, stamped with its label's current statistics.
    #[instrument(skip(self, region, new_content), fields(label = %region.label))]
    pub async fn save_region(
        &self,
        id: Uuid,
        region: &Region,
        new_content: impl Into<String>,
    ) -> DomainResult<OptimizationRecord> {
        let analysis = self.analyzer.analyze(&region.label, 0).await?;

        let mut request =
            SaveRequest::new(id, region.path.to_string_lossy(), &region.label, &region.content, new_content);
        request.trajectory_count = analysis.total_sessions;
        request.high_score_mean = analysis.high_score_mean;
        request.low_score_mean = analysis.low_score_mean;
        self.save(request).await
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<OptimizationRecord> {
        self.records.get(id).await?.ok_or(DomainError::RecordNotFound(id))
    }

    /// Write a proposed record's new content into its region.
    #[instrument(skip(self))]
    pub async fn apply(&self, id: Uuid) -> DomainResult<OptimizationRecord> {
        let _guard = self.transitions.lock().await;
        let mut record = self.get(id).await?;
        record.require_proposed()?;

        let region = self.locate(&record).await?;
        marker_parser::replace(&region, &record.new_content).await?;

        record.mark_accepted()?;
        self.commit_written(&record, &record.previous_content).await?;
        info!(path = %record.target_path, label = %record.label, "optimization applied");
        Ok(record)
    }

    /// Discard a proposed record without touching the document.
    #[instrument(skip(self))]
    pub async fn reject(&self, id: Uuid) -> DomainResult<OptimizationRecord> {
        let _guard = self.transitions.lock().await;
        let mut record = self.get(id).await?;
        record.mark_rejected()?;
        self.records.update(&record).await?;
        info!("optimization rejected");
        Ok(record)
    }

    /// Restore the content an accepted record replaced.
    #[instrument(skip(self))]
    pub async fn rollback(&self, id: Uuid) -> DomainResult<OptimizationRecord> {
        let _guard = self.transitions.lock().await;
        let mut record = self.get(id).await?;
        record.require_accepted()?;

        let region = self.locate(&record).await?;
        marker_parser::replace(&region, &record.previous_content).await?;

        record.mark_rolled_back()?;
        self.commit_written(&record, &record.new_content).await?;
        info!(path = %record.target_path, label = %record.label, "optimization rolled back");
        Ok(record)
    }

    /// Records for a document and/or label, most recent first.
    pub async fn history(
        &self,
        target_path: Option<&str>,
        label: Option<&str>,
        limit: Option<usize>,
    ) -> DomainResult<Vec<OptimizationRecord>> {
        self.records
            .list(OptimizationFilter {
                target_path: target_path.map(str::to_string),
                label: label.map(str::to_string),
                status: None,
                limit: Some(limit.unwrap_or(DEFAULT_HISTORY_LIMIT)),
            })
            .await
    }

    pub async fn diff(&self, id: Uuid) -> DomainResult<String> {
        Ok(self.get(id).await?.diff)
    }

    /// Store a transition whose document write already happened.
    ///
    /// When the update fails the region is put back to `restore`, so the
    /// document keeps matching the stored status.
    async fn commit_written(&self, record: &OptimizationRecord, restore: &str) -> DomainResult<()> {
        let Err(err) = self.records.update(record).await else {
            return Ok(());
        };
        warn!(id = %record.id, error = %err, "record update failed, restoring document");

        let restored = match self.locate(record).await {
            Ok(region) => marker_parser::replace(&region, restore).await,
            Err(locate_err) => Err(locate_err),
        };
        match restored {
            Ok(()) => Err(err),
            Err(restore_err) => Err(DomainError::DocumentDiverged {
                path: record.target_path.clone(),
                id: record.id,
                update: err.to_string(),
                restore: restore_err.to_string(),
            }),
        }
    }

    /// Freshly locate the record's region; it may have moved since proposal.
    async fn locate(&self, record: &OptimizationRecord) -> DomainResult<Region> {
        marker_parser::find_region(Path::new(&record.target_path), RegionKind::Optimize, &record.label).await
    }
}

/// Instructions for rewriting a region from its trajectory analysis.
pub fn build_meta_prompt(region: &Region, analysis: &AnalysisResult) -> String {
    let mut out = String::new();

    out.push_str("## Context Optimization Request\n\n");
    out.push_str("Rewrite the instructions below using what past agent sessions show about what works.\n\n");

    out.push_str("### Current Instructions\n```\n");
    out.push_str(region.trimmed_content());
    out.push_str("\n```\n\n");

    let _ = writeln!(out, "### Trajectory Analysis for \"{}\" tasks\n", analysis.label);
    let _ = writeln!(
        out,
        "Scored sessions: {} ({} high, {} medium, {} low)\n",
        analysis.total_sessions, analysis.high_score_sessions, analysis.medium_score_sessions, analysis.low_score_sessions
    );

    let _ = writeln!(
        out,
        "**{} high-scoring sessions (avg {:.0}%):**",
        analysis.high_score_sessions,
        analysis.high_score_mean * 100.0
    );
    out.push_str("Patterns observed:\n");
    for pattern in &analysis.patterns {
        let _ = writeln!(out, "- {}", pattern.statement);
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "**{} low-scoring sessions (avg {:.0}%):**",
        analysis.low_score_sessions,
        analysis.low_score_mean * 100.0
    );
    out.push_str("Anti-patterns observed:\n");
    for anti in &analysis.anti_patterns {
        let _ = writeln!(out, "- {}", anti.statement);
    }
    out.push('\n');

    if let Some(example) = analysis.positive_examples().next() {
        out.push_str("### Example High-Scoring Session\n\n");
        write_example(&mut out, &example.task_prompt, &example.summary, &example.notes, example.score);
    }
    if let Some(example) = analysis.negative_example() {
        out.push_str("### Example Low-Scoring Session\n\n");
        write_example(&mut out, &example.task_prompt, &example.summary, &example.notes, example.score);
    }

    out.push_str(
        "### Your Task\n\n\
Rewrite the instructions so the agent consistently reaches high-scoring outcomes. The result should:\n\n\
1. Be concrete and actionable rather than vague advice\n\
2. Reference the patterns that correlated with success\n\
3. Warn against the anti-patterns seen in low-scoring sessions\n\
4. Be formatted as a numbered list of best practices\n\
5. Give quantitative guidance where the data supports it (\"use 5-8 searches\", not \"search a lot\")\n\
6. Stay concise, at most 8-12 practices\n\n\
Output ONLY the new instructions, with no preamble or explanation.\n",
    );

    out
}

fn write_example(out: &mut String, task_prompt: &str, summary: &str, notes: &str, score: f64) {
    let _ = writeln!(out, "**Score: {:.0}%** - {}", score * 100.0, task_prompt);
    if !summary.is_empty() {
        let _ = writeln!(out, "{summary}");
    }
    if !notes.is_empty() {
        let _ = writeln!(out, "User notes: {notes}");
    }
    out.push('\n');
}
