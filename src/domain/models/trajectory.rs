//! Trajectory domain model.
//!
//! A trajectory is the recorded action sequence of one agent session. The
//! recording transport owns creation; the optimization engine only reads
//! trajectories and attaches outcomes to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a recorded trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrajectoryStatus {
    /// Steps are still being appended
    #[default]
    Recording,
    /// Recording finished, no outcome yet
    Completed,
    /// An outcome score has been attached
    Scored,
}

impl TrajectoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recording => "recording",
            Self::Completed => "completed",
            Self::Scored => "scored",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "recording" => Some(Self::Recording),
            "completed" => Some(Self::Completed),
            "scored" => Some(Self::Scored),
            _ => None,
        }
    }
}

/// Coarse classification of a recorded action, used by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Read,
    Write,
    Other,
}

/// A single tool invocation inside a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryStep {
    pub timestamp: DateTime<Utc>,
    pub tool_name: String,
    #[serde(default)]
    pub input_summary: String,
    #[serde(default)]
    pub output_summary: String,
    #[serde(default)]
    pub duration_ms: u64,
}

impl TrajectoryStep {
    pub fn new(tool_name: impl Into<String>, input_summary: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            tool_name: tool_name.into(),
            input_summary: input_summary.into(),
            output_summary: String::new(),
            duration_ms: 0,
        }
    }

    /// Classify the step by its tool name.
    ///
    /// Write-type tools take precedence so that e.g. `update_search_index`
    /// counts as a write.
    pub fn kind(&self) -> ActionKind {
        let name = self.tool_name.to_lowercase();
        if matches!(name.as_str(), "write" | "edit" | "notebookedit")
            || name.contains("create")
            || name.contains("update")
        {
            ActionKind::Write
        } else if matches!(name.as_str(), "read" | "grep" | "glob")
            || name.contains("search")
            || name.contains("fetch")
        {
            ActionKind::Read
        } else {
            ActionKind::Other
        }
    }

    /// Best-effort identification of the file or resource the step touched.
    ///
    /// Picks the first whitespace-separated token that looks like a path and
    /// falls back to the whole input summary.
    pub fn target(&self) -> &str {
        self.input_summary
            .split_whitespace()
            .find(|word| word.contains('/') || word.contains('.'))
            .map(|word| word.trim_matches(|c| matches!(c, '"' | '\'' | '`')))
            .unwrap_or(&self.input_summary)
    }
}

/// Outcome attached to a trajectory once it has been judged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Score in `[0.0, 1.0]`
    pub score: f64,
    #[serde(default)]
    pub notes: String,
    pub scored_at: DateTime<Utc>,
}

/// A recorded agent session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Opaque identifier assigned by the recorder
    pub id: String,
    pub task_prompt: String,
    #[serde(default)]
    pub working_dir: String,
    #[serde(default)]
    pub steps: Vec<TrajectoryStep>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Name of the strategy the session followed, if any
    #[serde(default)]
    pub strategy: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: TrajectoryStatus,
}

impl Trajectory {
    pub fn new(id: impl Into<String>, task_prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_prompt: task_prompt.into(),
            working_dir: String::new(),
            steps: Vec::new(),
            summary: None,
            outcome: None,
            tags: Vec::new(),
            strategy: None,
            started_at: Utc::now(),
            completed_at: None,
            status: TrajectoryStatus::Recording,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_steps(mut self, steps: Vec<TrajectoryStep>) -> Self {
        self.steps = steps;
        self
    }

    /// Attach an outcome, replacing any previous one.
    pub fn score(&mut self, score: f64, notes: impl Into<String>) {
        self.outcome = Some(Outcome {
            score,
            notes: notes.into(),
            scored_at: Utc::now(),
        });
        self.status = TrajectoryStatus::Scored;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn score_value(&self) -> Option<f64> {
        self.outcome.as_ref().map(|o| o.score)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Summary text, treating a blank summary as absent.
    pub fn summary_text(&self) -> Option<&str> {
        self.summary.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(tool: &str, input: &str) -> TrajectoryStep {
        TrajectoryStep::new(tool, input)
    }

    #[test]
    fn test_step_kind_classification() {
        assert_eq!(step("Read", "src/lib.rs").kind(), ActionKind::Read);
        assert_eq!(step("Grep", "fn main").kind(), ActionKind::Read);
        assert_eq!(step("WebFetch", "https://x").kind(), ActionKind::Read);
        assert_eq!(step("web_search", "rust").kind(), ActionKind::Read);
        assert_eq!(step("Edit", "src/lib.rs").kind(), ActionKind::Write);
        assert_eq!(step("NotebookEdit", "a.ipynb").kind(), ActionKind::Write);
        assert_eq!(step("create_file", "a.md").kind(), ActionKind::Write);
        assert_eq!(step("Bash", "cargo test").kind(), ActionKind::Other);
    }

    #[test]
    fn test_step_target_prefers_path_like_token() {
        assert_eq!(step("Read", "open `docs/guide.md` now").target(), "docs/guide.md");
        assert_eq!(step("Write", "\"notes.txt\"").target(), "notes.txt");
        assert_eq!(step("Grep", "needle").target(), "needle");
    }

    #[test]
    fn test_score_sets_status_and_outcome() {
        let mut t = Trajectory::new("s1", "write docs").with_tag("docs");
        assert!(t.score_value().is_none());
        t.score(0.8, "good");
        assert_eq!(t.status, TrajectoryStatus::Scored);
        assert_eq!(t.score_value(), Some(0.8));
        assert!(t.completed_at.is_some());

        t.score(0.4, "rescored");
        assert_eq!(t.score_value(), Some(0.4));
    }

    #[test]
    fn test_blank_summary_is_absent() {
        let t = Trajectory::new("s1", "x").with_summary("   ");
        assert!(t.summary_text().is_none());
        let t = Trajectory::new("s2", "x").with_summary("did things");
        assert_eq!(t.summary_text(), Some("did things"));
    }
}
