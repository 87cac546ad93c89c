//! Example curation for `examples` regions.

use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::{CuratedExample, RegionKind};
use crate::domain::ports::TrajectoryRepository;
use crate::services::marker_parser;
use crate::services::trajectory_analyzer::TrajectoryAnalyzer;

/// Scored sessions a label needs before examples are curated from it.
pub const CURATION_MIN_SAMPLES: usize = 3;
/// Task prompts longer than this are truncated in example headings.
pub const EXAMPLE_TITLE_LEN: usize = 50;

/// Examples picked for one label, ready to be written into a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedSet {
    pub label: String,
    pub examples: Vec<CuratedExample>,
    /// Markdown rendering of `examples`
    pub content: String,
}

pub struct CurationService<R: TrajectoryRepository> {
    analyzer: TrajectoryAnalyzer<R>,
}

impl<R: TrajectoryRepository> CurationService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { analyzer: TrajectoryAnalyzer::new(repository) }
    }

    /// Pick up to `max_examples` good sessions and optionally one bad one.
    #[instrument(skip(self))]
    pub async fn curate(&self, label: &str, max_examples: usize, include_negative: bool) -> DomainResult<CuratedSet> {
        let analysis = self
            .analyzer
            .analyze_with_limit(label, CURATION_MIN_SAMPLES, max_examples)
            .await?;

        let mut examples: Vec<CuratedExample> = analysis.positive_examples().take(max_examples).cloned().collect();
        if include_negative {
            examples.extend(analysis.negative_example().cloned());
        }

        let content = render_examples(&examples);
        info!(count = examples.len(), "examples curated");
        Ok(CuratedSet { label: label.to_string(), examples, content })
    }

    /// Write curated content into the `examples` region for `label`.
    #[instrument(skip(self, path, content), fields(path = %path.display()))]
    pub async fn apply(&self, path: &Path, label: &str, content: &str) -> DomainResult<()> {
        let region = marker_parser::find_region(path, RegionKind::Examples, label).await?;
        marker_parser::replace(&region, content).await?;
        info!("curated examples applied");
        Ok(())
    }
}

/// Render examples as the markdown that goes inside an examples region.
pub fn render_examples(examples: &[CuratedExample]) -> String {
    let mut out = String::from("### What Works Well (from past sessions)\n\n");

    for example in examples.iter().filter(|e| e.positive) {
        let _ = writeln!(
            out,
            "**Example: {}** (scored {:.0}%)",
            truncate_title(&example.task_prompt),
            example.score * 100.0
        );
        push_summary(&mut out, &example.summary);
        out.push('\n');
    }

    if let Some(example) = examples.iter().find(|e| !e.positive) {
        out.push_str("### What to Avoid\n\n");
        let _ = writeln!(
            out,
            "**Anti-example: {}** (scored {:.0}%)",
            truncate_title(&example.task_prompt),
            example.score * 100.0
        );
        push_summary(&mut out, &example.summary);
    }

    out
}

fn push_summary(out: &mut String, summary: &str) {
    if !summary.is_empty() {
        out.push_str(summary);
        out.push('\n');
    }
}

fn truncate_title(prompt: &str) -> String {
    if prompt.chars().count() <= EXAMPLE_TITLE_LEN {
        return prompt.to_string();
    }
    let kept: String = prompt.chars().take(EXAMPLE_TITLE_LEN - 3).collect();
    format!("{kept}...")
}
