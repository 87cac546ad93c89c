//! Example curation CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::sqlite::SqliteTrajectoryRepository;
use crate::cli::open_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, CuratedExample, RegionKind};
use crate::services::curation::{CuratedSet, CurationService};
use crate::services::marker_parser;

#[derive(Args, Debug)]
pub struct CurateArgs {
    #[command(subcommand)]
    pub command: CurateCommands,
}

#[derive(Subcommand, Debug)]
pub enum CurateCommands {
    /// Show the examples that would be curated for a label
    Show {
        /// Task label
        label: String,
        /// Maximum positive examples
        #[arg(short, long, default_value = "3")]
        max: usize,
        /// Leave out the low-scoring example
        #[arg(long)]
        no_negative: bool,
    },
    /// Curate examples and write them into the document's examples region
    Apply {
        /// Task label
        label: String,
        /// Document holding the region (defaults to the configured document)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Maximum positive examples (defaults to the region's setting)
        #[arg(short, long)]
        max: Option<usize>,
        /// Leave out the low-scoring example (defaults to the region's setting)
        #[arg(long)]
        no_negative: bool,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct CurateOutput {
    pub label: String,
    pub examples: Vec<CuratedExample>,
    pub content: String,
    pub applied_to: Option<String>,
}

impl From<CuratedSet> for CurateOutput {
    fn from(set: CuratedSet) -> Self {
        Self { label: set.label, examples: set.examples, content: set.content, applied_to: None }
    }
}

impl CommandOutput for CurateOutput {
    fn to_human(&self) -> String {
        match &self.applied_to {
            Some(path) => format!(
                "Curated {} example(s) for \"{}\" written to {path}",
                self.examples.len(),
                self.label
            ),
            None => {
                let mut lines = vec![format!("Curated Examples for \"{}\"", self.label), String::new()];
                for example in &self.examples {
                    let kind = if example.positive { "+" } else { "-" };
                    lines.push(format!("{kind} {} ({})", example.trajectory_id, example.reason));
                }
                lines.push(String::new());
                lines.push(self.content.trim_end().to_string());
                lines.join("\n")
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: CurateArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let service = CurationService::new(Arc::new(SqliteTrajectoryRepository::new(pool)));

    match args.command {
        CurateCommands::Show { label, max, no_negative } => {
            let set = service.curate(&label, max, !no_negative).await?;
            output(&CurateOutput::from(set), json_mode);
        }

        CurateCommands::Apply { label, file, max, no_negative } => {
            let path = file.unwrap_or_else(|| PathBuf::from(&config.optimizer.default_document));
            let region = marker_parser::find_region(&path, RegionKind::Examples, &label).await?;

            let max = max.unwrap_or(region.params.max_examples);
            let include_negative = region.params.include_negative && !no_negative;
            let set = service.curate(&label, max, include_negative).await?;
            service.apply(&path, &label, &set.content).await?;

            let mut out = CurateOutput::from(set);
            out.applied_to = Some(path.display().to_string());
            output(&out, json_mode);
        }
    }

    Ok(())
}
