//! Implementation of the `trajectory-memory init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::PROJECT_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub directories_created: Vec<String>,
    pub config_written: bool,
    pub database_path: Option<PathBuf>,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.directories_created.is_empty() {
            lines.push("\nCreated directories:".to_string());
            for dir in &self.directories_created {
                lines.push(format!("  - {dir}"));
            }
        }
        if self.config_written {
            lines.push(format!("\nWrote {PROJECT_DIR}/config.yaml"));
        }
        if let Some(path) = &self.database_path {
            lines.push(format!("Database initialized at {}", path.display()));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir().context("Failed to get current directory")?.join(&args.path)
    };
    let project_dir = target_path.join(PROJECT_DIR);

    if project_dir.exists() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: target_path,
            directories_created: vec![],
            config_written: false,
            database_path: None,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    let mut directories_created = vec![];
    for dir in [project_dir.clone(), project_dir.join("logs")] {
        if !dir.exists() {
            fs::create_dir_all(&dir).await.with_context(|| format!("Failed to create {}", dir.display()))?;
            let relative = dir.strip_prefix(&target_path).unwrap_or(&dir).to_string_lossy().to_string();
            directories_created.push(relative);
        }
    }

    // Existing config survives --force; only the defaults are (re)written when missing.
    let config_path = project_dir.join("config.yaml");
    let config_written = if config_path.exists() {
        false
    } else {
        let yaml = serde_yaml::to_string(&Config::default()).context("Failed to serialize default config")?;
        fs::write(&config_path, yaml)
            .await
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        true
    };

    let db_path = target_path.join(Config::default().database.path);
    initialize_database(&format!("sqlite:{}", db_path.display()), None)
        .await
        .context("Failed to initialize database")?;

    let output_data = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path,
        directories_created,
        config_written,
        database_path: Some(db_path),
    };

    output(&output_data, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_project() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs { force: false, path: dir.path().to_path_buf() };
        execute(args, true).await.unwrap();

        let project = dir.path().join(PROJECT_DIR);
        assert!(project.join("config.yaml").exists());
        assert!(project.join("trajectory-memory.db").exists());

        let config: Config =
            serde_yaml::from_str(&std::fs::read_to_string(project.join("config.yaml")).unwrap()).unwrap();
        assert_eq!(config.optimizer.default_document, "CLAUDE.md");
    }

    #[tokio::test]
    async fn test_reinit_keeps_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        execute(InitArgs { force: false, path: dir.path().to_path_buf() }, true).await.unwrap();

        let config_path = dir.path().join(PROJECT_DIR).join("config.yaml");
        std::fs::write(&config_path, "logging:\n  level: debug\n").unwrap();

        execute(InitArgs { force: true, path: dir.path().to_path_buf() }, true).await.unwrap();
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "logging:\n  level: debug\n");
    }
}
