use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project directory holding config files and the database.
pub const PROJECT_DIR: &str = ".trajectory-memory";

/// Prefix for environment overrides, e.g. `TM_LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "TM_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid history_limit: {0}. Must be at least 1")]
    InvalidHistoryLimit(usize),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the project in the current directory.
    pub fn load() -> Result<Config> {
        Self::load_in(".")
    }

    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .trajectory-memory/config.yaml (project config, created by init)
    /// 3. .trajectory-memory/local.yaml (local overrides, optional)
    /// 4. Environment variables (TM_* prefix, highest priority)
    pub fn load_in(root: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Self::figment(root.as_ref())
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(root: &Path) -> Figment {
        let dir = root.join(PROJECT_DIR);
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.optimizer.history_limit == 0 {
            return Err(ConfigError::InvalidHistoryLimit(config.optimizer.history_limit));
        }

        if config.optimizer.default_document.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "optimizer.default_document cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_project_file(root: &Path, name: &str, contents: &str) {
        let dir = root.join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".trajectory-memory/trajectory-memory.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.optimizer.default_document, "CLAUDE.md");
        assert_eq!(config.optimizer.history_limit, 10);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 2
logging:
  level: debug
  format: json
optimizer:
  default_document: AGENTS.md
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.optimizer.default_document, "AGENTS.md");
        assert_eq!(config.optimizer.history_limit, 10, "unset fields keep their defaults");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidLogFormat(f)) if f == "xml"));
    }

    #[test]
    fn test_validate_database() {
        let mut config = Config::default();
        config.database.path = "  ".to_string();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabasePath)));

        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidMaxConnections(0))));
    }

    #[test]
    fn test_validate_optimizer() {
        let mut config = Config::default();
        config.optimizer.history_limit = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidHistoryLimit(0))));

        let mut config = Config::default();
        config.optimizer.default_document = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn test_hierarchical_merging() {
        let root = tempfile::tempdir().unwrap();
        write_project_file(root.path(), "config.yaml", "logging:\n  level: info\n  format: json\n");
        write_project_file(root.path(), "local.yaml", "logging:\n  level: debug\n");

        let config = temp_env::with_var_unset("TM_LOGGING__LEVEL", || ConfigLoader::load_in(root.path())).unwrap();

        assert_eq!(config.logging.level, "debug", "local.yaml should win");
        assert_eq!(config.logging.format, "json", "config.yaml value should persist when not overridden");
    }

    #[test]
    fn test_env_override() {
        let root = tempfile::tempdir().unwrap();
        write_project_file(root.path(), "config.yaml", "optimizer:\n  history_limit: 3\n");

        let config = temp_env::with_vars(
            [("TM_OPTIMIZER__HISTORY_LIMIT", Some("25")), ("TM_LOGGING__LEVEL", Some("warn"))],
            || ConfigLoader::load_in(root.path()),
        )
        .unwrap();

        assert_eq!(config.optimizer.history_limit, 25);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let result = temp_env::with_var("TM_LOGGING__FORMAT", Some("xml"), || ConfigLoader::load_in(root.path()));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "database:\n  path: elsewhere.db\n").unwrap();

        let config = temp_env::with_var_unset("TM_DATABASE__PATH", || ConfigLoader::load_from_file(&path)).unwrap();
        assert_eq!(config.database.path, "elsewhere.db");
    }
}
