//! Configuration types and parsing for kiln.yml

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// File names searched for in a project directory, in order
pub const CONFIG_FILE_NAMES: [&str; 2] = ["kiln.yml", "kiln.yaml"];

/// Main project configuration from kiln.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Directories containing model SQL and YAML files
    #[serde(default = "default_model_paths")]
    pub model_paths: Vec<String>,

    /// Output directory for compiled SQL and run results
    #[serde(default = "default_target_path")]
    pub target_path: String,

    /// Dataset (schema) that models are materialized into
    #[serde(default)]
    pub dataset: Option<String>,

    /// Default materialization for models that do not declare one
    #[serde(default)]
    pub materialization: Materialization,

    /// Number of concurrent materialization workers
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// How long an idle worker waits on an empty queue before exiting
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Warehouse connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Variables available to `var()` during compilation
    #[serde(default)]
    pub vars: HashMap<String, serde_yaml::Value>,
}

/// Warehouse connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// DuckDB database path, or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// How a model is persisted in the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    /// No warehouse object; the model only exists for its dependents
    Ephemeral,
    /// Create a view
    #[default]
    View,
    /// Create a table
    Table,
}

impl Materialization {
    /// Every kind, in the order they are listed in error messages
    pub const ALL: [Materialization; 3] = [
        Materialization::Ephemeral,
        Materialization::View,
        Materialization::Table,
    ];

    /// Comma-separated list of valid kind names
    pub fn valid_kinds() -> String {
        Self::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Lowercase name used in YAML and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Materialization::Ephemeral => "ephemeral",
            Materialization::View => "view",
            Materialization::Table => "table",
        }
    }

    /// Returns true if this is an ephemeral materialization
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Materialization::Ephemeral)
    }
}

impl fmt::Display for Materialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Materialization {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CoreError::UnknownMaterialization {
                kind: s.to_string(),
                valid: Self::valid_kinds(),
            })
    }
}

fn default_model_paths() -> Vec<String> {
    vec!["models".to_string()]
}

fn default_target_path() -> String {
    "target".to_string()
}

fn default_threads() -> usize {
    4
}

fn default_idle_timeout_ms() -> u64 {
    1000
}

fn default_db_path() -> String {
    ":memory:".to_string()
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| CoreError::IoWithPath {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigParseError {
                message: format!("{}: {}", path.display(), e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let path = CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.exists())
            .ok_or_else(|| CoreError::ConfigNotFound {
                path: dir.join(CONFIG_FILE_NAMES[0]).display().to_string(),
            })?;
        Self::load(&path)
    }

    fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::ConfigParseError {
                message: "project name must not be empty".to_string(),
            });
        }
        if self.threads == 0 {
            return Err(CoreError::ConfigParseError {
                message: "threads must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Model directories resolved against the project root
    pub fn model_paths_absolute(&self, root: &Path) -> Vec<PathBuf> {
        self.model_paths.iter().map(|p| root.join(p)).collect()
    }

    /// Target directory resolved against the project root
    pub fn target_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.target_path)
    }

    /// Worker idle timeout
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
