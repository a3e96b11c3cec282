//! Model descriptors: the contract the graph and the materialization
//! engine consume, and the concrete model loaded from project files.

use crate::config::Materialization;
use crate::error::{CoreError, CoreResult};
use crate::model_name::ModelName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A declared unit of transformation.
///
/// The dependency graph only looks at [`unique_name`](Self::unique_name) and
/// [`dependencies`](Self::dependencies); the dispatcher additionally reads the
/// materialization kind and the warehouse metadata.
pub trait ModelDescriptor: Send + Sync + fmt::Debug {
    /// Stable identifier, unique across a registry
    fn unique_name(&self) -> &ModelName;

    /// Upstream models that must be materialized first, in declaration order
    fn dependencies(&self) -> &[ModelName];

    /// Raw materialization kind; validated when the model is dispatched
    fn materialization_kind(&self) -> &str;

    /// Source statement handed to the compiler, if the model has one
    fn compiled_source(&self) -> Option<&str>;

    /// Human description copied onto the warehouse object
    fn description(&self) -> Option<&str> {
        None
    }

    /// Labels copied onto the warehouse object
    fn labels(&self) -> &BTreeMap<String, String>;

    /// Clustering columns for tables
    fn cluster_by(&self) -> &[String] {
        &[]
    }

    /// Parsed materialization kind
    fn materialization(&self) -> CoreResult<Materialization> {
        self.materialization_kind().parse()
    }
}

/// Per-model YAML configuration (`<model>.yml` next to `<model>.sql`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Description of the model
    #[serde(default)]
    pub description: Option<String>,

    /// Materialization kind; falls back to the project default
    #[serde(default)]
    pub materialized: Option<String>,

    /// Models this model reads from
    #[serde(default)]
    pub depends_on: Vec<ModelName>,

    /// Labels attached to the created table or view
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Clustering columns (tables only)
    #[serde(default)]
    pub cluster_by: Vec<String>,
}

/// A model discovered in a project
#[derive(Debug, Clone)]
pub struct Model {
    /// Model name (SQL file stem)
    pub name: ModelName,

    /// Path to the model's SQL file
    pub path: PathBuf,

    /// Raw SQL template
    pub raw_sql: String,

    /// Effective materialization kind
    pub materialized: String,

    /// Parsed YAML configuration
    pub config: ModelConfig,
}

impl Model {
    /// Build a model in memory, e.g. for tests or programmatic registries
    pub fn new(name: ModelName, raw_sql: impl Into<String>, config: ModelConfig) -> Self {
        let materialized = config
            .materialized
            .clone()
            .unwrap_or_else(|| Materialization::default().to_string());
        Self {
            path: PathBuf::from(format!("{}.sql", name)),
            name,
            raw_sql: raw_sql.into(),
            materialized,
            config,
        }
    }

    /// Load a model from its SQL file, reading the sibling YAML file if present
    pub fn from_file(path: &Path, default_materialization: Materialization) -> CoreResult<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let name = ModelName::parse(stem, &format!("model file {}", path.display()))?;

        let raw_sql = std::fs::read_to_string(path).map_err(|source| CoreError::IoWithPath {
            path: path.display().to_string(),
            source,
        })?;

        let config = match find_config_path(path) {
            Some(yaml_path) => {
                let content = std::fs::read_to_string(&yaml_path).map_err(|source| {
                    CoreError::IoWithPath {
                        path: yaml_path.display().to_string(),
                        source,
                    }
                })?;
                serde_yaml::from_str(&content).map_err(|source| CoreError::YamlParse {
                    path: yaml_path.display().to_string(),
                    source,
                })?
            }
            None => ModelConfig::default(),
        };

        let materialized = config
            .materialized
            .clone()
            .unwrap_or_else(|| default_materialization.to_string());

        Ok(Self {
            name,
            path: path.to_path_buf(),
            raw_sql,
            materialized,
            config,
        })
    }
}

fn find_config_path(sql_path: &Path) -> Option<PathBuf> {
    ["yml", "yaml"]
        .iter()
        .map(|ext| sql_path.with_extension(ext))
        .find(|p| p.is_file())
}

impl ModelDescriptor for Model {
    fn unique_name(&self) -> &ModelName {
        &self.name
    }

    fn dependencies(&self) -> &[ModelName] {
        &self.config.depends_on
    }

    fn materialization_kind(&self) -> &str {
        &self.materialized
    }

    fn compiled_source(&self) -> Option<&str> {
        Some(&self.raw_sql)
    }

    fn description(&self) -> Option<&str> {
        self.config.description.as_deref()
    }

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.config.labels
    }

    fn cluster_by(&self) -> &[String] {
        &self.config.cluster_by
    }
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
