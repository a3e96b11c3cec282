//! Project discovery and model loading

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::model::{Model, ModelDescriptor};
use crate::registry::ModelRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A Kiln project: configuration plus the models it declares
#[derive(Debug)]
pub struct Project {
    /// Project root directory
    pub root: PathBuf,

    /// Project configuration
    pub config: Config,

    /// Concrete models, in discovery order
    pub models: Vec<Arc<Model>>,

    /// Registry view over `models`
    pub registry: ModelRegistry,
}

impl Project {
    /// Load a project from a directory
    pub fn load(path: &Path) -> CoreResult<Self> {
        let root = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        if !root.exists() {
            return Err(CoreError::ProjectNotFound {
                path: root.display().to_string(),
            });
        }

        let config = Config::load_from_dir(&root)?;
        Self::load_with_config(root, config)
    }

    /// Load a project using an already-parsed configuration
    pub fn load_with_config(root: PathBuf, config: Config) -> CoreResult<Self> {
        let mut sql_files = Vec::new();
        for dir in config.model_paths_absolute(&root) {
            if !dir.exists() {
                log::warn!("Model path {} does not exist", dir.display());
                continue;
            }
            collect_sql_files(&dir, &mut sql_files)?;
        }
        sql_files.sort();

        let mut models = Vec::with_capacity(sql_files.len());
        let mut registry = ModelRegistry::new();
        for path in &sql_files {
            let model = Arc::new(Model::from_file(path, config.materialization)?);
            registry.register(model.clone() as Arc<dyn ModelDescriptor>)?;
            models.push(model);
        }

        Ok(Self {
            root,
            config,
            models,
            registry,
        })
    }

    /// Get a model by name
    pub fn get_model(&self, name: &str) -> Option<&Arc<Model>> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Get the target directory path
    pub fn target_dir(&self) -> PathBuf {
        self.config.target_path_absolute(&self.root)
    }

    /// Directory holding one compiled `.sql` artifact per model
    pub fn compiled_dir(&self) -> PathBuf {
        self.target_dir().join("compiled")
    }

    /// Path of the JSON run results file
    pub fn run_results_path(&self) -> PathBuf {
        self.target_dir().join("run_results.json")
    }
}

fn collect_sql_files(dir: &Path, out: &mut Vec<PathBuf>) -> CoreResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|source| CoreError::IoWithPath {
        path: dir.display().to_string(),
        source,
    })?;
    for entry in entries {
        let path = entry
            .map_err(|source| CoreError::IoWithPath {
                path: dir.display().to_string(),
                source,
            })?
            .path();
        if path.is_dir() {
            collect_sql_files(&path, out)?;
        } else if path.extension().is_some_and(|e| e == "sql") {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "project_test.rs"]
mod tests;
