//! Tasks: one compiled statement paired with the model it materializes.

use crate::error::{CoreError, CoreResult};
use crate::model::ModelDescriptor;
use crate::model_name::ModelName;
use crate::registry::ModelRegistry;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A resolved unit of materialization work.
///
/// Immutable once built; ownership moves between the queue and whichever
/// worker currently holds it.
#[derive(Clone)]
pub struct Task {
    /// Compiled SQL ready for execution
    pub sql: String,

    /// The model this task materializes
    pub model: Arc<dyn ModelDescriptor>,

    /// Compiled artifact the task was read from (diagnostics only)
    pub source_path: PathBuf,
}

impl Task {
    /// Build a task directly
    pub fn new(
        sql: impl Into<String>,
        model: Arc<dyn ModelDescriptor>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sql: sql.into(),
            model,
            source_path: source_path.into(),
        }
    }

    /// Build a task from a compiled artifact, resolving its model by file stem
    pub fn from_artifact(path: &Path, registry: &ModelRegistry) -> CoreResult<Self> {
        let model = registry.resolve_artifact(path)?;
        let sql = std::fs::read_to_string(path).map_err(|source| CoreError::IoWithPath {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(sql, model, path))
    }

    /// Name of the model this task materializes
    pub fn name(&self) -> &ModelName {
        self.model.unique_name()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("model", self.name())
            .field("source_path", &self.source_path)
            .finish_non_exhaustive()
    }
}

/// Discover compiled artifacts (`*.sql`) in `dir` and turn them into tasks.
///
/// Artifacts are visited in sorted path order. Files that do not belong to a
/// registered model are skipped with a warning.
pub fn discover_tasks(dir: &Path, registry: &ModelRegistry) -> CoreResult<Vec<Task>> {
    if !dir.exists() {
        log::warn!("Compiled directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|source| CoreError::IoWithPath {
        path: dir.display().to_string(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|source| CoreError::IoWithPath {
                path: dir.display().to_string(),
                source,
            })?
            .path();
        if path.is_file() && path.extension().is_some_and(|e| e == "sql") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut tasks = Vec::with_capacity(paths.len());
    for path in paths {
        match Task::from_artifact(&path, registry) {
            Ok(task) => tasks.push(task),
            Err(CoreError::ModelNotFound { name }) => {
                log::warn!(
                    "Skipping compiled artifact {}: no model named '{}'",
                    path.display(),
                    name
                );
            }
            Err(e) => return Err(e),
        }
    }
    Ok(tasks)
}

/// Index tasks by model name
pub fn tasks_by_name(tasks: Vec<Task>) -> HashMap<ModelName, Task> {
    tasks
        .into_iter()
        .map(|task| (task.name().clone(), task))
        .collect()
}

#[cfg(test)]
#[path = "task_test.rs"]
mod tests;
