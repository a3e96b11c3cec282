//! Template compilation: renders model SQL into warehouse-ready artifacts.
//!
//! Models are minijinja templates with three helpers:
//!
//! * `{{ ref('model') }}` - quoted identifier of another model
//! * `{{ var('key', default) }}` - project variable from `kiln.yml`
//! * `{{ this }}` - quoted identifier of the model being compiled

use crate::error::{RunError, RunResult};
use kiln_core::{ModelDescriptor, ModelRegistry, Project};
use kiln_db::TableId;
use minijinja::{context, Environment, Error, ErrorKind, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Renders model templates against a project's variables and target dataset
#[derive(Debug, Clone)]
pub struct Compiler {
    vars: Arc<HashMap<String, Value>>,
    dataset: Option<String>,
}

impl Compiler {
    pub fn new(vars: &HashMap<String, serde_yaml::Value>, dataset: Option<&str>) -> Self {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_serialize(v)))
            .collect();
        Self {
            vars: Arc::new(vars),
            dataset: dataset.map(String::from),
        }
    }

    pub fn for_project(project: &Project) -> Self {
        Self::new(&project.config.vars, project.config.dataset.as_deref())
    }

    /// Render one model's source statement
    pub fn compile(&self, model: &dyn ModelDescriptor) -> RunResult<String> {
        let name = model.unique_name().to_string();
        let Some(source) = model.compiled_source() else {
            return Err(RunError::Compile {
                model: name,
                message: "model has no source statement".to_string(),
            });
        };

        let mut env = Environment::new();

        let declared: HashSet<String> = model
            .dependencies()
            .iter()
            .map(|d| d.to_string())
            .collect();
        let dataset = self.dataset.clone();
        let referrer = name.clone();
        env.add_function("ref", move |target: &str| -> Result<String, Error> {
            if target.is_empty() {
                return Err(Error::new(
                    ErrorKind::InvalidOperation,
                    "ref() requires a model name",
                ));
            }
            if !declared.contains(target) {
                log::warn!(
                    "Model '{}' references '{}' without declaring it in depends_on",
                    referrer,
                    target
                );
            }
            Ok(TableId::new(dataset.as_deref(), target).quoted())
        });

        let vars = self.vars.clone();
        env.add_function(
            "var",
            move |key: &str, default: Option<Value>| -> Result<Value, Error> {
                match vars.get(key) {
                    Some(value) => Ok(value.clone()),
                    None => default.ok_or_else(|| {
                        Error::new(
                            ErrorKind::UndefinedError,
                            format!("variable '{}' is not defined in kiln.yml vars", key),
                        )
                    }),
                }
            },
        );

        let this = TableId::new(self.dataset.as_deref(), name.as_str()).quoted();
        env.render_str(source, context! { this => this })
            .map_err(|e| RunError::Compile {
                model: name,
                message: e.to_string(),
            })
    }

    /// Compile every registered model into `<dir>/<model>.sql`.
    ///
    /// Returns the written paths in registry order.
    pub fn compile_to_dir(&self, registry: &ModelRegistry, dir: &Path) -> RunResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|source| kiln_core::CoreError::IoWithPath {
            path: dir.display().to_string(),
            source,
        })?;

        let mut written = Vec::with_capacity(registry.len());
        for model in registry.iter() {
            let sql = self.compile(model.as_ref())?;
            let path = dir.join(format!("{}.sql", model.unique_name()));
            std::fs::write(&path, sql).map_err(|source| kiln_core::CoreError::IoWithPath {
                path: path.display().to_string(),
                source,
            })?;
            log::debug!("Compiled {} -> {}", model.unique_name(), path.display());
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
#[path = "compile_test.rs"]
mod tests;
