//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use kiln_core::{Config, Project};
use kiln_db::{DuckDbWarehouse, Warehouse};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Return `Err(ExitCode(N).into())` instead of calling `std::process::exit`
/// so destructors run before `main` exits.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; nothing user-facing to print
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Envelope for JSON results files written to the target directory
#[derive(Debug, Serialize)]
pub(crate) struct CommandResults<T: Serialize> {
    pub timestamp: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    pub results: Vec<T>,
}

/// Serialize `data` as pretty-printed JSON and write it to `path`.
///
/// Creates any missing parent directories before writing.
pub(crate) fn write_json_results<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create target directory")?;
    }
    let json = serde_json::to_string_pretty(data).context("Failed to serialize results")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn project_root(global: &GlobalArgs) -> Result<PathBuf> {
    let dir = Path::new(&global.project_dir);
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("Failed to resolve current directory")?
        .join(dir))
}

/// Load the project, honoring a `--config` override
pub(crate) fn load_project(global: &GlobalArgs) -> Result<Project> {
    match &global.config {
        Some(config_path) => {
            let config = Config::load(Path::new(config_path))
                .with_context(|| format!("Failed to load config {}", config_path))?;
            Project::load_with_config(project_root(global)?, config)
                .context("Failed to load project")
        }
        None => Project::load(Path::new(&global.project_dir)).context("Failed to load project"),
    }
}

/// Open the project's warehouse. Relative database paths resolve against
/// the project root.
pub(crate) fn open_warehouse(project: &Project) -> Result<Arc<dyn Warehouse>> {
    let path = &project.config.database.path;
    let warehouse = if path == ":memory:" {
        DuckDbWarehouse::in_memory()
    } else {
        DuckDbWarehouse::from_path(&project.root.join(path))
    }
    .with_context(|| format!("Failed to open warehouse {}", path))?;
    Ok(Arc::new(warehouse))
}

/// Calculate column widths for a table given headers and row data
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Render rows as left-aligned columns separated by two spaces, with a
/// dashed line under the header
pub(crate) fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths = calculate_column_widths(headers, rows);
    let line = |cells: &[&str]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(headers));
    out.push(
        widths
            .iter()
            .map(|&w| "-".repeat(w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push(line(&cells));
    }
    out.join("\n")
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
