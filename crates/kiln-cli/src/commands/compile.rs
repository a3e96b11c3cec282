//! Compile command implementation

use anyhow::{Context, Result};
use kiln_core::Project;
use kiln_run::Compiler;
use std::path::{Path, PathBuf};

use crate::cli::{CompileArgs, GlobalArgs};
use crate::commands::common::load_project;

/// Execute the compile command
pub async fn execute(args: &CompileArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let output_dir = args
        .output_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| project.compiled_dir());

    let written = compile_project(&project, &output_dir)?;
    println!(
        "Compiled {} models to {}",
        written.len(),
        output_dir.display()
    );
    Ok(())
}

/// Render every model in the project into `output_dir`
pub(crate) fn compile_project(project: &Project, output_dir: &Path) -> Result<Vec<PathBuf>> {
    Compiler::for_project(project)
        .compile_to_dir(&project.registry, output_dir)
        .context("Compilation failed")
}
