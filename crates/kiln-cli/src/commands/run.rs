//! Run command implementation

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use kiln_core::{discover_tasks, tasks_by_name};
use kiln_run::{build_graph, materialize_all, ProgressCallback, RunOptions, RunReport, RunStatus};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{GlobalArgs, RunArgs};
use crate::commands::common::{
    load_project, open_warehouse, write_json_results, CommandResults, ExitCode,
};
use crate::commands::compile::compile_project;

/// Execute the run command
pub async fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let compiled_dir = project.compiled_dir();

    if !args.no_compile {
        compile_project(&project, &compiled_dir)?;
    }

    let tasks = discover_tasks(&compiled_dir, &project.registry)
        .context("Failed to discover compiled models")?;
    if tasks.is_empty() {
        println!("No compiled models found in {}", compiled_dir.display());
        return Ok(());
    }

    log::debug!(
        "Discovered {} compiled models in {}",
        tasks.len(),
        compiled_dir.display()
    );

    let graph = build_graph(&tasks).context("Failed to build dependency graph")?;
    let warehouse = open_warehouse(&project)?;

    let options = RunOptions {
        threads: args.threads.unwrap_or(project.config.threads),
        idle_timeout: args
            .idle_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| project.config.idle_timeout()),
        dataset: project.config.dataset.clone(),
    };

    if !args.quiet {
        println!(
            "Running {} models with {} threads...\n",
            graph.len(),
            options.threads.max(1)
        );
    }

    let progress = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new(graph.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    let on_progress = progress.clone().map(|pb| -> ProgressCallback {
        Arc::new(move |line: &str| {
            let line = format!("  {} {}", marker(line), line);
            if pb.is_hidden() {
                println!("{}", line);
            } else {
                pb.println(line);
            }
            pb.inc(1);
        })
    });

    let report = materialize_all(
        &graph,
        &tasks_by_name(tasks),
        warehouse,
        &options,
        on_progress,
    )
    .await
    .context("Run failed")?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    print_summary(&report);

    let results = CommandResults {
        timestamp: Utc::now(),
        elapsed_secs: report.elapsed_secs,
        success_count: report.success_count(),
        failure_count: report.failure_count(),
        skipped_count: report.skipped_count(),
        results: report.results.clone(),
    };
    write_json_results(&project.run_results_path(), &results)?;

    if !report.all_succeeded() {
        return Err(ExitCode(1).into());
    }
    Ok(())
}

fn marker(line: &str) -> &'static str {
    if line.starts_with("failed") {
        "\u{2717}"
    } else if line.starts_with("skipped") {
        "-"
    } else {
        "\u{2713}"
    }
}

fn print_summary(report: &RunReport) {
    println!();
    for result in report
        .results
        .iter()
        .filter(|r| r.status == RunStatus::Error)
    {
        println!(
            "  \u{2717} {} - {}",
            result.model,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!(
        "Completed: {} succeeded, {} failed, {} skipped in {:.2}s",
        report.success_count(),
        report.failure_count(),
        report.skipped_count(),
        report.elapsed_secs
    );
}
