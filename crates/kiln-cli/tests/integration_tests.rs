//! Integration tests for Kiln

use kiln_core::{discover_tasks, tasks_by_name, ModelDag, Project};
use kiln_db::{DuckDbWarehouse, TableId, Warehouse};
use kiln_run::{build_graph, materialize_all, Compiler, RunOptions, RunStatus};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

const FIXTURE: &str = "tests/fixtures/sample_project";

/// Path to the compiled kiln binary
fn kiln_bin() -> String {
    env!("CARGO_BIN_EXE_kiln").to_string()
}

/// Run a `kiln` CLI command and return (stdout, stderr, success).
fn run_kiln(args: &[&str]) -> (String, String, bool) {
    let output = Command::new(kiln_bin())
        .args(args)
        .env_remove("KILN_THREADS")
        .output()
        .unwrap_or_else(|e| panic!("Failed to execute kiln with args {:?}: {}", args, e));
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn copy_dir(src: &Path, dst: &Path) {
    std::fs::create_dir_all(dst).unwrap();
    for entry in std::fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dst.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), target).unwrap();
        }
    }
}

/// Copy the fixture project into a scratch directory so runs can write
/// their target directory freely
fn scratch_project() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("sample_project");
    copy_dir(Path::new(FIXTURE), &root);
    (dir, root)
}

#[test]
fn test_load_sample_project() {
    let project = Project::load(Path::new(FIXTURE)).unwrap();

    assert_eq!(project.config.name, "sample_project");
    assert_eq!(project.config.dataset.as_deref(), Some("analytics"));
    assert_eq!(project.models.len(), 3);

    let names: Vec<&str> = project.registry.names().iter().map(|n| n.as_str()).collect();
    assert_eq!(names, vec!["bpm_bounds", "heart_rate", "heart_rate_agg"]);

    let heart_rate = project.get_model("heart_rate").unwrap();
    assert_eq!(heart_rate.materialized, "table");
    assert_eq!(heart_rate.config.depends_on, vec!["health"]);
}

#[test]
fn test_compile_sample_project() {
    let (_dir, root) = scratch_project();
    let project = Project::load(&root).unwrap();

    let written = Compiler::for_project(&project)
        .compile_to_dir(&project.registry, &project.compiled_dir())
        .unwrap();
    assert_eq!(written.len(), 3);

    let agg = std::fs::read_to_string(project.compiled_dir().join("heart_rate_agg.sql")).unwrap();
    assert!(agg.contains("FROM \"analytics\".\"heart_rate\""));
    let heart_rate =
        std::fs::read_to_string(project.compiled_dir().join("heart_rate.sql")).unwrap();
    assert!(heart_rate.contains("WHERE bpm >= 40"));
}

#[test]
fn test_registry_graph_includes_external_dependency() {
    let project = Project::load(Path::new(FIXTURE)).unwrap();
    let graph = ModelDag::from_registry(&project.registry).unwrap();

    assert_eq!(graph.len(), 4);
    assert!(graph.contains("health"));
    assert_eq!(graph.root().unwrap().unwrap(), "bpm_bounds");

    let order = graph.topological_order().unwrap();
    let position = |name: &str| order.iter().position(|n| n == name).unwrap();
    assert!(position("health") < position("heart_rate"));
    assert!(position("heart_rate") < position("heart_rate_agg"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end_against_duckdb() {
    let (_dir, root) = scratch_project();
    let project = Project::load(&root).unwrap();
    Compiler::for_project(&project)
        .compile_to_dir(&project.registry, &project.compiled_dir())
        .unwrap();

    let tasks = discover_tasks(&project.compiled_dir(), &project.registry).unwrap();
    assert_eq!(tasks.len(), 3);
    let graph = build_graph(&tasks).unwrap();

    let warehouse: Arc<dyn Warehouse> = Arc::new(DuckDbWarehouse::in_memory().unwrap());
    let options = RunOptions {
        threads: 2,
        idle_timeout: Duration::from_millis(200),
        dataset: project.config.dataset.clone(),
    };

    let report = materialize_all(
        &graph,
        &tasks_by_name(tasks),
        warehouse.clone(),
        &options,
        None,
    )
    .await
    .unwrap();

    assert!(report.all_succeeded());
    let materialized: Vec<&str> = report.materialized().iter().map(|n| n.as_str()).collect();
    assert_eq!(
        materialized,
        vec!["bpm_bounds", "health", "heart_rate", "heart_rate_agg"]
    );
    assert_eq!(report.result("health").unwrap().status, RunStatus::Skipped);
    assert_eq!(
        report.result("heart_rate").unwrap().message,
        "created table analytics.heart_rate (3 rows)"
    );

    let info = warehouse
        .get_table(&TableId::new(Some("analytics"), "heart_rate"))
        .await
        .unwrap();
    assert_eq!(info.num_rows, Some(3));
    assert_eq!(
        info.metadata.labels.get("team").map(String::as_str),
        Some("wearables")
    );
    assert_eq!(info.metadata.clustering, vec!["user_id".to_string()]);

    let agg = warehouse
        .execute_query("SELECT user_id, samples FROM analytics.heart_rate_agg ORDER BY user_id")
        .await
        .unwrap();
    assert_eq!(agg.rows.len(), 2);
    let user_one = agg
        .rows
        .iter()
        .find(|row| row["user_id"] == serde_json::json!(1))
        .unwrap();
    assert_eq!(user_one["samples"], serde_json::json!(2));

    // Ephemeral models leave nothing behind
    assert!(warehouse
        .get_table(&TableId::new(Some("analytics"), "bpm_bounds"))
        .await
        .is_err());
}

#[test]
fn test_cli_run_writes_results() {
    let (_dir, root) = scratch_project();
    let root_str = root.to_str().unwrap();

    let (stdout, stderr, success) = run_kiln(&["-p", root_str, "run"]);
    assert!(success, "kiln run failed\nstdout: {stdout}\nstderr: {stderr}");
    assert!(stdout.contains("skipped health (no compiled artifact)"));
    assert!(stdout.contains("created table analytics.heart_rate (3 rows)"));
    assert!(stdout.contains("created view analytics.heart_rate_agg"));
    assert!(stdout.contains("Completed: 3 succeeded, 0 failed, 1 skipped"));

    let results: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(root.join("target/run_results.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(results["success_count"], 3);
    assert_eq!(results["failure_count"], 0);
    assert_eq!(results["skipped_count"], 1);
    assert_eq!(results["results"].as_array().unwrap().len(), 4);
}

#[test]
fn test_cli_run_reports_failures_with_exit_code() {
    let (_dir, root) = scratch_project();
    let models = root.join("models");
    std::fs::write(models.join("broken.sql"), "SELECT * FROM table_that_does_not_exist").unwrap();
    std::fs::write(models.join("broken.yml"), "materialized: table\n").unwrap();
    std::fs::write(
        models.join("after_broken.sql"),
        "SELECT * FROM {{ ref('broken') }}",
    )
    .unwrap();
    std::fs::write(
        models.join("after_broken.yml"),
        "materialized: view\ndepends_on: [broken]\n",
    )
    .unwrap();

    let (stdout, _stderr, success) = run_kiln(&["-p", root.to_str().unwrap(), "run", "-j", "1"]);
    assert!(!success);
    assert!(stdout.contains("skipped after_broken (upstream broken failed)"));
    // The independent branch still ran
    assert!(stdout.contains("created view analytics.heart_rate_agg"));

    let results: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(root.join("target/run_results.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(results["failure_count"], 1);
    assert_eq!(results["skipped_count"], 2);
}

#[test]
fn test_cli_unknown_materialization_fails_model() {
    let (_dir, root) = scratch_project();
    std::fs::write(root.join("models/odd.sql"), "SELECT 1 AS x").unwrap();
    std::fs::write(root.join("models/odd.yml"), "materialized: bogus\n").unwrap();

    let (stdout, _stderr, success) = run_kiln(&["-p", root.to_str().unwrap(), "run", "--quiet"]);
    assert!(!success);
    assert!(stdout.contains("Invalid materialization 'bogus'. Valid kinds: ephemeral, view, table"));
}

#[test]
fn test_cli_graph_order_marks_root() {
    let (stdout, _stderr, success) = run_kiln(&["-p", FIXTURE, "graph", "--output", "order"]);
    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "bpm_bounds (root)");
    assert_eq!(lines.len(), 4);
}

#[test]
fn test_cli_graph_json_is_cytoscape() {
    let (stdout, _stderr, success) = run_kiln(&["-p", FIXTURE, "graph"]);
    assert!(success);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["nodes"].as_array().unwrap().len(), 4);
    assert!(json["edges"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["data"]["source"] == "health" && e["data"]["target"] == "heart_rate"));
}

#[test]
fn test_cli_ls_json() {
    let (stdout, _stderr, success) = run_kiln(&["-p", FIXTURE, "ls", "--output", "json"]);
    assert!(success);
    let models: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let agg = models
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["name"] == "heart_rate_agg")
        .unwrap();
    assert_eq!(agg["materialized"], "view");
    assert_eq!(agg["depends_on"], serde_json::json!(["heart_rate"]));
}

#[test]
fn test_cli_compile_writes_artifacts() {
    let (_dir, root) = scratch_project();
    let (stdout, _stderr, success) = run_kiln(&["-p", root.to_str().unwrap(), "compile"]);
    assert!(success);
    assert!(stdout.contains("Compiled 3 models"));
    assert!(root.join("target/compiled/heart_rate_agg.sql").exists());
}
