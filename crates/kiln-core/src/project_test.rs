use super::*;
use crate::config::Materialization;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn sample_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("kiln.yml"),
        "name: health_project\ndataset: analytics\nmaterialization: table\n",
    );
    write(&root.join("models/health.sql"), "SELECT 1 AS user_id");
    write(
        &root.join("models/wearables/heart_rate.sql"),
        "SELECT * FROM {{ ref('health') }}",
    );
    write(
        &root.join("models/wearables/heart_rate.yml"),
        "materialized: view\ndepends_on: [health]\n",
    );
    dir
}

#[test]
fn test_load_project() {
    let dir = sample_project();
    let project = Project::load(dir.path()).unwrap();

    assert_eq!(project.config.name, "health_project");
    assert_eq!(project.models.len(), 2);
    assert_eq!(project.registry.len(), 2);

    let health = project.get_model("health").unwrap();
    assert_eq!(health.materialized, Materialization::Table.to_string());

    let heart_rate = project.registry.get("heart_rate").unwrap();
    assert_eq!(heart_rate.materialization_kind(), "view");
    assert_eq!(heart_rate.dependencies().len(), 1);
}

#[test]
fn test_paths() {
    let dir = sample_project();
    let project = Project::load(dir.path()).unwrap();

    assert_eq!(project.compiled_dir(), dir.path().join("target/compiled"));
    assert_eq!(
        project.run_results_path(),
        dir.path().join("target/run_results.json")
    );
}

#[test]
fn test_duplicate_model_names_rejected() {
    let dir = sample_project();
    write(&dir.path().join("models/other/health.sql"), "SELECT 2");

    let err = Project::load(dir.path()).unwrap_err();
    assert!(matches!(err, CoreError::DuplicateModel { .. }));
}

#[test]
fn test_missing_project_dir() {
    let err = Project::load(Path::new("/nonexistent/kiln/project")).unwrap_err();
    assert!(matches!(err, CoreError::ProjectNotFound { .. }));
}
