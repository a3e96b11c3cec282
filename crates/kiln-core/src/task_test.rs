use super::*;
use crate::model::{Model, ModelConfig};

fn registry(names: &[&str]) -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    for name in names {
        registry
            .register(Arc::new(Model::new(
                ModelName::parse(*name, "test").unwrap(),
                "SELECT 1",
                ModelConfig::default(),
            )))
            .unwrap();
    }
    registry
}

#[test]
fn test_from_artifact_reads_sql() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("heart_rate.sql");
    std::fs::write(&path, "SELECT * FROM analytics.health").unwrap();

    let task = Task::from_artifact(&path, &registry(&["heart_rate"])).unwrap();
    assert_eq!(task.name(), "heart_rate");
    assert_eq!(task.sql, "SELECT * FROM analytics.health");
    assert_eq!(task.source_path, path);
}

#[test]
fn test_from_artifact_unknown_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("steps.sql");
    std::fs::write(&path, "SELECT 1").unwrap();

    let err = Task::from_artifact(&path, &registry(&["heart_rate"])).unwrap_err();
    assert!(matches!(err, CoreError::ModelNotFound { .. }));
}

#[test]
fn test_discover_tasks_sorted_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("heart_rate_agg.sql"), "SELECT 2").unwrap();
    std::fs::write(dir.path().join("heart_rate.sql"), "SELECT 1").unwrap();
    std::fs::write(dir.path().join("orphan.sql"), "SELECT 3").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not sql").unwrap();

    let tasks = discover_tasks(dir.path(), &registry(&["heart_rate", "heart_rate_agg"])).unwrap();
    let names: Vec<&str> = tasks.iter().map(|t| t.name().as_str()).collect();
    assert_eq!(names, vec!["heart_rate", "heart_rate_agg"]);
}

#[test]
fn test_discover_tasks_missing_dir() {
    let tasks = discover_tasks(Path::new("/nonexistent/compiled"), &registry(&[])).unwrap();
    assert!(tasks.is_empty());
}

#[test]
fn test_tasks_by_name() {
    let registry = registry(&["health"]);
    let model = registry.get("health").unwrap().clone();
    let by_name = tasks_by_name(vec![Task::new("SELECT 1", model, "health.sql")]);
    assert!(by_name.contains_key("health"));
}
