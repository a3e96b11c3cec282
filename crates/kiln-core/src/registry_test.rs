use super::*;
use crate::model::{Model, ModelConfig};

fn model(name: &str) -> Arc<dyn ModelDescriptor> {
    Arc::new(Model::new(
        ModelName::parse(name, "test").unwrap(),
        "SELECT 1",
        ModelConfig::default(),
    ))
}

#[test]
fn test_register_and_get() {
    let mut registry = ModelRegistry::new();
    registry.register(model("health")).unwrap();
    registry.register(model("heart_rate")).unwrap();

    assert_eq!(registry.len(), 2);
    assert!(registry.get("health").is_some());
    assert!(registry.get("steps").is_none());
    assert_eq!(registry.names()[0], "health");
    assert_eq!(registry.names()[1], "heart_rate");
}

#[test]
fn test_duplicate_rejected() {
    let mut registry = ModelRegistry::new();
    registry.register(model("health")).unwrap();

    let err = registry.register(model("health")).unwrap_err();
    assert!(matches!(err, CoreError::DuplicateModel { name } if name == "health"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_resolve_artifact_by_stem() {
    let mut registry = ModelRegistry::new();
    registry.register(model("heart_rate")).unwrap();

    let resolved = registry
        .resolve_artifact(Path::new("target/compiled/heart_rate.sql"))
        .unwrap();
    assert_eq!(resolved.unique_name(), "heart_rate");

    let err = registry
        .resolve_artifact(Path::new("target/compiled/steps.sql"))
        .unwrap_err();
    assert!(matches!(err, CoreError::ModelNotFound { .. }));
}
