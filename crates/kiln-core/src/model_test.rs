use super::*;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_from_file_with_config() {
    let dir = tempfile::tempdir().unwrap();
    let sql = write(
        dir.path(),
        "heart_rate.sql",
        "SELECT * FROM {{ ref('health') }}",
    );
    write(
        dir.path(),
        "heart_rate.yml",
        r#"
description: Heart rate samples
materialized: table
depends_on: [health]
labels:
  team: wearables
cluster_by: [user_id]
"#,
    );

    let model = Model::from_file(&sql, Materialization::View).unwrap();
    assert_eq!(model.unique_name(), "heart_rate");
    assert_eq!(model.materialization_kind(), "table");
    assert_eq!(model.materialization().unwrap(), Materialization::Table);
    assert_eq!(model.dependencies(), &[ModelName::parse("health", "t").unwrap()]);
    assert_eq!(model.description(), Some("Heart rate samples"));
    assert_eq!(model.labels().get("team").map(String::as_str), Some("wearables"));
    assert_eq!(model.cluster_by(), &["user_id".to_string()]);
    assert!(model.compiled_source().unwrap().contains("ref('health')"));
}

#[test]
fn test_from_file_without_config_uses_default_kind() {
    let dir = tempfile::tempdir().unwrap();
    let sql = write(dir.path(), "health.sql", "SELECT 1 AS id");

    let model = Model::from_file(&sql, Materialization::Table).unwrap();
    assert_eq!(model.materialization_kind(), "table");
    assert!(model.dependencies().is_empty());
    assert!(model.labels().is_empty());
    assert_eq!(model.description(), None);
}

#[test]
fn test_bogus_kind_is_kept_until_dispatch() {
    let config = ModelConfig {
        materialized: Some("bogus".to_string()),
        ..Default::default()
    };
    let model = Model::new(ModelName::parse("m", "t").unwrap(), "SELECT 1", config);

    assert_eq!(model.materialization_kind(), "bogus");
    assert!(matches!(
        model.materialization(),
        Err(CoreError::UnknownMaterialization { .. })
    ));
}

#[test]
fn test_invalid_yaml_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let sql = write(dir.path(), "broken.sql", "SELECT 1");
    write(dir.path(), "broken.yml", "depends_on: {not: a list}");

    let err = Model::from_file(&sql, Materialization::View).unwrap_err();
    match err {
        CoreError::YamlParse { path, .. } => assert!(path.ends_with("broken.yml")),
        other => panic!("unexpected error: {other}"),
    }
}
