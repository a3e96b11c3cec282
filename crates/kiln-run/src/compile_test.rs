use super::*;
use crate::test_utils::make_model;
use kiln_core::ModelRegistry;

fn vars(yaml: &str) -> HashMap<String, serde_yaml::Value> {
    serde_yaml::from_str(yaml).unwrap()
}

#[test]
fn test_ref_renders_qualified_identifier() {
    let compiler = Compiler::new(&HashMap::new(), Some("analytics"));
    let model = make_model(
        "heart_rate_agg",
        &["heart_rate"],
        "table",
        "SELECT user_id, avg(bpm) FROM {{ ref('heart_rate') }} GROUP BY 1",
    );

    let sql = compiler.compile(model.as_ref()).unwrap();
    assert_eq!(
        sql,
        "SELECT user_id, avg(bpm) FROM \"analytics\".\"heart_rate\" GROUP BY 1"
    );
}

#[test]
fn test_ref_without_dataset() {
    let compiler = Compiler::new(&HashMap::new(), None);
    let model = make_model("b", &["a"], "view", "SELECT * FROM {{ ref('a') }}");
    assert_eq!(
        compiler.compile(model.as_ref()).unwrap(),
        "SELECT * FROM \"a\""
    );
}

#[test]
fn test_undeclared_ref_still_renders() {
    let compiler = Compiler::new(&HashMap::new(), None);
    let model = make_model("b", &[], "view", "SELECT * FROM {{ ref('a') }}");
    assert_eq!(
        compiler.compile(model.as_ref()).unwrap(),
        "SELECT * FROM \"a\""
    );
}

#[test]
fn test_var_and_default() {
    let compiler = Compiler::new(&vars("start_date: '2024-01-01'\nlimit: 10"), None);
    let model = make_model(
        "m",
        &[],
        "view",
        "SELECT '{{ var('start_date') }}', {{ var('limit') }}, '{{ var('missing', 'x') }}'",
    );
    assert_eq!(
        compiler.compile(model.as_ref()).unwrap(),
        "SELECT '2024-01-01', 10, 'x'"
    );
}

#[test]
fn test_undefined_var_is_compile_error() {
    let compiler = Compiler::new(&HashMap::new(), None);
    let model = make_model("m", &[], "view", "SELECT {{ var('nope') }}");
    let err = compiler.compile(model.as_ref()).unwrap_err();
    match err {
        RunError::Compile { model, message } => {
            assert_eq!(model, "m");
            assert!(message.contains("nope"), "got: {message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_this() {
    let compiler = Compiler::new(&HashMap::new(), Some("analytics"));
    let model = make_model("m", &[], "table", "-- building {{ this }}\nSELECT 1");
    assert_eq!(
        compiler.compile(model.as_ref()).unwrap(),
        "-- building \"analytics\".\"m\"\nSELECT 1"
    );
}

#[test]
fn test_compile_to_dir_writes_one_file_per_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = ModelRegistry::new();
    registry
        .register(make_model("a", &[], "view", "SELECT 1 AS x"))
        .unwrap();
    registry
        .register(make_model("b", &["a"], "table", "SELECT * FROM {{ ref('a') }}"))
        .unwrap();

    let out = dir.path().join("compiled");
    let written = Compiler::new(&HashMap::new(), None)
        .compile_to_dir(&registry, &out)
        .unwrap();

    assert_eq!(written, vec![out.join("a.sql"), out.join("b.sql")]);
    assert_eq!(
        std::fs::read_to_string(out.join("b.sql")).unwrap(),
        "SELECT * FROM \"a\""
    );
}
