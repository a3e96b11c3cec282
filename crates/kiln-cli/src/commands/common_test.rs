use super::*;

#[test]
fn test_calculate_column_widths() {
    let widths = calculate_column_widths(
        &["NAME", "KIND"],
        &[
            vec!["heart_rate_agg".to_string(), "view".to_string()],
            vec!["hr".to_string(), "ephemeral".to_string()],
        ],
    );
    assert_eq!(widths, vec![14, 9]);
}

#[test]
fn test_format_table() {
    let table = format_table(
        &["NAME", "KIND"],
        &[vec!["orders".to_string(), "table".to_string()]],
    );
    assert_eq!(table, "NAME    KIND\n------  -----\norders  table");
}

#[test]
fn test_exit_code_displays_nothing() {
    assert_eq!(ExitCode(1).to_string(), "");
}

#[test]
fn test_write_json_results_creates_parent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("target").join("run_results.json");
    let data = CommandResults {
        timestamp: Utc::now(),
        elapsed_secs: 0.5,
        success_count: 1,
        failure_count: 0,
        skipped_count: 0,
        results: vec!["ok"],
    };

    write_json_results(&path, &data).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed["success_count"], 1);
    assert_eq!(parsed["results"][0], "ok");
}
