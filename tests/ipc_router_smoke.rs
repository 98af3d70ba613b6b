mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn health_reports_version_and_tracks_workspace_selection() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let before = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(
        before.get("version").and_then(|v| v.as_str()),
        Some(env!("CARGO_PKG_VERSION"))
    );
    assert!(before.get("workspacePath").is_none() || before["workspacePath"].is_null());

    let workspace = temp_dir("attendanced-health");
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let after = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));
    assert_eq!(
        after.get("workspacePath").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );
}

#[test]
fn unknown_methods_are_rejected_not_dropped() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.delete",
        json!({}),
    );
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some("not_implemented")
    );
    assert!(error
        .get("message")
        .and_then(|v| v.as_str())
        .is_some_and(|m| m.contains("attendance.delete")));
}

#[test]
fn malformed_dates_are_parameter_errors() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "catalog.months",
        json!({ "today": "June 2025" }),
    );
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some("bad_params")
    );
}
