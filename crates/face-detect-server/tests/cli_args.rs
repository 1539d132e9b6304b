//! CLI argument validation tests.
//!
//! Tests command-line parsing, the inspect command and startup failures.

#![allow(clippy::unwrap_used)]
#![allow(deprecated)] // cargo_bin deprecation

use assert_cmd::Command;
use face_detect_test_support::write_weights_fixture;
use predicates::prelude::*;

/// Command with config lookup pointed at an empty directory.
fn face_detect(config_home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("face-detect").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG")
        .current_dir(config_home);
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let temp_dir = tempfile::tempdir().unwrap();
    face_detect(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve").and(predicate::str::contains("inspect")));
}

#[test]
fn test_invalid_port_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    face_detect(temp_dir.path())
        .args(["--port", "99999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--port"));
}

#[test]
fn test_invalid_variant_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    face_detect(temp_dir.path())
        .args(["serve", "--variant", "huge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown variant"));
}

#[test]
fn test_serve_missing_model_fails_before_binding() {
    let temp_dir = tempfile::tempdir().unwrap();
    let model = temp_dir.path().join("missing.safetensors");

    face_detect(temp_dir.path())
        .arg("serve")
        .arg("--model")
        .arg(&model)
        .args(["--cpu", "--port", "0"])
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("error:")
                .and(predicate::str::contains("missing.safetensors"))
                .and(predicate::str::contains("Server listening").not()),
        );
}

// === Inspect ===

#[test]
fn test_inspect_missing_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    face_detect(temp_dir.path())
        .args(["inspect", "/nonexistent/best.safetensors"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to read model file"));
}

#[test]
fn test_inspect_garbage_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("garbage.safetensors");
    std::fs::write(&path, b"not safetensors at all").unwrap();

    face_detect(temp_dir.path())
        .arg("inspect")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_inspect_prints_metadata() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("best.safetensors");
    write_weights_fixture(
        &path,
        &[("task", "detect"), ("names", "{0: 'face'}"), ("stride", "32")],
    )
    .unwrap();

    face_detect(temp_dir.path())
        .arg("inspect")
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Task: detect")
                .and(predicate::str::contains("0: face"))
                .and(predicate::str::contains("Variant: YOLOv8n"))
                .and(predicate::str::contains("Head classes: 1"))
                .and(predicate::str::contains("stride: 32"))
                .and(predicate::str::contains("Tensors:").not()),
        );
}

#[test]
fn test_inspect_lists_tensors() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("best.safetensors");
    write_weights_fixture(&path, &[]).unwrap();

    face_detect(temp_dir.path())
        .arg("inspect")
        .arg(&path)
        .arg("--tensors")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("No class names found")
                .and(predicate::str::contains("net.b1.0.conv.weight f32 [16, 3, 3, 3]")),
        );
}

#[test]
fn test_inspect_json() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("best.safetensors");
    write_weights_fixture(&path, &[("names", r#"{"0": "face"}"#)]).unwrap();

    let output = face_detect(temp_dir.path())
        .arg("inspect")
        .arg(&path)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["class_names"]["0"], "face");
    assert_eq!(report["num_classes"], 1);
    assert_eq!(report["variant"], "n");
    assert_eq!(report["num_tensors"], 2);
    assert_eq!(report["tensors"], serde_json::json!([]));
}
