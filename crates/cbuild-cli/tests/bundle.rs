//! Integration tests for the `cbuild` binary.

use serial_test::serial;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "cbuild-cli", "--bin", "cbuild", "--"]);
    cmd.env_remove("NODE_ENV").env_remove("RUST_LOG");
    cmd
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn project(base: &Path) {
    write(
        &base.join("package.json"),
        r#"{"name": "app", "main": "src/main.js"}"#,
    );
    write(
        &base.join("src/main.js"),
        "var util = require('./util');\nvar pad = require('leftpad');\n",
    );
    write(&base.join("src/util/index.js"), "module.exports = {};\n");
    write(&base.join("node_modules/leftpad/index.js"), "module.exports = 0;\n");
}

#[test]
#[serial]
fn test_bundle_human_output() {
    let dir = tempdir().unwrap();
    project(dir.path());

    let output = cargo_bin()
        .arg("-p")
        .arg(dir.path())
        .arg("-o")
        .arg(dir.path().join("bundle.js"))
        .arg("-C")
        .arg(dir.path().join("config.js"))
        .args(["-v"])
        .output()
        .expect("Failed to run cbuild");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with(
        "Bundling for production (NODE_ENV = undefined and --debug not set)"
    ));
    assert!(stdout.contains("\nsrc/main.js\n  src/util/index.js\n  node_modules/leftpad/index.js\n"));
    assert!(stdout.trim_end().ends_with("Build complete!"));

    let config = std::fs::read_to_string(dir.path().join("config.js")).unwrap();
    assert!(config.starts_with("System.config("));
    assert!(config.contains("\"leftpad\": \"node_modules/leftpad\""));
    assert!(dir.path().join("bundle.js").is_file());
}

#[test]
#[serial]
fn test_bundle_json_summary() {
    let dir = tempdir().unwrap();
    project(dir.path());

    let output = cargo_bin()
        .arg("-p")
        .arg(dir.path())
        .args(["--json", "-x", "--debug", "no"])
        .output()
        .expect("Failed to run cbuild");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("Output should be valid JSON");

    assert_eq!(json["ok"], true);
    assert_eq!(
        json["modules"],
        serde_json::json!([
            "node_modules/leftpad/index.js",
            "src/main.js",
            "src/util/index.js"
        ])
    );
    assert!(json["duration_ms"].is_u64());
}

#[test]
#[serial]
fn test_node_env_forces_debug() {
    let dir = tempdir().unwrap();
    project(dir.path());

    let output = cargo_bin()
        .env("NODE_ENV", "development")
        .arg("-p")
        .arg(dir.path())
        .output()
        .expect("Failed to run cbuild");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with(
        "Bundling for development (NODE_ENV = development and --debug not set)"
    ));
}

#[test]
#[serial]
fn test_build_error_exits_nonzero() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("package.json"), r#"{"name": "app"}"#);

    let output = cargo_bin()
        .arg("-p")
        .arg(dir.path())
        .output()
        .expect("Failed to run cbuild");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Build error:"));
}

#[test]
#[serial]
fn test_quiet_suppresses_output() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("package.json"), r#"{"name": "app"}"#);

    let output = cargo_bin()
        .arg("-p")
        .arg(dir.path())
        .arg("-q")
        .output()
        .expect("Failed to run cbuild");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(!String::from_utf8_lossy(&output.stderr).contains("Build error:"));
}
