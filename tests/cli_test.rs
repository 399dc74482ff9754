//! CLI integration tests
//!
//! Runs the `plugwright` binary against temporary projects and checks exit
//! codes and machine-readable output.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn plugwright(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_plugwright"))
        .args(args)
        .current_dir(cwd)
        .env("PLUGWRIGHT_COMMIT_POLICY", "never")
        .env_remove("PLUGWRIGHT_AI_COMMAND")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute plugwright")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn write_project(dir: &TempDir, build: &str) {
    let config = serde_json::json!({
        "presets": [{
            "id": "test",
            "name": "Test",
            "configure": "true",
            "build": build,
            "build_dir": "build"
        }]
    });
    fs::write(
        dir.path().join("plugwright.json"),
        serde_json::to_string_pretty(&config).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    let output = plugwright(&["--help"], dir.path());

    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["configure", "build", "clean", "fix", "diagnose", "check", "deps", "context", "patch"] {
        assert!(text.contains(command), "help should mention {}", command);
    }
}

#[test]
fn test_diagnose_json() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("build.log"),
        "[ 50%] Building CXX object\n\
         src/plugin.cpp:12:5: error: use of undeclared identifier 'obs'\n\
         src/plugin.cpp:20:1: warning: unused variable 'x'\n",
    )
    .unwrap();

    let output = plugwright(&["-q", "diagnose", "build.log", "--format", "json"], dir.path());
    assert!(output.status.success());

    let diagnostics: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let diagnostics = diagnostics.as_array().unwrap();
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0]["file"], "src/plugin.cpp");
    assert_eq!(diagnostics[0]["severity"], "error");
}

#[test]
fn test_check_fix_exit_codes() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/plugin.hpp"), "class Plugin {};\n").unwrap();

    let output = plugwright(&["-q", "check", "src/plugin.hpp"], dir.path());
    assert_eq!(output.status.code(), Some(1));

    let output = plugwright(&["-q", "check", "--fix", "src/plugin.hpp"], dir.path());
    assert_eq!(output.status.code(), Some(0));
    assert!(fs::read_to_string(dir.path().join("src/plugin.hpp"))
        .unwrap()
        .starts_with("#pragma once"));
}

#[test]
fn test_config_json() {
    let dir = TempDir::new().unwrap();
    let output = plugwright(&["config", "--format", "json"], dir.path());

    assert!(output.status.success());
    let config: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(config["commit_policy"], "never");
}

#[cfg(unix)]
#[test]
fn test_build_exit_codes() {
    let dir = TempDir::new().unwrap();

    write_project(&dir, "true");
    let output = plugwright(&["-q", "build", "--preset", "test", "--format", "json"], dir.path());
    assert_eq!(output.status.code(), Some(0));
    let result: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["success"], true);

    write_project(&dir, "sh -c 'echo \"a.cpp:1:1: error: boom\" >&2; exit 3'");
    let output = plugwright(&["-q", "build", "--format", "json"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    let result: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["exit_code"], 3);
    assert_eq!(result["diagnostics"][0]["message"], "boom");
}

#[test]
fn test_unknown_preset_fails() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, "true");

    let output = plugwright(&["-q", "build", "--preset", "nope"], dir.path());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_fix_requires_ai_command() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, "false");

    let output = plugwright(&["-q", "fix"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("PLUGWRIGHT_AI_COMMAND"));
}

#[test]
fn test_patch_apply_edit_instructions() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/plugin.cpp"), "int value = 1\n").unwrap();
    fs::write(
        dir.path().join("fix.txt"),
        "FILE: src/plugin.cpp\n<<<<<<< SEARCH\nint value = 1\n=======\nint value = 1;\n>>>>>>> REPLACE\n",
    )
    .unwrap();

    let output = plugwright(&["-q", "patch", "fix.txt", "--format", "json"], dir.path());
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(dir.path().join("src/plugin.cpp")).unwrap(),
        "int value = 1\n"
    );

    let output = plugwright(&["-q", "patch", "fix.txt", "--apply", "--format", "json"], dir.path());
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(summary["patch"]["status"], "valid");
    assert_eq!(summary["applied"]["commit"]["status"], "skipped");
    assert_eq!(
        fs::read_to_string(dir.path().join("src/plugin.cpp")).unwrap(),
        "int value = 1;\n"
    );
}

#[test]
fn test_patch_missing_target_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("fix.diff"),
        "--- a/src/gone.cpp\n+++ b/src/gone.cpp\n@@ -1 +1 @@\n-a\n+b\n",
    )
    .unwrap();

    let output = plugwright(&["-q", "patch", "fix.diff", "--apply"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Target file does not exist: src/gone.cpp"));
}
