//! Patch application integration tests
//!
//! Covers the all-or-nothing guarantees of the patch manager:
//! - missing targets and unmatched search text leave the tree untouched
//! - diff scratch files never outlive the apply call
//! - commits go through the VCS runner only when policy allows
//! - convention auto-fixes converge

use plugwright::config::{CommitPolicy, ConventionSettings};
use plugwright::diagnostics::validate_conventions;
use plugwright::patch::{CommitOutcome, PatchError, PatchKind, PatchManager, PatchStatus};
use plugwright::process::MockCommandRunner;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const DIFF: &str = "\
diff --git a/src/plugin.cpp b/src/plugin.cpp
--- a/src/plugin.cpp
+++ b/src/plugin.cpp
@@ -1,3 +1,3 @@
 #include \"plugin.hpp\"
-int value = 1
+int value = 1;

";

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src/ui")).unwrap();
    fs::write(
        dir.path().join("src/plugin.cpp"),
        "#include \"plugin.hpp\"\nint value = 1\n\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("src/plugin.hpp"),
        "#pragma once\n\nclass Plugin {};\n",
    )
    .unwrap();
    dir
}

fn read(dir: &TempDir, path: &str) -> String {
    fs::read_to_string(dir.path().join(path)).unwrap()
}

#[tokio::test]
async fn test_missing_target_modifies_nothing() {
    let dir = project();
    let runner = Arc::new(MockCommandRunner::new());
    let mut manager = PatchManager::new(dir.path(), runner.clone());

    let edits = "\
FILE: src/plugin.cpp
<<<<<<< SEARCH
int value = 1
=======
int value = 2;
>>>>>>> REPLACE
FILE: src/missing.cpp
<<<<<<< SEARCH
=======
int other = 0;
>>>>>>> REPLACE
";
    let id = manager.generate_patch(edits, Vec::new(), true);
    let before = read(&dir, "src/plugin.cpp");

    let err = manager.apply(id).await.unwrap_err();
    assert!(matches!(err, PatchError::MissingTarget(ref target) if target == "src/missing.cpp"));
    assert_eq!(read(&dir, "src/plugin.cpp"), before);
    assert!(!dir.path().join("src/missing.cpp").exists());
    assert_eq!(manager.get(id).unwrap().status, PatchStatus::Invalid);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_edit_instructions_are_all_or_nothing() {
    let dir = project();
    let mut manager = PatchManager::new(dir.path(), Arc::new(MockCommandRunner::new()));

    let edits = "\
FILE: src/plugin.cpp
<<<<<<< SEARCH
int value = 1
=======
int value = 1;
>>>>>>> REPLACE
FILE: src/plugin.hpp
<<<<<<< SEARCH
class Widget {};
=======
class Widget final {};
>>>>>>> REPLACE
";
    let id = manager.generate_patch(edits, Vec::new(), true);
    assert_eq!(manager.get(id).unwrap().kind(), PatchKind::EditInstructions);

    let err = manager.apply(id).await.unwrap_err();
    match err {
        PatchError::SearchTextNotFound { file, .. } => assert_eq!(file, "src/plugin.hpp"),
        other => panic!("Expected SearchTextNotFound, got {:?}", other),
    }

    // The first step resolved but was never written
    assert_eq!(read(&dir, "src/plugin.cpp"), "#include \"plugin.hpp\"\nint value = 1\n\n");
    assert_eq!(read(&dir, "src/plugin.hpp"), "#pragma once\n\nclass Plugin {};\n");
}

#[tokio::test]
async fn test_edit_instructions_apply_every_step() {
    let dir = project();
    let mut manager = PatchManager::new(dir.path(), Arc::new(MockCommandRunner::new()))
        .with_commit_policy(CommitPolicy::Never);

    let edits = "\
FILE: src/plugin.cpp
<<<<<<< SEARCH
int value = 1
=======
int value = 1;
>>>>>>> REPLACE
FILE: src/plugin.hpp
<<<<<<< SEARCH
class Plugin {};
=======
class Plugin {
public:
    int value() const;
};
>>>>>>> REPLACE
";
    let id = manager.generate_patch(edits, Vec::new(), true);
    let report = manager.apply(id).await.unwrap();

    assert_eq!(report.files, vec!["src/plugin.cpp", "src/plugin.hpp"]);
    assert_eq!(report.commit, CommitOutcome::Skipped);
    assert!(read(&dir, "src/plugin.cpp").contains("int value = 1;\n"));
    assert!(read(&dir, "src/plugin.hpp").contains("int value() const;"));
    assert_eq!(manager.get(id).unwrap().status, PatchStatus::Valid);

    // No staging files left next to the targets
    let leftovers: Vec<PathBuf> = fs::read_dir(dir.path().join("src"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .collect();
    assert_eq!(leftovers.len(), 2);
}

#[tokio::test]
async fn test_diff_scratch_file_removed() {
    let dir = project();
    let seen: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
    let runner = {
        let seen = Arc::clone(&seen);
        Arc::new(MockCommandRunner::with_observer(move |command, _cwd| {
            if let Some(last) = command.args.last() {
                if last.ends_with(".patch") {
                    let path = PathBuf::from(last);
                    assert!(path.exists(), "scratch file must exist while git runs");
                    seen.lock().unwrap().push(path);
                }
            }
        }))
    };
    let mut manager = PatchManager::new(dir.path(), runner.clone())
        .with_commit_policy(CommitPolicy::Never);

    let id = manager.generate_patch(DIFF, Vec::new(), true);
    assert_eq!(manager.get(id).unwrap().target_files, vec!["src/plugin.cpp"]);
    manager.apply(id).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
    assert!(!seen[0].exists());

    let lines = runner.call_lines();
    assert!(lines[0].starts_with("git apply --check --whitespace=nowarn "));
    assert!(lines[1].starts_with("git apply --whitespace=nowarn "));
    assert!(runner.calls().iter().all(|c| c.cwd == dir.path()));
}

#[tokio::test]
async fn test_diff_scratch_file_removed_on_failure() {
    let dir = project();
    let seen: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
    let runner = {
        let seen = Arc::clone(&seen);
        Arc::new(MockCommandRunner::with_observer(move |command, _cwd| {
            if let Some(last) = command.args.last() {
                *seen.lock().unwrap() = Some(PathBuf::from(last));
            }
        }))
    };
    runner.push_output(1, "", "error: patch failed: src/plugin.cpp:1");
    let mut manager = PatchManager::new(dir.path(), runner.clone());

    let id = manager.generate_patch(DIFF, Vec::new(), true);
    let err = manager.apply(id).await.unwrap_err();

    assert!(matches!(err, PatchError::VcsFailed { .. }));
    assert_eq!(runner.calls().len(), 1);
    let scratch = seen.lock().unwrap().clone().unwrap();
    assert!(!scratch.exists());
}

#[tokio::test]
async fn test_commit_goes_through_runner() {
    let dir = project();
    let runner = Arc::new(MockCommandRunner::new());
    let mut manager = PatchManager::new(dir.path(), runner.clone())
        .with_commit_policy(CommitPolicy::Always);

    let id = manager.generate_patch(DIFF, Vec::new(), false);
    let report = manager.apply(id).await.unwrap();

    let message = match report.commit {
        CommitOutcome::Committed { message } => message,
        other => panic!("Expected a commit, got {:?}", other),
    };
    assert!(message.contains("Convention-compliant: no"));

    let calls = runner.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[2].line(), "git add -- src/plugin.cpp");
    assert_eq!(calls[3].command.args[0], "commit");
    assert_eq!(calls[3].command.args[2], message);
}

#[tokio::test]
async fn test_compliant_policy_skips_non_compliant_patch() {
    let dir = project();
    let runner = Arc::new(MockCommandRunner::new());
    let mut manager = PatchManager::new(dir.path(), runner.clone());

    let id = manager.generate_patch(DIFF, Vec::new(), true);
    manager.set_convention_compliant(id, false).unwrap();
    let report = manager.apply(id).await.unwrap();

    assert_eq!(report.commit, CommitOutcome::Skipped);
    assert_eq!(runner.calls().len(), 2);
}

#[test]
fn test_auto_fix_converges() {
    let dir = project();
    let settings = ConventionSettings::default();
    fs::write(
        dir.path().join("src/ui/dock.hpp"),
        "// Dock widget\n#include <QDockWidget>\n\nclass Dock : public QDockWidget {\n    Q_OBJECT\n};\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("src/ui/dock.cpp"),
        "#include \"dock.hpp\"\n\nvoid Dock::on_clicked() { emit closed(); }\n",
    )
    .unwrap();

    let manager = PatchManager::new(dir.path(), Arc::new(MockCommandRunner::new()))
        .with_conventions(settings.clone());

    for file in ["src/ui/dock.hpp", "src/ui/dock.cpp"] {
        let path = Path::new(file);
        let violations = validate_conventions(path, &read(&dir, file), &settings);
        assert!(!violations.is_empty(), "{} should start with violations", file);

        assert!(manager.auto_fix_conventions(path, &violations).unwrap());
        let fixed = read(&dir, file);
        assert!(validate_conventions(path, &fixed, &settings).is_empty());

        assert!(!manager.auto_fix_conventions(path, &violations).unwrap());
        assert_eq!(read(&dir, file), fixed);
    }

    assert!(read(&dir, "src/ui/dock.hpp").contains("// Dock widget\n\n#pragma once\n"));
    assert!(read(&dir, "src/ui/dock.cpp").ends_with("#include \"moc_dock.cpp\"\n"));
}
