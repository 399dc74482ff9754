//! End-to-end fix loop tests
//!
//! Real `sh` builds that fail until a source file contains the expected
//! text, a scripted AI backend, and a mock VCS runner.

#![cfg(unix)]

use plugwright::ai::{BackendError, MockBackend, MockResponse};
use plugwright::build::{BuildOrchestrator, Termination};
use plugwright::config::{CommitPolicy, Preset, ProjectConfig};
use plugwright::context::{ContextAssembler, Intent};
use plugwright::patch::{CommitOutcome, PatchKind, PatchManager, PatchStatus};
use plugwright::process::MockCommandRunner;
use plugwright::workflow::{FixLoop, FixOutcome};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const BUILD: &str = r#"sh -c 'grep -q "value = 1;" src/plugin.cpp || { echo "src/plugin.cpp:2:14: error: expected ; at end of declaration" >&2; exit 1; }'"#;

const FIX: &str = "\
The declaration is missing a semicolon.

FILE: src/plugin.cpp
<<<<<<< SEARCH
int value = 1
=======
int value = 1;
>>>>>>> REPLACE
";

const NO_OP: &str = "\
FILE: src/plugin.cpp
<<<<<<< SEARCH
=======
// retry
>>>>>>> REPLACE
";

struct Fixture {
    dir: TempDir,
    backend: Arc<MockBackend>,
    runner: Arc<MockCommandRunner>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(
            dir.path().join("src/plugin.cpp"),
            "#include <obs-module.h>\nint value = 1\n",
        )
        .unwrap();

        Self {
            dir,
            backend: Arc::new(MockBackend::new()),
            runner: Arc::new(MockCommandRunner::new()),
        }
    }

    fn preset(&self) -> Preset {
        Preset {
            id: "linux-x86_64".to_string(),
            name: String::new(),
            configure: "true".to_string(),
            build: BUILD.to_string(),
            clean: None,
            build_dir: PathBuf::from("build_x86_64"),
        }
    }

    fn fix_loop(&self, max_iterations: usize) -> FixLoop {
        let orchestrator =
            Arc::new(BuildOrchestrator::new().with_timeout(Duration::from_secs(30)));
        let assembler = ContextAssembler::real(self.dir.path(), ProjectConfig::default());
        let patches = PatchManager::new(self.dir.path(), self.runner.clone())
            .with_commit_policy(CommitPolicy::Always);

        FixLoop::new(orchestrator, assembler, self.backend.clone(), patches)
            .with_max_iterations(max_iterations)
    }

    fn source(&self) -> String {
        fs::read_to_string(self.dir.path().join("src/plugin.cpp")).unwrap()
    }
}

#[tokio::test]
async fn test_fix_loop_repairs_build() {
    let fixture = Fixture::new();
    fixture.backend.add_response(MockResponse::text(FIX));

    let mut fix_loop = fixture.fix_loop(3);
    let report = fix_loop.run(&fixture.preset(), fixture.dir.path()).await.unwrap();

    assert!(report.succeeded());
    assert!(report.final_result.success);
    assert_eq!(report.iterations.len(), 1);

    let record = &report.iterations[0];
    assert_eq!(record.errors_before, 1);
    assert_eq!(record.errors_after, Some(0));
    assert_eq!(record.patch_kind, Some(PatchKind::EditInstructions));
    assert!(record.applied);
    assert!(record.non_compliant_files.is_empty());
    assert!(matches!(record.commit, Some(CommitOutcome::Committed { .. })));

    assert_eq!(fixture.source(), "#include <obs-module.h>\nint value = 1;\n");

    let requests = fixture.backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].intent, Intent::Fix);
    assert!(requests[0].user_prompt.contains("expected ; at end of declaration"));
    assert!(requests[0]
        .file_context
        .iter()
        .any(|f| f.path.ends_with("src/plugin.cpp")));

    let patch_id = record.patch_id.unwrap();
    assert_eq!(
        fix_loop.patches().get(patch_id).unwrap().status,
        PatchStatus::Valid
    );
    let git = fixture.runner.call_lines();
    assert_eq!(git[0], "git add -- src/plugin.cpp");
}

#[tokio::test]
async fn test_passing_build_needs_no_backend() {
    let fixture = Fixture::new();
    fs::write(
        fixture.dir.path().join("src/plugin.cpp"),
        "int value = 1;\n",
    )
    .unwrap();

    let report = fixture
        .fix_loop(3)
        .run(&fixture.preset(), fixture.dir.path())
        .await
        .unwrap();

    assert_eq!(report.outcome, FixOutcome::Succeeded);
    assert!(report.iterations.is_empty());
    assert!(fixture.backend.requests().is_empty());
}

#[tokio::test]
async fn test_iteration_bound() {
    let fixture = Fixture::new();
    fixture
        .backend
        .add_responses([MockResponse::text(NO_OP), MockResponse::text(NO_OP)]);

    let report = fixture
        .fix_loop(2)
        .run(&fixture.preset(), fixture.dir.path())
        .await
        .unwrap();

    assert_eq!(report.outcome, FixOutcome::IterationsExhausted);
    assert_eq!(report.iterations.len(), 2);
    assert!(report.iterations.iter().all(|r| r.applied));
    assert_eq!(report.final_result.error_count(), 1);
    assert_eq!(fixture.backend.remaining_responses(), 0);
    assert!(fixture.source().ends_with("// retry\n// retry\n"));
}

#[tokio::test]
async fn test_backend_failure_stops_loop() {
    let fixture = Fixture::new();
    fixture
        .backend
        .add_response(MockResponse::error(BackendError::Timeout { seconds: 180 }));

    let report = fixture
        .fix_loop(3)
        .run(&fixture.preset(), fixture.dir.path())
        .await
        .unwrap();

    assert!(matches!(report.outcome, FixOutcome::BackendFailed { .. }));
    assert_eq!(report.iterations.len(), 1);
    assert!(report.iterations[0].patch_id.is_none());
    assert_eq!(fixture.source(), "#include <obs-module.h>\nint value = 1\n");
}

#[tokio::test]
async fn test_rejected_patch_stops_loop_without_changes() {
    let fixture = Fixture::new();
    fixture.backend.add_response(MockResponse::text(
        "FILE: src/plugin.cpp\n<<<<<<< SEARCH\nint missing = 0\n=======\nint missing = 0;\n>>>>>>> REPLACE\n",
    ));

    let report = fixture
        .fix_loop(3)
        .run(&fixture.preset(), fixture.dir.path())
        .await
        .unwrap();

    match &report.outcome {
        FixOutcome::PatchRejected { reason } => assert!(reason.contains("src/plugin.cpp")),
        other => panic!("Expected PatchRejected, got {:?}", other),
    }
    assert!(!report.iterations[0].applied);
    assert_eq!(fixture.source(), "#include <obs-module.h>\nint value = 1\n");
    assert!(fixture.runner.calls().is_empty());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"]["outcome"], "patch_rejected");
    assert!(json["outcome"]["reason"]
        .as_str()
        .unwrap()
        .contains("src/plugin.cpp"));
    assert_eq!(json["iterations"][0]["applied"], false);
}

#[tokio::test]
async fn test_interrupted_build_is_not_patched() {
    let fixture = Fixture::new();
    let mut preset = fixture.preset();
    preset.build = "sleep 5".to_string();

    let orchestrator = Arc::new(BuildOrchestrator::new().with_timeout(Duration::from_millis(200)));
    let patches = PatchManager::new(fixture.dir.path(), fixture.runner.clone());
    let assembler = ContextAssembler::real(fixture.dir.path(), ProjectConfig::default());
    let mut fix_loop = FixLoop::new(orchestrator, assembler, fixture.backend.clone(), patches);

    let report = fix_loop.run(&preset, fixture.dir.path()).await.unwrap();

    assert_eq!(
        report.outcome,
        FixOutcome::BuildInterrupted {
            termination: Termination::TimedOut
        }
    );
    assert!(fixture.backend.requests().is_empty());
}
