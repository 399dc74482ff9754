//! Build → diagnose → patch → rebuild loop
//!
//! [`FixLoop`] builds a preset, and while the build fails it asks the AI
//! backend for a patch, checks the patch against the project conventions,
//! applies it and rebuilds. It stops on the first success, a rejected patch,
//! a backend error, an interrupted build, or when the iteration bound is hit.

use crate::ai::AiBackend;
use crate::build::{BuildError, BuildOrchestrator, BuildResult, Termination};
use crate::config::Preset;
use crate::context::{ContextAssembler, ContextRequest};
use crate::patch::{CommitOutcome, PatchError, PatchKind, PatchManager};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_MAX_ITERATIONS: usize = 3;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Why the loop stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FixOutcome {
    Succeeded,
    IterationsExhausted,
    BuildInterrupted { termination: Termination },
    BackendFailed { message: String },
    PatchRejected { reason: String },
}

/// One round of ask-apply-rebuild
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub errors_before: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_kind: Option<PatchKind>,
    /// Files the patch would leave with convention violations
    pub non_compliant_files: Vec<String>,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors_after: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixReport {
    pub outcome: FixOutcome,
    pub iterations: Vec<IterationRecord>,
    pub final_result: BuildResult,
}

impl FixReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == FixOutcome::Succeeded
    }
}

pub struct FixLoop {
    orchestrator: Arc<BuildOrchestrator>,
    assembler: ContextAssembler,
    backend: Arc<dyn AiBackend>,
    patches: PatchManager,
    max_iterations: usize,
    progress: Arc<dyn ProgressHandler>,
}

impl FixLoop {
    pub fn new(
        orchestrator: Arc<BuildOrchestrator>,
        assembler: ContextAssembler,
        backend: Arc<dyn AiBackend>,
        patches: PatchManager,
    ) -> Self {
        Self {
            orchestrator,
            assembler,
            backend,
            patches,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            progress: Arc::new(NoOpHandler),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn patches(&self) -> &PatchManager {
        &self.patches
    }

    pub async fn run(&mut self, preset: &Preset, root: &Path) -> Result<FixReport, WorkflowError> {
        let mut result = self.orchestrator.build(preset, root).await?;
        let mut iterations: Vec<IterationRecord> = Vec::new();

        let outcome = loop {
            if result.success {
                break FixOutcome::Succeeded;
            }
            if result.termination != Termination::Exited {
                break FixOutcome::BuildInterrupted {
                    termination: result.termination,
                };
            }
            if iterations.len() >= self.max_iterations {
                break FixOutcome::IterationsExhausted;
            }

            let iteration = iterations.len() + 1;
            let errors_before = result.error_count();
            self.progress.on_progress(&ProgressEvent::FixIterationStarted {
                iteration,
                errors: errors_before,
            });

            let mut record = IterationRecord {
                iteration,
                errors_before,
                patch_id: None,
                patch_kind: None,
                non_compliant_files: Vec::new(),
                applied: false,
                commit: None,
                errors_after: None,
            };

            let envelope = self.assembler.assemble(&ContextRequest::fix_for(&result));
            let response = match self.backend.complete(&envelope).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(
                        backend = self.backend.name(),
                        transient = e.is_transient(),
                        error = %e,
                        "AI backend failed"
                    );
                    iterations.push(record);
                    break FixOutcome::BackendFailed {
                        message: e.to_string(),
                    };
                }
            };

            let id = self.patches.generate_patch(&response, Vec::new(), true);
            record.patch_id = Some(id);
            record.patch_kind = Some(self.patches.classify(&response));

            // Unresolvable edits surface again, with a reason, from apply()
            if let Ok(violations) = self.patches.check_compliance(id) {
                record.non_compliant_files = violations.into_keys().collect();
            }
            self.patches
                .set_convention_compliant(id, record.non_compliant_files.is_empty())?;

            match self.patches.apply(id).await {
                Ok(report) => {
                    record.applied = true;
                    record.commit = Some(report.commit);
                }
                Err(e) => {
                    iterations.push(record);
                    break FixOutcome::PatchRejected {
                        reason: e.to_string(),
                    };
                }
            }

            result = self.orchestrator.build(preset, root).await?;
            record.errors_after = Some(result.error_count());
            info!(
                iteration,
                errors_before,
                errors_after = result.error_count(),
                success = result.success,
                "Fix iteration complete"
            );
            iterations.push(record);
        };

        Ok(FixReport {
            outcome,
            iterations,
            final_result: result,
        })
    }
}
