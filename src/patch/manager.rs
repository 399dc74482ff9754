use super::edit::{apply_step, parse_edit_instructions};
use super::fixes::{append_meta_object_include, insert_include_guard};
use super::{
    classify, has_diff_markers, targets_from_diff, PatchContent, PatchError, PatchKind,
    PatchOperation, PatchStatus,
};
use crate::config::{CommitPolicy, ConventionSettings};
use crate::diagnostics::{meta_object_include, validate_conventions, ConventionViolation, ViolationKind};
use crate::process::{CommandLine, CommandRunner, TokioCommandRunner};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use crate::source::FileKind;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMMIT_TRAILER: &str = "Assisted-by: plugwright (AI-generated patch)";

/// What happened to the commit step after a successful apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// Policy or the patch's flag said not to commit
    Skipped,
    Committed { message: String },
    /// The tree was patched but `git add`/`git commit` failed
    Failed { reason: String },
}

/// Result of a successful [`PatchManager::apply`]
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub patch_id: Uuid,
    pub kind: PatchKind,
    pub files: Vec<String>,
    pub commit: CommitOutcome,
}

/// Classifies, validates and applies patches inside one project root
pub struct PatchManager {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
    commit_policy: CommitPolicy,
    conventions: ConventionSettings,
    progress: Arc<dyn ProgressHandler>,
    patches: HashMap<Uuid, PatchOperation>,
}

impl PatchManager {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
            commit_policy: CommitPolicy::Compliant,
            conventions: ConventionSettings::default(),
            progress: Arc::new(NoOpHandler),
            patches: HashMap::new(),
        }
    }

    pub fn real(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(TokioCommandRunner::new()))
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    pub fn with_conventions(mut self, conventions: ConventionSettings) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classify(&self, content: &str) -> PatchKind {
        classify(content)
    }

    /// Wraps patch text as a pending operation. With no explicit targets,
    /// they are read from the diff headers or the edit steps.
    pub fn generate_patch(
        &mut self,
        content: &str,
        target_files: Vec<String>,
        convention_compliant: bool,
    ) -> Uuid {
        let parsed = match classify(content) {
            PatchKind::UnifiedDiff => PatchContent::UnifiedDiff(content.to_string()),
            PatchKind::EditInstructions => {
                PatchContent::EditInstructions(parse_edit_instructions(content))
            }
        };

        let target_files = if target_files.is_empty() {
            match &parsed {
                PatchContent::UnifiedDiff(diff) => targets_from_diff(diff),
                PatchContent::EditInstructions(steps) => {
                    let mut files: Vec<String> = Vec::new();
                    for step in steps {
                        if !files.contains(&step.file) {
                            files.push(step.file.clone());
                        }
                    }
                    files
                }
            }
        } else {
            target_files
        };

        let op = PatchOperation {
            id: Uuid::new_v4(),
            content: parsed,
            raw: content.to_string(),
            target_files,
            status: PatchStatus::Pending,
            convention_compliant,
            auto_commit: convention_compliant,
            created_at: Utc::now(),
        };
        debug!(
            patch = %op.id,
            kind = %op.kind(),
            targets = op.target_files.len(),
            "Generated patch"
        );

        let id = op.id;
        self.patches.insert(id, op);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&PatchOperation> {
        self.patches.get(&id)
    }

    pub fn patches(&self) -> impl Iterator<Item = &PatchOperation> {
        self.patches.values()
    }

    /// Pre-apply checks. Never touches the tree or the patch status.
    pub fn validate(&self, id: Uuid) -> Result<(), PatchError> {
        let op = self.patches.get(&id).ok_or(PatchError::NotFound(id))?;
        if op.status != PatchStatus::Pending {
            return Err(PatchError::AlreadyResolved {
                id,
                status: op.status,
            });
        }

        match &op.content {
            PatchContent::UnifiedDiff(diff) if !has_diff_markers(diff) => {
                return Err(PatchError::MissingDiffMarkers)
            }
            PatchContent::EditInstructions(steps) if steps.is_empty() => {
                return Err(PatchError::NoEditSteps)
            }
            _ => {}
        }

        if op.target_files.is_empty() {
            return Err(PatchError::NoTargets);
        }
        for target in &op.target_files {
            let path = self.target_path(target)?;
            if !path.is_file() {
                return Err(PatchError::MissingTarget(target.clone()));
            }
        }

        Ok(())
    }

    /// Violations in the content the patch would leave behind, per target
    /// file. Edit instructions are resolved in memory; diffs are judged on
    /// the current content of their targets.
    pub fn check_compliance(
        &self,
        id: Uuid,
    ) -> Result<BTreeMap<String, Vec<ConventionViolation>>, PatchError> {
        let op = self.patches.get(&id).ok_or(PatchError::NotFound(id))?;

        let contents: BTreeMap<String, String> = match &op.content {
            PatchContent::EditInstructions(steps) => self
                .resolve_edits(steps)?
                .into_iter()
                .map(|(path, content)| (self.relative(&path), content))
                .collect(),
            PatchContent::UnifiedDiff(_) => {
                let mut current = BTreeMap::new();
                for target in &op.target_files {
                    let path = self.target_path(target)?;
                    if let Ok(content) = std::fs::read_to_string(&path) {
                        current.insert(target.clone(), content);
                    }
                }
                current
            }
        };

        Ok(contents
            .into_iter()
            .map(|(file, content)| {
                let violations = validate_conventions(Path::new(&file), &content, &self.conventions);
                (file, violations)
            })
            .filter(|(_, violations)| !violations.is_empty())
            .collect())
    }

    /// Records the compliance verdict; `auto_commit` follows it
    pub fn set_convention_compliant(&mut self, id: Uuid, compliant: bool) -> Result<(), PatchError> {
        let op = self.patches.get_mut(&id).ok_or(PatchError::NotFound(id))?;
        op.convention_compliant = compliant;
        op.auto_commit = compliant;
        Ok(())
    }

    /// Validates and applies a pending patch, then commits when the patch's
    /// `auto_commit` flag and the commit policy allow it. Any failure leaves
    /// the tree untouched and marks the patch invalid.
    pub async fn apply(&mut self, id: Uuid) -> Result<ApplyReport, PatchError> {
        if let Err(e) = self.validate(id) {
            self.reject(id, &e);
            return Err(e);
        }
        let op = self.patches.get(&id).cloned().ok_or(PatchError::NotFound(id))?;

        let applied = match &op.content {
            PatchContent::UnifiedDiff(diff) => self.apply_diff(diff).await,
            PatchContent::EditInstructions(steps) => self.apply_edits(steps),
        };
        if let Err(e) = applied {
            self.reject(id, &e);
            return Err(e);
        }

        if let Some(stored) = self.patches.get_mut(&id) {
            stored.status = PatchStatus::Valid;
        }
        info!(patch = %id, kind = %op.kind(), files = op.target_files.len(), "Applied patch");
        self.progress.on_progress(&ProgressEvent::PatchApplied {
            patch_id: id.to_string(),
            files: op.target_files.len(),
        });

        let commit = if self.commit_policy.should_commit(op.auto_commit) {
            match self.commit(&op).await {
                Ok(message) => CommitOutcome::Committed { message },
                Err(e) => {
                    warn!(patch = %id, error = %e, "Patch applied but commit failed");
                    CommitOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        } else {
            CommitOutcome::Skipped
        };

        Ok(ApplyReport {
            patch_id: id,
            kind: op.kind(),
            files: op.target_files,
            commit,
        })
    }

    /// Applies only the auto-fixable violations to `path`. Writes back only
    /// when the content changed; returns whether it did.
    pub fn auto_fix_conventions(
        &self,
        path: &Path,
        violations: &[ConventionViolation],
    ) -> Result<bool, PatchError> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let original = std::fs::read_to_string(&path).map_err(|source| PatchError::Io {
            path: path.clone(),
            source,
        })?;

        let mut content = original.clone();
        for violation in violations.iter().filter(|v| v.auto_fixable) {
            let fixed = match violation.kind {
                ViolationKind::MissingGuard => {
                    insert_include_guard(&content, &self.conventions.include_guard)
                }
                ViolationKind::MissingMetaObjectInclude => append_meta_object_include(
                    &content,
                    &meta_object_include(&path, &self.conventions),
                ),
                ViolationKind::WrongHeaderSuffix | ViolationKind::UiOutsideUiDir => None,
            };
            if let Some(fixed) = fixed {
                content = fixed;
            }
        }

        if content == original {
            return Ok(false);
        }
        std::fs::write(&path, content).map_err(|source| PatchError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "Fixed convention violations");
        Ok(true)
    }

    /// Commit message summarizing the kinds of files touched
    pub fn commit_message(&self, files: &[String], convention_compliant: bool) -> String {
        let kinds: Vec<FileKind> = files
            .iter()
            .map(|f| FileKind::infer(Path::new(f), &self.conventions.ui_dir))
            .collect();
        let all = |kind: FileKind| !kinds.is_empty() && kinds.iter().all(|k| *k == kind);
        let any = |kind: FileKind| kinds.contains(&kind);

        let subject = if all(FileKind::Ui) {
            "Update UI components"
        } else if all(FileKind::Header) {
            "Update headers"
        } else if all(FileKind::Implementation) {
            "Update implementation"
        } else if all(FileKind::BuildScript) {
            "Update build configuration"
        } else if any(FileKind::Header) && any(FileKind::Implementation) {
            "Update implementation and headers"
        } else {
            "Update project files"
        };

        format!(
            "{}\n\n{}\nConvention-compliant: {}",
            subject,
            COMMIT_TRAILER,
            if convention_compliant { "yes" } else { "no" }
        )
    }

    fn reject(&mut self, id: Uuid, error: &PatchError) {
        if let Some(op) = self.patches.get_mut(&id) {
            if op.status == PatchStatus::Pending {
                op.status = PatchStatus::Invalid;
            }
        }
        warn!(patch = %id, error = %error, "Patch rejected");
        self.progress.on_progress(&ProgressEvent::PatchRejected {
            patch_id: id.to_string(),
            reason: error.to_string(),
        });
    }

    async fn apply_diff(&self, diff: &str) -> Result<(), PatchError> {
        let mut scratch = tempfile::Builder::new()
            .prefix("plugwright-")
            .suffix(".patch")
            .tempfile()
            .map_err(|source| PatchError::Io {
                path: std::env::temp_dir(),
                source,
            })?;

        let mut text = diff.to_string();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        scratch
            .write_all(text.as_bytes())
            .and_then(|_| scratch.flush())
            .map_err(|source| PatchError::Io {
                path: scratch.path().to_path_buf(),
                source,
            })?;

        let scratch_path = scratch.path().to_string_lossy().to_string();
        self.git(&["apply", "--check", "--whitespace=nowarn", &scratch_path], "apply --check")
            .await?;
        self.git(&["apply", "--whitespace=nowarn", &scratch_path], "apply")
            .await?;
        Ok(())
    }

    fn apply_edits(&self, steps: &[super::EditStep]) -> Result<(), PatchError> {
        let resolved = self.resolve_edits(steps)?;

        // Stage every file next to its target before replacing any of them
        let mut staged = Vec::with_capacity(resolved.len());
        for (path, content) in resolved {
            let dir = path.parent().unwrap_or(&self.root);
            let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| PatchError::Io {
                path: path.clone(),
                source,
            })?;
            tmp.write_all(content.as_bytes())
                .and_then(|_| tmp.flush())
                .and_then(|_| {
                    let permissions = std::fs::metadata(&path)?.permissions();
                    tmp.as_file().set_permissions(permissions)
                })
                .map_err(|source| PatchError::Io {
                    path: path.clone(),
                    source,
                })?;
            staged.push((path, tmp));
        }

        for (path, tmp) in staged {
            tmp.persist(&path).map_err(|e| PatchError::Io {
                path: path.clone(),
                source: e.error,
            })?;
        }
        Ok(())
    }

    /// Runs every edit step in memory. Fails without writing if any target
    /// is unreadable or any search text is missing.
    fn resolve_edits(
        &self,
        steps: &[super::EditStep],
    ) -> Result<BTreeMap<PathBuf, String>, PatchError> {
        let mut contents: BTreeMap<PathBuf, String> = BTreeMap::new();

        for step in steps {
            let path = self.target_path(&step.file)?;
            if !contents.contains_key(&path) {
                let current = std::fs::read_to_string(&path).map_err(|source| match source.kind() {
                    std::io::ErrorKind::NotFound => PatchError::MissingTarget(step.file.clone()),
                    _ => PatchError::Io {
                        path: path.clone(),
                        source,
                    },
                })?;
                contents.insert(path.clone(), current);
            }

            let current = contents.get(&path).map(String::as_str).unwrap_or_default();
            let updated = apply_step(current, step).ok_or_else(|| PatchError::SearchTextNotFound {
                file: step.file.clone(),
                search: step.search.lines().next().unwrap_or_default().to_string(),
            })?;
            contents.insert(path, updated);
        }

        Ok(contents)
    }

    async fn commit(&self, op: &PatchOperation) -> Result<String, PatchError> {
        let mut add = vec!["add", "--"];
        add.extend(op.target_files.iter().map(String::as_str));
        self.git(&add, "add").await?;

        let message = self.commit_message(&op.target_files, op.convention_compliant);
        self.git(&["commit", "-m", &message], "commit").await?;

        info!(patch = %op.id, "Committed patch");
        Ok(message)
    }

    async fn git(&self, args: &[&str], operation: &str) -> Result<(), PatchError> {
        let command = CommandLine::new("git", args.iter().copied());
        let output = self
            .runner
            .run(&command, &self.root)
            .await
            .map_err(|e| PatchError::VcsFailed {
                operation: operation.to_string(),
                reason: e.to_string(),
            })?;

        if output.success() {
            Ok(())
        } else {
            Err(PatchError::VcsFailed {
                operation: operation.to_string(),
                reason: output.failure_reason(),
            })
        }
    }

    /// Joins a relative target onto the root, refusing paths that escape it
    fn target_path(&self, target: &str) -> Result<PathBuf, PatchError> {
        let relative = Path::new(target);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            return Err(PatchError::OutsideRoot(target.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}
