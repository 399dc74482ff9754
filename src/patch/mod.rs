//! Validation and application of AI-proposed patches
//!
//! A patch is either a unified diff, applied through `git apply` from a
//! scratch file, or a list of search/replace edit steps applied directly.
//! Validation always precedes any write, and a rejected patch leaves the
//! tree untouched.

mod edit;
mod fixes;
mod manager;

pub use edit::{parse_edit_instructions, EditStep};
pub use fixes::{insert_include_guard, append_meta_object_include};
pub use manager::{ApplyReport, CommitOutcome, PatchManager};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Patch errors
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Patch {0} not found")]
    NotFound(Uuid),

    #[error("Patch {id} was already applied or rejected (status: {status})")]
    AlreadyResolved { id: Uuid, status: PatchStatus },

    #[error("Patch names no target files")]
    NoTargets,

    #[error("Target file does not exist: {0}")]
    MissingTarget(String),

    #[error("Target file is outside the project root: {0}")]
    OutsideRoot(String),

    #[error("Unified diff is missing its @@/---/+++ markers")]
    MissingDiffMarkers,

    #[error("Edit instructions contain no edit steps")]
    NoEditSteps,

    #[error("Search text not found in {file}: {search}")]
    SearchTextNotFound { file: String, search: String },

    #[error("git {operation} failed: {reason}")]
    VcsFailed { operation: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The two shapes of patch text an AI backend returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchKind {
    UnifiedDiff,
    EditInstructions,
}

impl PatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchKind::UnifiedDiff => "unified_diff",
            PatchKind::EditInstructions => "edit_instructions",
        }
    }
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed patch payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum PatchContent {
    UnifiedDiff(String),
    EditInstructions(Vec<EditStep>),
}

impl PatchContent {
    pub fn kind(&self) -> PatchKind {
        match self {
            PatchContent::UnifiedDiff(_) => PatchKind::UnifiedDiff,
            PatchContent::EditInstructions(_) => PatchKind::EditInstructions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchStatus {
    Pending,
    Valid,
    Invalid,
}

impl fmt::Display for PatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatchStatus::Pending => "pending",
            PatchStatus::Valid => "valid",
            PatchStatus::Invalid => "invalid",
        })
    }
}

/// A proposed change tracked from generation to a single apply
#[derive(Debug, Clone, Serialize)]
pub struct PatchOperation {
    pub id: Uuid,
    pub content: PatchContent,
    /// Patch text as returned by the backend
    pub raw: String,
    /// Paths relative to the project root
    pub target_files: Vec<String>,
    pub status: PatchStatus,
    pub convention_compliant: bool,
    pub auto_commit: bool,
    pub created_at: DateTime<Utc>,
}

impl PatchOperation {
    pub fn kind(&self) -> PatchKind {
        self.content.kind()
    }
}

/// `unified_diff` iff the text carries all three structural diff markers
pub fn classify(content: &str) -> PatchKind {
    if has_diff_markers(content) {
        PatchKind::UnifiedDiff
    } else {
        PatchKind::EditInstructions
    }
}

fn has_diff_markers(content: &str) -> bool {
    content.contains("@@") && content.contains("---") && content.contains("+++")
}

/// Files a unified diff touches, from its `+++ b/` headers. Deleted files
/// (`+++ /dev/null`) are reported by their `--- a/` path.
pub fn targets_from_diff(diff: &str) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    let mut old_path: Option<String> = None;

    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("--- ") {
            old_path = header_path(rest);
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            let target = header_path(rest).or_else(|| old_path.take());
            if let Some(target) = target {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }
    }

    targets
}

fn header_path(rest: &str) -> Option<String> {
    let path = rest.split('\t').next().unwrap_or(rest).trim();
    let path = path.trim_matches('"');
    if path.is_empty() || path == "/dev/null" {
        return None;
    }
    let path = path
        .strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path);
    Some(path.to_string())
}
