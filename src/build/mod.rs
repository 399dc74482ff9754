//! Build process orchestration
//!
//! [`BuildOrchestrator`] runs a preset's configure/build/clean command,
//! streams its output to a [`ProgressHandler`](crate::progress::ProgressHandler),
//! and resolves to a [`BuildResult`] on exit, cancellation or timeout. A
//! successful configure also parses the dependency cache.

mod orchestrator;

pub use orchestrator::{BuildOrchestrator, DEFAULT_BUILD_TIMEOUT};

use crate::config::Preset;
use crate::deps::{CacheValidationResult, DependencyComparison};
use crate::diagnostics::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Build errors that prevent a process from being started at all.
/// Everything after the start resolves into a [`BuildResult`].
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("A {action} for preset {preset} is already running; cancel it first")]
    AlreadyRunning { preset: String, action: BuildAction },

    #[error("Preset {preset} has no {action} command")]
    MissingCommand { preset: String, action: BuildAction },
}

impl BuildError {
    pub fn help_message(&self) -> String {
        match self {
            BuildError::AlreadyRunning { .. } => {
                "Only one build runs at a time. Cancel the running build before starting another."
                    .to_string()
            }
            BuildError::MissingCommand { action, .. } => format!(
                "Add a \"{}\" command to the preset in plugwright.json.",
                action
            ),
        }
    }
}

/// Which preset command to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildAction {
    Configure,
    Build,
    Clean,
}

impl BuildAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildAction::Configure => "configure",
            BuildAction::Build => "build",
            BuildAction::Clean => "clean",
        }
    }

    /// The preset's command string for this action
    pub fn command<'a>(&self, preset: &'a Preset) -> Option<&'a str> {
        match self {
            BuildAction::Configure => Some(preset.configure.as_str()),
            BuildAction::Build => Some(preset.build.as_str()),
            BuildAction::Clean => preset.clean.as_deref(),
        }
    }
}

impl fmt::Display for BuildAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a build invocation resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Process exited on its own; see the exit code
    Exited,
    Cancelled,
    TimedOut,
    /// Process could not be started
    SpawnFailed,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Exited => "exited",
            Termination::Cancelled => "cancelled",
            Termination::TimedOut => "timed_out",
            Termination::SpawnFailed => "spawn_failed",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dependency cache state read after a successful configure
#[derive(Debug, Clone, Serialize)]
pub struct DependencyCheck {
    pub cache: CacheValidationResult,
    /// Cached paths that are missing or not directories
    pub path_warnings: Vec<String>,
    /// Cache values against the project's configured roots
    pub comparison: DependencyComparison,
}

/// Outcome of one configure, build or clean invocation
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub diagnostics: Vec<Diagnostic>,
    pub preset_id: String,
    pub action: BuildAction,
    pub command: String,
    pub termination: Termination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_check: Option<DependencyCheck>,
}

impl BuildResult {
    /// Error-severity diagnostics, in extraction order
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error()).collect()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// Combined build log, stdout first
    pub fn log(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}
