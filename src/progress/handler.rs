//! Progress handler trait and events

use crate::build::{BuildAction, Termination};
use std::time::Duration;

/// Which process stream a line of output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Events emitted while builds run and patches are applied
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Build process spawned
    BuildStarted {
        preset: String,
        action: BuildAction,
        command: String,
    },

    /// One line of build output, delivered as soon as it is read
    Output { stream: OutputStream, line: String },

    /// Build process resolved by exit, cancellation, timeout or spawn failure
    BuildFinished {
        preset: String,
        action: BuildAction,
        exit_code: i32,
        termination: Termination,
        duration: Duration,
        errors: usize,
    },

    /// Dependency cache parsed after a successful configure
    CacheResolved {
        dependencies: usize,
        warnings: usize,
        has_changes: bool,
    },

    /// Patch written to the tree
    PatchApplied { patch_id: String, files: usize },

    /// Patch rejected before or during apply
    PatchRejected { patch_id: String, reason: String },

    /// Fix loop iteration started
    FixIterationStarted { iteration: usize, errors: usize },
}

/// Trait for handling progress events
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
