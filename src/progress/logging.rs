//! Logging-based progress handlers

use super::{ProgressEvent, ProgressHandler};
use crate::build::Termination;
use tracing::{debug, info, trace, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::BuildStarted {
                preset,
                action,
                command,
            } => {
                info!(preset = %preset, action = %action, command = %command, "Starting build step");
            }
            ProgressEvent::Output { stream, line } => {
                trace!(stream = ?stream, "{}", line);
            }
            ProgressEvent::BuildFinished {
                preset,
                action,
                exit_code,
                termination,
                duration,
                errors,
            } => match termination {
                Termination::Exited if *exit_code == 0 => {
                    info!(
                        preset = %preset,
                        action = %action,
                        duration_ms = duration.as_millis(),
                        "Build step succeeded"
                    );
                }
                Termination::Exited => {
                    warn!(
                        preset = %preset,
                        action = %action,
                        exit_code,
                        errors,
                        duration_ms = duration.as_millis(),
                        "Build step failed"
                    );
                }
                other => {
                    warn!(
                        preset = %preset,
                        action = %action,
                        termination = %other,
                        duration_ms = duration.as_millis(),
                        "Build step did not complete"
                    );
                }
            },
            ProgressEvent::CacheResolved {
                dependencies,
                warnings,
                has_changes,
            } => {
                if *has_changes {
                    info!(
                        dependencies,
                        warnings, "Dependency cache differs from project configuration"
                    );
                } else {
                    debug!(dependencies, warnings, "Dependency cache resolved");
                }
            }
            ProgressEvent::PatchApplied { patch_id, files } => {
                info!(patch = %patch_id, files, "Patch applied");
            }
            ProgressEvent::PatchRejected { patch_id, reason } => {
                warn!(patch = %patch_id, reason = %reason, "Patch rejected");
            }
            ProgressEvent::FixIterationStarted { iteration, errors } => {
                info!(iteration, errors, "Starting fix iteration");
            }
        }
    }
}

/// Streams build output to stderr and logs everything else
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleHandler;

impl ProgressHandler for ConsoleHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Output { line, .. } => eprintln!("{}", line),
            other => LoggingHandler.on_progress(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildAction;
    use crate::progress::OutputStream;
    use std::time::Duration;

    #[test]
    fn test_logging_handler_handles_every_event() {
        let handler = LoggingHandler;
        let events = vec![
            ProgressEvent::BuildStarted {
                preset: "linux-x86_64".to_string(),
                action: BuildAction::Configure,
                command: "cmake --preset linux-x86_64".to_string(),
            },
            ProgressEvent::Output {
                stream: OutputStream::Stderr,
                line: "warning: unused".to_string(),
            },
            ProgressEvent::BuildFinished {
                preset: "linux-x86_64".to_string(),
                action: BuildAction::Configure,
                exit_code: -1,
                termination: Termination::TimedOut,
                duration: Duration::from_secs(300),
                errors: 0,
            },
            ProgressEvent::CacheResolved {
                dependencies: 3,
                warnings: 1,
                has_changes: true,
            },
            ProgressEvent::PatchApplied {
                patch_id: "p".to_string(),
                files: 2,
            },
            ProgressEvent::PatchRejected {
                patch_id: "p".to_string(),
                reason: "target missing".to_string(),
            },
            ProgressEvent::FixIterationStarted {
                iteration: 2,
                errors: 1,
            },
        ];

        for event in &events {
            handler.on_progress(event);
            ConsoleHandler.on_progress(event);
        }
    }
}
