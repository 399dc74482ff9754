use super::{CommandLine, CommandOutput, CommandRunner, SPAWN_FAILED_EXIT_CODE};
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs commands with `tokio::process`, capturing both streams
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, command: &CommandLine, cwd: &Path) -> anyhow::Result<CommandOutput> {
        debug!(command = %command, cwd = %cwd.display(), "Running command");

        let output = Command::new(&command.program)
            .args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", command.program))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(SPAWN_FAILED_EXIT_CODE),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
