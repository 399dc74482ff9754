use super::{AiBackend, BackendError};
use crate::context::RequestEnvelope;
use crate::process::CommandLine;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Backend that pipes the envelope as JSON to an external program and reads
/// the patch text from its stdout
pub struct CommandBackend {
    command: CommandLine,
    timeout: Duration,
}

impl CommandBackend {
    pub fn new(command: &str) -> Result<Self, BackendError> {
        let command = CommandLine::parse(command).ok_or_else(|| BackendError::NotConfigured {
            message: "AI command is empty".to_string(),
        })?;
        Ok(Self {
            command,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl AiBackend for CommandBackend {
    async fn complete(&self, envelope: &RequestEnvelope) -> Result<String, BackendError> {
        let payload = serde_json::to_vec(envelope).map_err(|e| BackendError::Io {
            message: format!("Failed to serialize request: {}", e),
        })?;

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::NotConfigured {
                message: format!("Failed to start {}: {}", self.command.program, e),
            })?;

        debug!(command = %self.command, bytes = payload.len(), "Sending request to AI command");

        // Feed stdin while draining stdout so neither pipe can fill up
        let stdin = child.stdin.take();
        let write = async move {
            match stdin {
                Some(mut stdin) => stdin.write_all(&payload).await,
                None => Ok(()),
            }
        };
        let (written, output) =
            tokio::time::timeout(self.timeout, async { tokio::join!(write, child.wait_with_output()) })
                .await
                .map_err(|_| BackendError::Timeout {
                    seconds: self.timeout.as_secs(),
                })?;

        let output = output.map_err(|e| BackendError::Io {
            message: format!("Failed to read response: {}", e),
        })?;
        match written {
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("AI command exited before reading the whole request");
            }
            Err(e) => {
                return Err(BackendError::Io {
                    message: format!("Failed to send request: {}", e),
                })
            }
            Ok(()) => {}
        }

        if !output.status.success() {
            return Err(BackendError::Failed {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                exit_code: output.status.code(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.command.program
    }
}
