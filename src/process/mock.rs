use super::{CommandLine, CommandOutput, CommandRunner};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Observer = Box<dyn Fn(&CommandLine, &Path) + Send + Sync>;

/// A command seen by [`MockCommandRunner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub command: CommandLine,
    pub cwd: PathBuf,
}

impl RecordedCall {
    /// Program and arguments joined by spaces, for easy assertions
    pub fn line(&self) -> String {
        let mut words = vec![self.command.program.clone()];
        words.extend(self.command.args.iter().cloned());
        words.join(" ")
    }
}

enum Scripted {
    Output(CommandOutput),
    SpawnError(String),
}

/// Scripted runner: pops queued responses in order and records every call.
/// An empty queue answers with a successful, silent exit.
#[derive(Default)]
pub struct MockCommandRunner {
    responses: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
    observer: Option<Observer>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `observer` synchronously on every call, before the response is
    /// returned
    pub fn with_observer(observer: impl Fn(&CommandLine, &Path) + Send + Sync + 'static) -> Self {
        Self {
            observer: Some(Box::new(observer)),
            ..Self::default()
        }
    }

    pub fn push_output(&self, exit_code: i32, stdout: &str, stderr: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::Output(CommandOutput {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }));
    }

    pub fn push_success(&self) {
        self.push_output(0, "", "");
    }

    pub fn push_spawn_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Scripted::SpawnError(message.to_string()));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(RecordedCall::line).collect()
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, command: &CommandLine, cwd: &Path) -> anyhow::Result<CommandOutput> {
        if let Some(observer) = &self.observer {
            observer(command, cwd);
        }
        self.calls.lock().unwrap().push(RecordedCall {
            command: command.clone(),
            cwd: cwd.to_path_buf(),
        });

        match self.responses.lock().unwrap().pop_front() {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::SpawnError(message)) => Err(anyhow!(message)),
            None => Ok(CommandOutput::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let runner = MockCommandRunner::new();
        runner.push_output(1, "", "conflict");
        runner.push_spawn_error("git not installed");

        let cmd = CommandLine::new("git", ["status"]);
        let first = runner.run(&cmd, Path::new("/repo")).await.unwrap();
        assert_eq!(first.exit_code, 1);
        assert_eq!(first.stderr, "conflict");

        assert!(runner.run(&cmd, Path::new("/repo")).await.is_err());

        let third = runner.run(&cmd, Path::new("/repo")).await.unwrap();
        assert!(third.success());

        assert_eq!(runner.call_lines(), vec!["git status"; 3]);
        assert_eq!(runner.calls()[0].cwd, PathBuf::from("/repo"));
    }

    #[tokio::test]
    async fn test_observer_sees_each_call() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let runner = MockCommandRunner::with_observer(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let cmd = CommandLine::new("git", ["apply"]);
        runner.run(&cmd, Path::new(".")).await.unwrap();
        runner.run(&cmd, Path::new(".")).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
