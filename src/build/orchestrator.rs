use super::{BuildAction, BuildError, BuildResult, DependencyCheck, Termination};
use crate::config::Preset;
use crate::deps::{compare_dependencies, CacheResolver, DependencyMap};
use crate::diagnostics::DiagnosticExtractor;
use crate::process::{CommandLine, SPAWN_FAILED_EXIT_CODE};
use crate::progress::{NoOpHandler, OutputStream, ProgressEvent, ProgressHandler};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(300);

struct ActiveInvocation {
    id: u64,
    preset: String,
    action: BuildAction,
    cancel: oneshot::Sender<()>,
}

type Slot = Mutex<Option<ActiveInvocation>>;

/// Clears the slot on every exit path, unless `cancel()` already took it
struct SlotGuard<'a> {
    slot: &'a Slot,
    id: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slot = lock(self.slot);
        if slot.as_ref().map(|active| active.id) == Some(self.id) {
            *slot = None;
        }
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<ActiveInvocation>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs one build process at a time and turns its output into a [`BuildResult`]
pub struct BuildOrchestrator {
    active: Slot,
    next_id: AtomicU64,
    timeout: Duration,
    progress: Arc<dyn ProgressHandler>,
    extractor: DiagnosticExtractor,
    resolver: CacheResolver,
    configured_dependencies: DependencyMap,
}

impl Default for BuildOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildOrchestrator {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
            timeout: DEFAULT_BUILD_TIMEOUT,
            progress: Arc::new(NoOpHandler),
            extractor: DiagnosticExtractor::new(),
            resolver: CacheResolver::real(),
            configured_dependencies: DependencyMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_resolver(mut self, resolver: CacheResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Dependency roots from the project configuration, compared against the
    /// cache after every successful configure
    pub fn with_configured_dependencies(mut self, dependencies: DependencyMap) -> Self {
        self.configured_dependencies = dependencies;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_running(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub async fn configure(&self, preset: &Preset, root: &Path) -> Result<BuildResult, BuildError> {
        let mut result = self.run(BuildAction::Configure, preset, root).await?;

        if result.success {
            let build_dir = root.join(&preset.build_dir);
            let cache = self.resolver.parse_cache_file(&build_dir);
            let path_warnings = if cache.success {
                self.resolver.validate_dependency_paths(&cache.dependencies)
            } else {
                Vec::new()
            };
            let comparison = compare_dependencies(&self.configured_dependencies, &cache.dependencies);

            self.progress.on_progress(&ProgressEvent::CacheResolved {
                dependencies: cache.dependencies.len(),
                warnings: cache.warnings.len() + path_warnings.len(),
                has_changes: comparison.has_changes,
            });

            result.dependency_check = Some(DependencyCheck {
                cache,
                path_warnings,
                comparison,
            });
        }

        Ok(result)
    }

    pub async fn build(&self, preset: &Preset, root: &Path) -> Result<BuildResult, BuildError> {
        self.run(BuildAction::Build, preset, root).await
    }

    pub async fn clean(&self, preset: &Preset, root: &Path) -> Result<BuildResult, BuildError> {
        self.run(BuildAction::Clean, preset, root).await
    }

    /// Signals the running process to terminate and clears the slot.
    /// Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        match lock(&self.active).take() {
            Some(active) => {
                info!(preset = %active.preset, action = %active.action, "Cancelling build");
                let _ = active.cancel.send(());
                true
            }
            None => false,
        }
    }

    async fn run(
        &self,
        action: BuildAction,
        preset: &Preset,
        root: &Path,
    ) -> Result<BuildResult, BuildError> {
        let command = action
            .command(preset)
            .ok_or_else(|| BuildError::MissingCommand {
                preset: preset.id.clone(),
                action,
            })?
            .to_string();

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut slot = lock(&self.active);
            if let Some(active) = slot.as_ref() {
                return Err(BuildError::AlreadyRunning {
                    preset: active.preset.clone(),
                    action: active.action,
                });
            }
            *slot = Some(ActiveInvocation {
                id,
                preset: preset.id.clone(),
                action,
                cancel: cancel_tx,
            });
        }
        let _guard = SlotGuard {
            slot: &self.active,
            id,
        };

        self.progress.on_progress(&ProgressEvent::BuildStarted {
            preset: preset.id.clone(),
            action,
            command: command.clone(),
        });

        let started = Instant::now();
        let outcome = match CommandLine::parse(&command) {
            Some(cmd) => self.execute(&cmd, root, cancel_rx).await,
            None => Outcome::spawn_failed(format!("Preset {} has an empty {} command", preset.id, action)),
        };

        let diagnostics = {
            let from_stderr = self.extractor.extract(&outcome.stderr, &preset.id);
            // MSBuild reports compiler errors on stdout
            if outcome.exit_code != 0
                && outcome.termination == Termination::Exited
                && !from_stderr.iter().any(|d| d.is_error())
            {
                let mut all = from_stderr;
                all.extend(self.extractor.extract(&outcome.stdout, &preset.id));
                all.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
                all
            } else {
                from_stderr
            }
        };

        let result = BuildResult {
            success: outcome.termination == Termination::Exited && outcome.exit_code == 0,
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            duration: started.elapsed(),
            diagnostics,
            preset_id: preset.id.clone(),
            action,
            command,
            termination: outcome.termination,
            dependency_check: None,
        };

        self.progress.on_progress(&ProgressEvent::BuildFinished {
            preset: result.preset_id.clone(),
            action,
            exit_code: result.exit_code,
            termination: result.termination,
            duration: result.duration,
            errors: result.error_count(),
        });

        Ok(result)
    }

    async fn execute(
        &self,
        cmd: &CommandLine,
        root: &Path,
        mut cancel_rx: oneshot::Receiver<()>,
    ) -> Outcome {
        debug!(command = %cmd, cwd = %root.display(), "Spawning build process");

        let mut child = match Command::new(&cmd.program)
            .args(&cmd.args)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %cmd.program, error = %e, "Failed to spawn build process");
                return Outcome::spawn_failed(format!("Failed to start {}: {}", cmd.program, e));
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut readers: Vec<JoinHandle<()>> = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, OutputStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, OutputStream::Stderr, tx.clone()));
        }
        drop(tx);

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut streams_open = true;
        let mut status: Option<ExitStatus> = None;
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let termination = loop {
            if status.is_some() && !streams_open {
                break Termination::Exited;
            }

            tokio::select! {
                biased;
                _ = &mut cancel_rx => break Termination::Cancelled,
                _ = &mut deadline => break Termination::TimedOut,
                line = rx.recv(), if streams_open => match line {
                    Some((stream, line)) => {
                        let buffer = match stream {
                            OutputStream::Stdout => &mut stdout,
                            OutputStream::Stderr => &mut stderr,
                        };
                        buffer.push_str(&line);
                        buffer.push('\n');
                        self.progress.on_progress(&ProgressEvent::Output { stream, line });
                    }
                    None => streams_open = false,
                },
                exited = child.wait(), if status.is_none() => match exited {
                    Ok(exit) => status = Some(exit),
                    Err(e) => {
                        warn!(error = %e, "Failed to wait for build process");
                        break Termination::Exited;
                    }
                },
            }
        };

        if termination != Termination::Exited {
            // Anything the process prints from here on is discarded
            drop(rx);
            for reader in &readers {
                reader.abort();
            }
            if status.is_none() {
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "Build process already gone");
                }
                status = child.wait().await.ok();
            }
            if termination == Termination::TimedOut {
                let message = format!("Build timed out after {}s", self.timeout.as_secs());
                warn!("{}", message);
                stderr.push_str(&message);
                stderr.push('\n');
            }
        }

        Outcome {
            exit_code: status
                .and_then(|s| s.code())
                .unwrap_or(SPAWN_FAILED_EXIT_CODE),
            stdout,
            stderr,
            termination,
        }
    }
}

struct Outcome {
    exit_code: i32,
    stdout: String,
    stderr: String,
    termination: Termination,
}

impl Outcome {
    fn spawn_failed(message: String) -> Self {
        Self {
            exit_code: SPAWN_FAILED_EXIT_CODE,
            stdout: String::new(),
            stderr: message,
            termination: Termination::SpawnFailed,
        }
    }
}

fn spawn_reader<R>(
    reader: R,
    stream: OutputStream,
    tx: mpsc::UnboundedSender<(OutputStream, String)>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(stream = ?stream, error = %e, "Stopped reading build output");
                    break;
                }
            }
        }
    })
}
