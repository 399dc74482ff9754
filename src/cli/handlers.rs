//! Command handlers
//!
//! Each handler returns the process exit code. Errors are logged and mapped
//! to exit code 1; a build cancelled with Ctrl-C exits with 130.

use super::commands::{
    CheckArgs, ConfigArgs, ContextArgs, DepsArgs, DiagnoseArgs, FixArgs, PatchArgs, ProjectArgs,
    RunArgs,
};
use super::output::{FileCheck, OutputFormat, OutputFormatter, PatchSummary};
use crate::ai::CommandBackend;
use crate::build::{BuildAction, BuildOrchestrator, DependencyCheck, Termination};
use crate::config::{Preset, ProjectConfig, ToolConfig};
use crate::context::{ActiveFile, ContextAssembler, ContextRequest};
use crate::deps::{compare_dependencies, CacheResolver};
use crate::diagnostics::{validate_conventions, DiagnosticExtractor};
use crate::patch::PatchManager;
use crate::progress::{ConsoleHandler, LoggingHandler, NoOpHandler, ProgressHandler};
use crate::workflow::{FixLoop, FixOutcome};
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const EXIT_FAILURE: i32 = 1;
const EXIT_INTERRUPTED: i32 = 130;

pub async fn handle_run(action: BuildAction, args: &RunArgs, quiet: bool) -> i32 {
    finish(run_action(action, args, quiet).await)
}

pub async fn handle_fix(args: &FixArgs, quiet: bool) -> i32 {
    finish(run_fix(args, quiet).await)
}

pub fn handle_diagnose(args: &DiagnoseArgs) -> i32 {
    finish(run_diagnose(args))
}

pub fn handle_check(args: &CheckArgs) -> i32 {
    finish(run_check(args))
}

pub fn handle_deps(args: &DepsArgs) -> i32 {
    finish(run_deps(args))
}

pub fn handle_context(args: &ContextArgs) -> i32 {
    finish(run_context(args))
}

pub async fn handle_patch(args: &PatchArgs) -> i32 {
    finish(run_patch(args).await)
}

pub fn handle_config(args: &ConfigArgs) -> i32 {
    let config = ToolConfig::default();
    if let Err(e) = config.validate() {
        warn!("{}", e);
    }
    finish(
        OutputFormatter::new(args.format.into())
            .format_config(&config)
            .map(|output| {
                println!("{}", output);
                0
            }),
    )
}

fn finish(result: Result<i32>) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            EXIT_FAILURE
        }
    }
}

async fn run_action(action: BuildAction, args: &RunArgs, quiet: bool) -> Result<i32> {
    let (root, project) = load_project(&args.project)?;
    let tool = ToolConfig::default();
    let preset = select_preset(&project, args.preset.as_deref())?;

    let orchestrator = Arc::new(orchestrator_for(&tool, &project, args, quiet));
    let interrupt = cancel_on_interrupt(Arc::clone(&orchestrator));

    let result = match action {
        BuildAction::Configure => orchestrator.configure(&preset, &root).await,
        BuildAction::Build => orchestrator.build(&preset, &root).await,
        BuildAction::Clean => orchestrator.clean(&preset, &root).await,
    };
    interrupt.abort();

    let result = result.map_err(|e| anyhow!("{}\n{}", e, e.help_message()))?;
    info!(
        preset = %result.preset_id,
        action = %action,
        success = result.success,
        errors = result.error_count(),
        "Finished"
    );

    let output = formatter(&args.project).format_build(&result)?;
    println!("{}", output);

    Ok(match result.termination {
        _ if result.success => 0,
        Termination::Cancelled => EXIT_INTERRUPTED,
        _ => EXIT_FAILURE,
    })
}

async fn run_fix(args: &FixArgs, quiet: bool) -> Result<i32> {
    let (root, project) = load_project(&args.run.project)?;
    let tool = ToolConfig::default();
    let preset = select_preset(&project, args.run.preset.as_deref())?;

    let command = tool.ai_command.as_deref().ok_or_else(|| {
        anyhow!(
            "No AI command configured\n\
             Set PLUGWRIGHT_AI_COMMAND to a program that reads the request JSON on stdin \
             and prints a patch on stdout"
        )
    })?;
    let backend = CommandBackend::new(command).map_err(|e| anyhow!("{}", e))?;

    let progress = progress_handler(quiet);
    let orchestrator = Arc::new(orchestrator_for(&tool, &project, &args.run, quiet));
    let assembler = ContextAssembler::real(&root, project.clone());
    let patches = PatchManager::real(&root)
        .with_commit_policy(tool.commit_policy)
        .with_conventions(project.conventions.clone())
        .with_progress(Arc::clone(&progress));

    let mut fix_loop = FixLoop::new(Arc::clone(&orchestrator), assembler, Arc::new(backend), patches)
        .with_max_iterations(args.max_iterations.unwrap_or(tool.max_fix_iterations))
        .with_progress(progress);

    let interrupt = cancel_on_interrupt(Arc::clone(&orchestrator));
    let report = fix_loop.run(&preset, &root).await;
    interrupt.abort();

    let report = report?;
    let output = formatter(&args.run.project).format_fix(&report)?;
    println!("{}", output);

    Ok(match report.outcome {
        FixOutcome::Succeeded => 0,
        FixOutcome::BuildInterrupted {
            termination: Termination::Cancelled,
        } => EXIT_INTERRUPTED,
        _ => EXIT_FAILURE,
    })
}

fn run_diagnose(args: &DiagnoseArgs) -> Result<i32> {
    let log = read_input(&args.log)?;
    let mut diagnostics = DiagnosticExtractor::new().extract(&log, &args.preset);
    if args.errors_only {
        diagnostics.retain(|d| d.is_error());
    }
    debug!(count = diagnostics.len(), "Extracted diagnostics");

    let output = OutputFormatter::new(args.format.into()).format_diagnostics(&diagnostics)?;
    println!("{}", output);
    Ok(0)
}

fn run_check(args: &CheckArgs) -> Result<i32> {
    let (root, project) = load_project(&args.project)?;
    let conventions = &project.conventions;
    let manager = PatchManager::real(&root).with_conventions(conventions.clone());

    let mut checks = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let absolute = if file.is_absolute() {
            file.clone()
        } else {
            root.join(file)
        };
        let relative = absolute.strip_prefix(&root).unwrap_or(file).to_path_buf();
        let content = std::fs::read_to_string(&absolute)
            .with_context(|| format!("Failed to read {}", absolute.display()))?;

        let mut violations = validate_conventions(&relative, &content, conventions);
        let mut fixed = false;
        if args.fix && violations.iter().any(|v| v.auto_fixable) {
            fixed = manager
                .auto_fix_conventions(&absolute, &violations)
                .map_err(|e| anyhow!("{}", e))?;
            if fixed {
                let content = std::fs::read_to_string(&absolute)
                    .with_context(|| format!("Failed to read {}", absolute.display()))?;
                violations = validate_conventions(&relative, &content, conventions);
            }
        }

        checks.push(FileCheck {
            path: relative,
            violations,
            fixed,
        });
    }

    let output = formatter(&args.project).format_check(&checks)?;
    println!("{}", output);

    let clean = checks.iter().all(|c| c.violations.is_empty());
    Ok(if clean { 0 } else { EXIT_FAILURE })
}

fn run_deps(args: &DepsArgs) -> Result<i32> {
    let (root, project) = load_project(&args.project)?;
    let resolver = CacheResolver::real();
    let formatter = formatter(&args.project);

    if args.list {
        let dirs = resolver.find_build_directories(&root);
        println!("{}", formatter.format_build_dirs(&dirs)?);
        return Ok(0);
    }

    let build_dir = match &args.build_dir {
        Some(dir) => dir.clone(),
        None => select_preset(&project, None)?.build_dir,
    };
    let build_dir = if build_dir.is_absolute() {
        build_dir
    } else {
        root.join(build_dir)
    };

    let cache = resolver.parse_cache_file(&build_dir);
    let path_warnings = resolver.validate_dependency_paths(&cache.dependencies);
    let comparison = compare_dependencies(&project.dependency_map(), &cache.dependencies);
    let success = cache.success;
    let check = DependencyCheck {
        cache,
        path_warnings,
        comparison,
    };

    println!("{}", formatter.format_deps(&build_dir, &check)?);
    Ok(if success { 0 } else { EXIT_FAILURE })
}

fn run_context(args: &ContextArgs) -> Result<i32> {
    let (root, project) = load_project(&args.project)?;

    let mut request = ContextRequest::new(args.intent.into(), args.question.clone());
    if let Some(ref file) = args.file {
        request = request.with_active_file(ActiveFile::new(file, args.line.unwrap_or(1)));
    }
    if let Some(ref preset) = args.preset {
        request = request.with_preset(preset.clone());
    }
    if let Some(ref log) = args.log {
        let log = read_input(log)?;
        request.diagnostics = DiagnosticExtractor::new()
            .extract(&log, args.preset.as_deref().unwrap_or_default());
        request.build_log = Some(log);
    }

    let envelope = ContextAssembler::real(&root, project).assemble(&request);
    let output = formatter(&args.project).format_envelope(&envelope)?;
    println!("{}", output);
    Ok(0)
}

async fn run_patch(args: &PatchArgs) -> Result<i32> {
    let (root, project) = load_project(&args.project)?;
    let tool = ToolConfig::default();
    let text = read_input(&args.patch)?;

    let mut manager = PatchManager::real(&root)
        .with_commit_policy(tool.commit_policy)
        .with_conventions(project.conventions.clone())
        .with_progress(Arc::new(LoggingHandler));

    let id = manager.generate_patch(&text, args.targets.clone(), true);
    let non_compliant_files: Vec<String> = match manager.check_compliance(id) {
        Ok(violations) => violations.into_keys().collect(),
        Err(e) => {
            debug!(error = %e, "Compliance check skipped");
            Vec::new()
        }
    };
    manager
        .set_convention_compliant(id, non_compliant_files.is_empty())
        .map_err(|e| anyhow!("{}", e))?;

    let mut validation_error = manager.validate(id).err().map(|e| e.to_string());
    let mut applied = None;
    if args.apply && validation_error.is_none() {
        match manager.apply(id).await {
            Ok(report) => applied = Some(report),
            Err(e) => validation_error = Some(e.to_string()),
        }
    }

    let patch = manager
        .get(id)
        .ok_or_else(|| anyhow!("Patch {} disappeared from the manager", id))?;
    let summary = PatchSummary {
        patch,
        non_compliant_files,
        validation_error,
        applied: applied.as_ref(),
    };
    let output = formatter(&args.project).format_patch(&summary)?;
    println!("{}", output);

    Ok(if summary.validation_error.is_none() {
        0
    } else {
        EXIT_FAILURE
    })
}

fn formatter(project: &ProjectArgs) -> OutputFormatter {
    let format: OutputFormat = project.format.into();
    OutputFormatter::new(format)
}

fn progress_handler(quiet: bool) -> Arc<dyn ProgressHandler> {
    if quiet {
        Arc::new(NoOpHandler)
    } else {
        Arc::new(ConsoleHandler)
    }
}

fn orchestrator_for(
    tool: &ToolConfig,
    project: &ProjectConfig,
    args: &RunArgs,
    quiet: bool,
) -> BuildOrchestrator {
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| tool.build_timeout());
    BuildOrchestrator::new()
        .with_timeout(timeout)
        .with_progress(progress_handler(quiet))
        .with_configured_dependencies(project.dependency_map())
}

/// Cancels the orchestrator's active build on Ctrl-C until aborted
fn cancel_on_interrupt(orchestrator: Arc<BuildOrchestrator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if orchestrator.cancel() {
                warn!("Interrupted; build cancelled");
            }
        }
    })
}

/// Canonical project root and its `plugwright.json`
fn load_project(args: &ProjectArgs) -> Result<(PathBuf, ProjectConfig)> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => env::current_dir().context("Failed to get current directory")?,
    };
    if !root.is_dir() {
        bail!("Project root is not a directory: {}", root.display());
    }
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize {}", root.display()))?;
    debug!("Project root: {}", root.display());

    let project = ProjectConfig::load(&root)?;
    Ok((root, project))
}

fn select_preset(project: &ProjectConfig, id: Option<&str>) -> Result<Preset> {
    let preset = match id {
        Some(id) => project.preset(id)?,
        None => project
            .default_preset()
            .ok_or_else(|| anyhow!("No presets defined in plugwright.json"))?,
    };
    debug!(preset = %preset.id, "Selected preset");
    Ok(preset.clone())
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::OutputFormatArg;
    use tempfile::TempDir;

    fn project_args(root: &Path) -> ProjectArgs {
        ProjectArgs {
            root: Some(root.to_path_buf()),
            format: OutputFormatArg::Json,
        }
    }

    #[test]
    fn test_load_project_defaults() {
        let temp = TempDir::new().unwrap();
        let (root, project) = load_project(&project_args(temp.path())).unwrap();

        assert!(root.is_absolute());
        assert!(!project.presets.is_empty());
    }

    #[test]
    fn test_load_project_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(load_project(&project_args(&missing)).is_err());
    }

    #[test]
    fn test_select_preset() {
        let project = ProjectConfig::default();
        let first = project.default_preset().unwrap().id.clone();

        assert_eq!(select_preset(&project, None).unwrap().id, first);
        assert_eq!(select_preset(&project, Some(&first)).unwrap().id, first);
        assert!(select_preset(&project, Some("no-such-preset")).is_err());
    }

    #[test]
    fn test_check_fixes_missing_guard() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/plugin.hpp"), "class Plugin {};\n").unwrap();

        let args = CheckArgs {
            files: vec![PathBuf::from("src/plugin.hpp")],
            fix: true,
            project: project_args(temp.path()),
        };
        assert_eq!(run_check(&args).unwrap(), 0);

        let content = std::fs::read_to_string(temp.path().join("src/plugin.hpp")).unwrap();
        assert!(content.starts_with("#pragma once"));
    }

    #[test]
    fn test_check_reports_without_fix() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("plugin.h"), "#pragma once\n").unwrap();

        let args = CheckArgs {
            files: vec![PathBuf::from("plugin.h")],
            fix: false,
            project: project_args(temp.path()),
        };
        assert_eq!(run_check(&args).unwrap(), EXIT_FAILURE);
    }

    #[test]
    fn test_deps_missing_cache_fails() {
        let temp = TempDir::new().unwrap();
        let args = DepsArgs {
            build_dir: Some(PathBuf::from("build_linux")),
            list: false,
            project: project_args(temp.path()),
        };
        assert_eq!(run_deps(&args).unwrap(), EXIT_FAILURE);
    }

    #[test]
    fn test_read_input_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("build.log");
        std::fs::write(&path, "a.cpp:1:1: error: x\n").unwrap();
        assert_eq!(read_input(&path).unwrap(), "a.cpp:1:1: error: x\n");
        assert!(read_input(&temp.path().join("missing.log")).is_err());
    }
}
