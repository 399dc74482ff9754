//! Output formatting for multiple formats
//!
//! Every command result is rendered as JSON, YAML or human-readable text.
//! JSON and YAML are plain serde renderings of the result types; the human
//! format is written per result type.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::build::{BuildResult, DependencyCheck};
use crate::config::ToolConfig;
use crate::context::RequestEnvelope;
use crate::diagnostics::{ConventionViolation, Diagnostic, Severity};
use crate::patch::{ApplyReport, CommitOutcome, PatchOperation};
use crate::workflow::{FixOutcome, FixReport};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (human-friendly, version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
}

/// Convention check outcome for one file
#[derive(Debug, Clone, Serialize)]
pub struct FileCheck {
    pub path: PathBuf,
    pub violations: Vec<ConventionViolation>,
    /// Whether `--fix` rewrote the file
    pub fixed: bool,
}

/// A patch as stored by the manager, with the outcome of the commands run on it
#[derive(Debug, Clone, Serialize)]
pub struct PatchSummary<'a> {
    pub patch: &'a PatchOperation,
    pub non_compliant_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<&'a ApplyReport>,
}

#[derive(Serialize)]
struct DepsView<'a> {
    build_dir: &'a Path,
    #[serde(flatten)]
    check: &'a DependencyCheck,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_build(&self, result: &BuildResult) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_build_human(result)),
            _ => self.serialize(result, "build result"),
        }
    }

    pub fn format_fix(&self, report: &FixReport) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_fix_human(report)),
            _ => self.serialize(report, "fix report"),
        }
    }

    pub fn format_diagnostics(&self, diagnostics: &[Diagnostic]) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_diagnostics_human(diagnostics)),
            _ => self.serialize(&diagnostics, "diagnostics"),
        }
    }

    pub fn format_check(&self, checks: &[FileCheck]) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_check_human(checks)),
            _ => self.serialize(&checks, "convention check"),
        }
    }

    pub fn format_deps(&self, build_dir: &Path, check: &DependencyCheck) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_deps_human(build_dir, check)),
            _ => self.serialize(&DepsView { build_dir, check }, "dependency report"),
        }
    }

    pub fn format_build_dirs(&self, dirs: &[PathBuf]) -> Result<String> {
        match self.format {
            OutputFormat::Human => {
                if dirs.is_empty() {
                    return Ok("No build directories with a CMakeCache.txt found\n".to_string());
                }
                let mut output = String::from("Build directories:\n");
                for dir in dirs {
                    output.push_str(&format!("  {}\n", dir.display()));
                }
                Ok(output)
            }
            _ => self.serialize(&dirs, "build directories"),
        }
    }

    pub fn format_envelope(&self, envelope: &RequestEnvelope) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_envelope_human(envelope)),
            _ => self.serialize(envelope, "request envelope"),
        }
    }

    pub fn format_patch(&self, summary: &PatchSummary<'_>) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.format_patch_human(summary)),
            _ => self.serialize(summary, "patch"),
        }
    }

    pub fn format_config(&self, config: &ToolConfig) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(config.to_string()),
            _ => self.serialize(&config.to_display_map(), "config"),
        }
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T, what: &str) -> Result<String> {
        match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)
                .with_context(|| format!("Failed to serialize {} to YAML", what)),
            _ => serde_json::to_string_pretty(value)
                .with_context(|| format!("Failed to serialize {} to JSON", what)),
        }
    }

    // Human-readable formatting methods

    fn format_build_human(&self, result: &BuildResult) -> String {
        let mut output = String::new();

        let mark = if result.success { "\u{2713}" } else { "\u{2717}" };
        output.push_str(&format!(
            "{} {} {} ({})\n",
            mark,
            capitalize(result.action.as_str()),
            if result.success { "succeeded" } else { "failed" },
            result.preset_id
        ));
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str(&format!("Command:      {}\n", result.command));
        output.push_str(&format!("Exit code:    {}\n", result.exit_code));
        output.push_str(&format!("Termination:  {}\n", result.termination));
        output.push_str(&format!("Duration:     {:.1}s\n", result.duration.as_secs_f64()));

        if !result.diagnostics.is_empty() {
            output.push('\n');
            output.push_str(&self.format_diagnostics_human(&result.diagnostics));
        }

        if let Some(ref deps) = result.dependency_check {
            output.push('\n');
            output.push_str(&format_dependency_check(deps));
        }

        output
    }

    fn format_fix_human(&self, report: &FixReport) -> String {
        let mut output = String::new();

        let headline = match &report.outcome {
            FixOutcome::Succeeded => "\u{2713} Build fixed".to_string(),
            FixOutcome::IterationsExhausted => {
                "\u{2717} Build still failing after all fix iterations".to_string()
            }
            FixOutcome::BuildInterrupted { termination } => {
                format!("\u{2717} Build interrupted ({})", termination)
            }
            FixOutcome::BackendFailed { message } => {
                format!("\u{2717} AI backend failed: {}", message)
            }
            FixOutcome::PatchRejected { reason } => format!("\u{2717} Patch rejected: {}", reason),
        };
        output.push_str(&headline);
        output.push('\n');
        output.push_str(RULE);
        output.push_str("\n\n");

        if report.iterations.is_empty() {
            output.push_str("No fix iterations were needed\n");
        }
        for record in &report.iterations {
            output.push_str(&format!(
                "Iteration {}: {} error(s)",
                record.iteration, record.errors_before
            ));
            if let Some(kind) = record.patch_kind {
                output.push_str(&format!(", {} patch", kind));
            }
            if record.applied {
                output.push_str(", applied");
            }
            if let Some(after) = record.errors_after {
                output.push_str(&format!(", {} error(s) after rebuild", after));
            }
            output.push('\n');

            if !record.non_compliant_files.is_empty() {
                output.push_str(&format!(
                    "\u{251C}\u{2500} Convention issues: {}\n",
                    record.non_compliant_files.join(", ")
                ));
            }
            if let Some(ref commit) = record.commit {
                output.push_str(&format!("\u{2514}\u{2500} Commit: {}\n", describe_commit(commit)));
            }
        }

        let remaining = report.final_result.errors();
        if !remaining.is_empty() {
            output.push_str("\nRemaining errors:\n");
            for diagnostic in remaining {
                output.push_str(&format!("  {}\n", diagnostic));
            }
        }

        output
    }

    fn format_diagnostics_human(&self, diagnostics: &[Diagnostic]) -> String {
        if diagnostics.is_empty() {
            return "No diagnostics found\n".to_string();
        }

        let count = |severity: Severity| diagnostics.iter().filter(|d| d.severity == severity).count();
        let mut output = format!(
            "Diagnostics: {} error(s), {} warning(s), {} note(s)\n",
            count(Severity::Error),
            count(Severity::Warning),
            count(Severity::Info)
        );

        for diagnostic in diagnostics {
            output.push_str(&format!("  {}\n", diagnostic));
            if let Some(ref violation) = diagnostic.violation {
                output.push_str(&format!(
                    "    \u{2514}\u{2500} {}: {}\n",
                    violation.kind, violation.suggestion
                ));
            }
        }

        output
    }

    fn format_check_human(&self, checks: &[FileCheck]) -> String {
        let mut output = String::new();

        for check in checks {
            if check.violations.is_empty() {
                output.push_str(&format!("\u{2713} {}\n", check.path.display()));
                continue;
            }
            let suffix = if check.fixed { " (fixed)" } else { "" };
            output.push_str(&format!("\u{26A0} {}{}\n", check.path.display(), suffix));
            for violation in &check.violations {
                let fixable = if violation.auto_fixable { " [auto-fixable]" } else { "" };
                output.push_str(&format!(
                    "  \u{251C}\u{2500} {}{}: {}\n",
                    violation.kind, fixable, violation.suggestion
                ));
            }
        }

        output
    }

    fn format_deps_human(&self, build_dir: &Path, check: &DependencyCheck) -> String {
        let mut output = format!("Dependency cache: {}\n", build_dir.display());
        output.push_str(RULE);
        output.push_str("\n\n");
        output.push_str(&format_dependency_check(check));
        output
    }

    fn format_envelope_human(&self, envelope: &RequestEnvelope) -> String {
        let mut output = format!("Intent: {}\n", envelope.intent);
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str("System prompt:\n");
        output.push_str(&envelope.system_prompt);
        output.push_str("\n\nUser prompt:\n");
        output.push_str(&envelope.user_prompt);
        output.push('\n');

        if !envelope.file_context.is_empty() {
            output.push_str("\nFile context:\n");
            for file in &envelope.file_context {
                output.push_str(&format!(
                    "\u{251C}\u{2500} {} ({}, lines {}-{}{})\n",
                    file.path,
                    file.kind,
                    file.start_line,
                    file.end_line,
                    if file.truncated { ", truncated" } else { "" }
                ));
            }
        }

        let structure = &envelope.project_structure;
        output.push_str("\nProject structure:\n");
        output.push_str(&format!(
            "\u{251C}\u{2500} Build dirs: {}\n",
            join_or_none(&structure.build_dirs)
        ));
        output.push_str(&format!(
            "\u{251C}\u{2500} Presets:    {}\n",
            join_or_none(&structure.presets)
        ));
        output.push_str(&format!("\u{251C}\u{2500} UI dir:     {}\n", structure.ui_dir));
        output.push_str(&format!("\u{2514}\u{2500} Deps dir:   {}\n", structure.deps_dir));

        if let Some(ref log) = envelope.build_log {
            output.push_str(&format!("\nBuild log: {} chars\n", log.chars().count()));
        }

        output
    }

    fn format_patch_human(&self, summary: &PatchSummary<'_>) -> String {
        let patch = summary.patch;
        let mut output = format!("Patch {} ({})\n", patch.id, patch.kind());
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str(&format!("Status:    {}\n", patch.status));
        output.push_str(&format!(
            "Compliant: {}\n",
            if patch.convention_compliant { "yes" } else { "no" }
        ));
        output.push_str("Targets:\n");
        for target in &patch.target_files {
            let marker = if summary.non_compliant_files.contains(target) {
                " (convention issues)"
            } else {
                ""
            };
            output.push_str(&format!("  {}{}\n", target, marker));
        }

        if let Some(ref error) = summary.validation_error {
            output.push_str(&format!("\n\u{2717} {}\n", error));
        }
        if let Some(report) = summary.applied {
            output.push_str(&format!(
                "\n\u{2713} Applied to {} file(s)\nCommit: {}\n",
                report.files.len(),
                describe_commit(&report.commit)
            ));
        }

        output
    }
}

fn format_dependency_check(check: &DependencyCheck) -> String {
    let mut output = String::from("Dependencies:\n");

    if check.cache.dependencies.is_empty() {
        output.push_str("  (none found in cache)\n");
    }
    for (key, path) in &check.cache.dependencies {
        output.push_str(&format!("  {:<22} {}\n", key.to_string(), path.display()));
    }
    for error in &check.cache.errors {
        output.push_str(&format!("  \u{2717} {}\n", error));
    }
    for warning in check.cache.warnings.iter().chain(&check.path_warnings) {
        output.push_str(&format!("  \u{26A0} {}\n", warning));
    }

    if check.comparison.has_changes {
        output.push_str("\nDiffers from plugwright.json:\n");
        for (key, diff) in &check.comparison.differences {
            output.push_str(&format!(
                "  {}: configured {}, cache {}\n",
                key,
                display_opt(diff.current.as_deref()),
                display_opt(diff.cache.as_deref())
            ));
        }
    }

    output
}

fn describe_commit(commit: &CommitOutcome) -> String {
    match commit {
        CommitOutcome::Skipped => "skipped".to_string(),
        CommitOutcome::Committed { message } => {
            format!("committed ({})", message.lines().next().unwrap_or_default())
        }
        CommitOutcome::Failed { reason } => format!("failed ({})", reason),
    }
}

fn display_opt(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(unset)".to_string())
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
