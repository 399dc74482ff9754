//! AI request assembly
//!
//! [`ContextAssembler`] merges project configuration, conventions, file
//! snippets, diagnostics and a project-structure summary into a
//! [`RequestEnvelope`]. The envelope is built fresh per call and handed to an
//! [`AiBackend`](crate::ai::AiBackend) as-is.

mod assembler;
pub mod prompts;

pub use assembler::{ContextAssembler, BUILD_DIR_CANDIDATES, SIBLING_MAX_CHARS, SNIPPET_RADIUS};

use crate::build::BuildResult;
use crate::config::ConventionSettings;
use crate::diagnostics::Diagnostic;
use crate::source::FileKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What the user wants from the AI backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Explain the state of a build
    Compile,
    /// Produce a patch for failing diagnostics
    Fix,
    /// Free-form project help
    #[default]
    Assist,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Compile => "compile",
            Intent::Fix => "fix",
            Intent::Assist => "assist",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File in the editor and the cursor line (1-based)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFile {
    pub path: PathBuf,
    pub line: u32,
}

impl ActiveFile {
    pub fn new(path: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            path: path.into(),
            line: line.max(1),
        }
    }
}

/// Input to [`ContextAssembler::assemble`]
#[derive(Debug, Clone, Default)]
pub struct ContextRequest {
    pub intent: Intent,
    pub question: String,
    pub active_file: Option<ActiveFile>,
    /// Preset to describe; falls back to the platform default
    pub preset_id: Option<String>,
    pub build_log: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ContextRequest {
    pub fn new(intent: Intent, question: impl Into<String>) -> Self {
        Self {
            intent,
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_active_file(mut self, active: ActiveFile) -> Self {
        self.active_file = Some(active);
        self
    }

    pub fn with_preset(mut self, preset_id: impl Into<String>) -> Self {
        self.preset_id = Some(preset_id.into());
        self
    }

    /// Fix request for a failed build. The active file is the location of
    /// the first error.
    pub fn fix_for(result: &BuildResult) -> Self {
        let mut diagnostics: Vec<Diagnostic> = result.errors().into_iter().cloned().collect();
        diagnostics.extend(result.diagnostics.iter().filter(|d| !d.is_error()).cloned());

        let active_file = diagnostics
            .first()
            .filter(|d| d.is_error())
            .map(|d| ActiveFile::new(&d.file, d.line));

        Self {
            intent: Intent::Fix,
            question: format!(
                "The {} step for preset {} failed with exit code {}. Fix the errors below.",
                result.action, result.preset_id, result.exit_code
            ),
            active_file,
            preset_id: Some(result.preset_id.clone()),
            build_log: Some(result.log()),
            diagnostics,
        }
    }
}

/// Snippet of a project file attached to a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContext {
    pub path: String,
    pub kind: FileKind,
    pub content: String,
    pub start_line: u32,
    pub end_line: u32,
    pub truncated: bool,
}

/// Snapshot of the project layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStructure {
    /// Existing build directories from the fixed candidate list
    pub build_dirs: Vec<String>,
    /// Preset names declared in CMakePresets.json
    pub presets: Vec<String>,
    pub ui_dir: String,
    pub deps_dir: String,
}

/// Everything an AI backend receives for one call
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    pub intent: Intent,
    pub system_prompt: String,
    pub user_prompt: String,
    pub file_context: Vec<FileContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_log: Option<String>,
    pub conventions: ConventionSettings,
    pub project_structure: ProjectStructure,
}

/// Renders diagnostics as a numbered `file:line:col - severity: message`
/// list, capped at `max` entries
pub fn format_errors_for_ai(diagnostics: &[Diagnostic], max: usize) -> String {
    let mut lines: Vec<String> = diagnostics
        .iter()
        .take(max)
        .enumerate()
        .map(|(i, d)| format!("{}. {}", i + 1, d))
        .collect();

    if diagnostics.len() > max {
        lines.push(format!("... and {} more", diagnostics.len() - max));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildAction, Termination};
    use crate::diagnostics::DiagnosticExtractor;
    use std::time::Duration;

    fn diagnostics(text: &str) -> Vec<Diagnostic> {
        DiagnosticExtractor::new().extract(text, "macos")
    }

    #[test]
    fn test_format_errors_for_ai() {
        let diags = diagnostics("src/a.cpp:3:7: error: expected ';'\nsrc/b.cpp:1:1: warning: unused");
        let text = format_errors_for_ai(&diags, 10);

        assert_eq!(
            text,
            "1. src/a.cpp:3:7 - error: expected ';'\n2. src/b.cpp:1:1 - warning: unused"
        );
    }

    #[test]
    fn test_format_errors_caps_list() {
        let diags = diagnostics("a.cpp:1:1: error: x\na.cpp:2:1: error: y\na.cpp:3:1: error: z");
        let text = format_errors_for_ai(&diags, 1);

        assert_eq!(text, "1. a.cpp:1:1 - error: x\n... and 2 more");
        assert_eq!(format_errors_for_ai(&[], 5), "");
    }

    #[test]
    fn test_fix_for_uses_first_error() {
        let stderr = "src/z.cpp:1:1: warning: w\nsrc/m.cpp:40:2: error: boom\nsrc/n.cpp:2:2: error: bang";
        let result = BuildResult {
            success: false,
            exit_code: 2,
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration: Duration::from_secs(1),
            diagnostics: diagnostics(stderr),
            preset_id: "macos".to_string(),
            action: BuildAction::Build,
            command: "cmake --build".to_string(),
            termination: Termination::Exited,
            dependency_check: None,
        };

        let request = ContextRequest::fix_for(&result);
        assert_eq!(request.intent, Intent::Fix);
        assert_eq!(request.active_file, Some(ActiveFile::new("src/m.cpp", 40)));
        assert_eq!(request.diagnostics.len(), 3);
        assert!(request.diagnostics[2].file.ends_with("z.cpp"));
        assert_eq!(request.build_log.as_deref(), Some(stderr));
    }

    #[test]
    fn test_active_file_line_is_one_based() {
        assert_eq!(ActiveFile::new("a.cpp", 0).line, 1);
    }
}
