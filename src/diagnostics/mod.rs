//! Structured diagnostics extracted from build output
//!
//! Build tools speak several dialects (GCC/Clang, MSVC, CMake, the linker).
//! [`DiagnosticExtractor`] runs an ordered table of line patterns over raw
//! output and normalizes every hit into a [`Diagnostic`]. Messages that hint
//! at a broken project convention carry a [`ConventionViolation`].
//! [`validate_conventions`] applies the same conventions to a file's content.

mod conventions;
mod extractor;

pub use conventions::{has_include_guard, meta_object_include, validate_conventions};
pub use extractor::{DiagnosticExtractor, Dialect};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Maps tool-specific severity words onto the three normalized levels
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("error") || lower.contains("fatal") {
            Severity::Error
        } else if lower.contains("warn") {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of project convention violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    /// Header uses an extension other than the configured one
    WrongHeaderSuffix,
    /// Header lacks the include-guard directive
    MissingGuard,
    /// UI class lives outside the UI directory
    UiOutsideUiDir,
    /// Signal/slot class lacks the generated meta-object include
    MissingMetaObjectInclude,
}

impl ViolationKind {
    /// Directive insertions can be fixed by a text transform; moves and
    /// renames need a human
    pub fn is_auto_fixable(&self) -> bool {
        matches!(
            self,
            ViolationKind::MissingGuard | ViolationKind::MissingMetaObjectInclude
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::WrongHeaderSuffix => "wrong-header-suffix",
            ViolationKind::MissingGuard => "missing-guard",
            ViolationKind::UiOutsideUiDir => "ui-outside-ui-dir",
            ViolationKind::MissingMetaObjectInclude => "missing-meta-object-include",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory deviation from project conventions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionViolation {
    pub kind: ViolationKind,
    pub suggestion: String,
    pub auto_fixable: bool,
}

impl ConventionViolation {
    pub fn new(kind: ViolationKind, suggestion: impl Into<String>) -> Self {
        Self {
            kind,
            suggestion: suggestion.into(),
            auto_fixable: kind.is_auto_fixable(),
        }
    }
}

/// One compiler, linker or build-configuration message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub message: String,
    /// The matched line, untouched
    pub raw: String,
    pub dialect: Dialect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<ConventionViolation>,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{} - {}: {}",
            self.file, self.line, self.column, self.severity, self.message
        )
    }
}
