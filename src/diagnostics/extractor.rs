use super::{ConventionViolation, Diagnostic, Severity, ViolationKind};
use crate::source::normalize_path;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Output dialect a diagnostic line was recognized as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Gcc,
    Msvc,
    CMake,
    Linker,
}

/// Fields pulled out of one matched line before normalization
#[derive(Debug, Default)]
pub struct RawDiagnostic {
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub severity: String,
    pub message: String,
}

pub type ExtractFn = fn(&Captures<'_>) -> RawDiagnostic;

struct LinePattern {
    dialect: Dialect,
    regex: Regex,
    extract: ExtractFn,
}

struct ViolationRule {
    kind: ViolationKind,
    regex: Regex,
    suggestion: &'static str,
}

/// Turns raw build output into sorted, structured diagnostics
///
/// Patterns are tried in table order and the first match wins; lines no
/// pattern recognizes are dropped.
pub struct DiagnosticExtractor {
    patterns: Vec<LinePattern>,
    rules: Vec<ViolationRule>,
    ansi_re: Regex,
}

impl Default for DiagnosticExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticExtractor {
    pub fn new() -> Self {
        let mut extractor = Self {
            patterns: Vec::new(),
            rules: Vec::new(),
            ansi_re: Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid regex"),
        };

        extractor.push_pattern(
            Dialect::Gcc,
            Regex::new(
                r"^(?P<file>(?:[A-Za-z]:)?[^:\s][^:]*?):(?P<line>\d+):(?:(?P<col>\d+):)?\s*(?P<sev>fatal error|error|warning|note|remark):\s*(?P<msg>.*)$",
            )
            .expect("valid regex"),
            extract_gcc,
        );
        extractor.push_pattern(
            Dialect::Msvc,
            Regex::new(
                r"^\s*(?P<file>[^(\s][^(]*?)\((?P<line>\d+)(?:,(?P<col>\d+))?\)\s*:\s*(?P<sev>fatal error|error|warning|note)\s+(?P<code>[A-Z]+\d+)\s*:\s*(?P<msg>.*)$",
            )
            .expect("valid regex"),
            extract_msvc,
        );
        extractor.push_pattern(
            Dialect::CMake,
            Regex::new(
                r"^(?:CMake )?(?P<sev>Error|Warning)(?: \(dev\))? at (?P<file>[^:]+?):(?P<line>\d+)(?: \((?P<ctx>[^)]*)\))?:?\s*(?P<msg>.*)$",
            )
            .expect("valid regex"),
            extract_cmake,
        );
        extractor.push_pattern(
            Dialect::Linker,
            Regex::new(
                r"^(?:\S*?\bld(?:\.\w+)?(?:\.exe)?:\s+)?(?:(?:[A-Za-z]:)?[^\s:]+\.(?:o|obj|a|lib)(?:\([^)]*\))?:)?(?P<file>(?:[A-Za-z]:)?[^\s:]+?)(?::(?P<line>\d+))?(?::\([^)]*\))?:\s*(?P<msg>undefined reference to .+)$",
            )
            .expect("valid regex"),
            extract_linker,
        );
        extractor.push_pattern(
            Dialect::Linker,
            Regex::new(
                r"^\s*(?P<file>[^:\s][^:]*?)\s*:\s*(?P<sev>fatal error|error|warning)\s+(?P<code>LNK\d+)\s*:\s*(?P<msg>.*)$",
            )
            .expect("valid regex"),
            extract_msvc,
        );

        extractor.push_rule(
            ViolationKind::MissingGuard,
            r"(?i)\bredefinition\b|\bdefined more than once\b",
            "Add the include-guard directive at the top of the header that is included twice",
        );
        extractor.push_rule(
            ViolationKind::MissingMetaObjectInclude,
            r"(?i)vtable for|staticMetaObject|qt_metacall|qt_metacast|metaObject\(\)",
            "Include the generated meta-object source (moc_<name>.cpp) at the end of the implementation file",
        );
        extractor.push_rule(
            ViolationKind::UiOutsideUiDir,
            r"(?i)\bui_\w+\.h\b.*(?:no such file|not found)|\.ui\b.*(?:not found|does not exist|cannot open)",
            "Move the UI class and its form into the configured UI directory so the UI compiler picks it up",
        );
        extractor.push_rule(
            ViolationKind::WrongHeaderSuffix,
            r#"(?i)\.(?:h|hh|hxx)['">]?:?\s+(?:file not found|no such file)"#,
            "Rename the header to the project's header suffix and update the include",
        );

        extractor
    }

    /// Appends a dialect pattern; earlier entries take precedence
    pub fn push_pattern(&mut self, dialect: Dialect, regex: Regex, extract: ExtractFn) {
        self.patterns.push(LinePattern {
            dialect,
            regex,
            extract,
        });
    }

    fn push_rule(&mut self, kind: ViolationKind, pattern: &str, suggestion: &'static str) {
        self.rules.push(ViolationRule {
            kind,
            regex: Regex::new(pattern).expect("valid regex"),
            suggestion,
        });
    }

    /// Extracts diagnostics from a block of build output, sorted by (file, line)
    pub fn extract(&self, output: &str, preset: &str) -> Vec<Diagnostic> {
        let lines: Vec<String> = output
            .lines()
            .map(|l| self.ansi_re.replace_all(l.trim_end(), "").into_owned())
            .collect();

        let mut diagnostics = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let Some((pattern, caps)) = self
                .patterns
                .iter()
                .find_map(|p| p.regex.captures(line).map(|caps| (p, caps)))
            else {
                continue;
            };

            let mut raw = (pattern.extract)(&caps);
            if pattern.dialect == Dialect::CMake && raw.message.is_empty() {
                raw.message = cmake_continuation(&lines[idx + 1..])
                    .unwrap_or_else(|| format!("configuration {}", raw.severity.to_lowercase()));
            }

            diagnostics.push(self.normalize(pattern.dialect, raw, line));
        }

        diagnostics.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));

        debug!(
            preset,
            lines = lines.len(),
            diagnostics = diagnostics.len(),
            "Extracted diagnostics"
        );
        diagnostics
    }

    /// Convention violation hinted at by a diagnostic message, if any
    pub fn classify_message(&self, message: &str) -> Option<ConventionViolation> {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(message))
            .map(|rule| ConventionViolation::new(rule.kind, rule.suggestion))
    }

    fn normalize(&self, dialect: Dialect, raw: RawDiagnostic, line: &str) -> Diagnostic {
        let message = raw.message.trim().to_string();
        let violation = self.classify_message(&message);

        Diagnostic {
            file: normalize_path(&raw.file),
            line: raw.line.filter(|l| *l > 0).unwrap_or(1),
            column: raw.column.filter(|c| *c > 0).unwrap_or(1),
            severity: Severity::from_text(&raw.severity),
            message,
            raw: line.to_string(),
            dialect,
            violation,
        }
    }
}

fn text(caps: &Captures<'_>, name: &str) -> String {
    caps.name(name)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn number(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

fn extract_gcc(caps: &Captures<'_>) -> RawDiagnostic {
    RawDiagnostic {
        file: text(caps, "file"),
        line: number(caps, "line"),
        column: number(caps, "col"),
        severity: text(caps, "sev"),
        message: text(caps, "msg"),
    }
}

fn extract_msvc(caps: &Captures<'_>) -> RawDiagnostic {
    let mut message = text(caps, "msg");
    // MSBuild appends the project file: "... [C:\proj\build\plugin.vcxproj]"
    if message.ends_with("proj]") {
        if let Some(idx) = message.rfind(" [") {
            message.truncate(idx);
        }
    }

    RawDiagnostic {
        file: text(caps, "file"),
        line: number(caps, "line"),
        column: number(caps, "col"),
        severity: text(caps, "sev"),
        message: format!("{}: {}", text(caps, "code"), message.trim()),
    }
}

fn extract_cmake(caps: &Captures<'_>) -> RawDiagnostic {
    let severity = text(caps, "sev");
    let mut message = text(caps, "msg");
    if message.trim().is_empty() {
        message.clear();
    }
    if let Some(ctx) = caps.name("ctx") {
        if !message.is_empty() {
            message = format!("{} ({})", message, ctx.as_str());
        }
    }

    RawDiagnostic {
        file: text(caps, "file"),
        line: number(caps, "line"),
        column: None,
        severity,
        message,
    }
}

fn extract_linker(caps: &Captures<'_>) -> RawDiagnostic {
    RawDiagnostic {
        file: text(caps, "file"),
        line: number(caps, "line"),
        column: None,
        severity: "error".to_string(),
        message: text(caps, "msg"),
    }
}

/// CMake prints the actual message on indented lines after the header
fn cmake_continuation(following: &[String]) -> Option<String> {
    let mut parts = Vec::new();
    let mut started = false;

    for line in following {
        if line.trim().is_empty() {
            if started {
                break;
            }
            continue;
        }
        if !line.starts_with(' ') && !line.starts_with('\t') {
            break;
        }
        started = true;
        parts.push(line.trim());
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
