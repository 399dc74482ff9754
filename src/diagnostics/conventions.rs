use super::{ConventionViolation, ViolationKind};
use crate::config::ConventionSettings;
use crate::source::{extension, is_header, is_implementation, is_under_dir};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Checks one file's content against the project conventions
///
/// Only headers and implementation files are inspected; anything else
/// yields no violations. Checks whose `enforce_*` flag is off are skipped.
pub fn validate_conventions(
    path: &Path,
    content: &str,
    settings: &ConventionSettings,
) -> Vec<ConventionViolation> {
    let mut violations = Vec::new();
    let header = is_header(path);
    let implementation = is_implementation(path);
    if !header && !implementation {
        return violations;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let suffix = settings.header_suffix.trim_start_matches('.');

    if settings.enforce_header_suffix && header && !extension(path).eq_ignore_ascii_case(suffix) {
        let renamed = path.with_extension(suffix);
        violations.push(ConventionViolation::new(
            ViolationKind::WrongHeaderSuffix,
            format!(
                "Rename {} to {} and update its includes",
                file_name,
                renamed
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            ),
        ));
    }

    if settings.enforce_include_guard && header && !has_include_guard(content, &settings.include_guard) {
        violations.push(ConventionViolation::new(
            ViolationKind::MissingGuard,
            format!("Add `{}` at the top of {}", settings.include_guard, file_name),
        ));
    }

    if settings.enforce_ui_dir
        && gui_indicator_re().is_match(content)
        && !is_under_dir(path, &settings.ui_dir)
    {
        violations.push(ConventionViolation::new(
            ViolationKind::UiOutsideUiDir,
            format!("Move {} into {}/", file_name, settings.ui_dir.trim_end_matches('/')),
        ));
    }

    if settings.enforce_meta_object_include && implementation && signal_slot_re().is_match(content) {
        let include = meta_object_include(path, settings);
        if !content.lines().any(|line| line.trim() == include) {
            violations.push(ConventionViolation::new(
                ViolationKind::MissingMetaObjectInclude,
                format!("Append `{}` at the end of {}", include, file_name),
            ));
        }
    }

    violations
}

/// True when the header carries the configured directive or a classic
/// `#ifndef X` / `#define X` pair
pub fn has_include_guard(content: &str, directive: &str) -> bool {
    let directive = directive.trim();
    if !directive.is_empty() && content.lines().any(|line| line.trim() == directive) {
        return true;
    }

    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    lines.windows(2).any(|pair| {
        match (
            pair[0].strip_prefix("#ifndef"),
            pair[1].strip_prefix("#define"),
        ) {
            (Some(guard), Some(defined)) => {
                let guard = guard.trim();
                !guard.is_empty() && defined.split_whitespace().next() == Some(guard)
            }
            _ => false,
        }
    })
}

/// Include line for the generated meta-object source of `path`
pub fn meta_object_include(path: &Path, settings: &ConventionSettings) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("#include \"{}{}.cpp\"", settings.meta_object_prefix, stem)
}

fn gui_indicator_re() -> &'static Regex {
    static GUI_RE: OnceLock<Regex> = OnceLock::new();
    GUI_RE.get_or_init(|| {
        Regex::new(r"\b(?:QWidget|QDialog|QMainWindow|QDockWidget|QFrame)\b|\bUi::\w+|\bsetupUi\s*\(")
            .expect("valid regex")
    })
}

fn signal_slot_re() -> &'static Regex {
    static SIGNAL_RE: OnceLock<Regex> = OnceLock::new();
    SIGNAL_RE.get_or_init(|| {
        Regex::new(r"(?m)\bQ_OBJECT\b|\bQ_SIGNALS\b|\bQ_SLOTS\b|^\s*(?:public |private |protected )?(?:signals|slots)\s*:|\bemit\s+\w+\s*\(")
            .expect("valid regex")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ConventionSettings {
        ConventionSettings::default()
    }

    fn kinds(violations: &[ConventionViolation]) -> Vec<ViolationKind> {
        violations.iter().map(|v| v.kind).collect()
    }

    #[test]
    fn test_header_missing_guard() {
        let content = "// Copyright\n\nclass Plugin {\n};\n";
        let violations = validate_conventions(Path::new("src/plugin.hpp"), content, &settings());

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::MissingGuard);
        assert!(violations[0].auto_fixable);
        assert!(violations[0].suggestion.contains("#pragma once"));
    }

    #[test]
    fn test_clean_header() {
        let content = "#pragma once\n\nclass Plugin {};\n";
        assert!(validate_conventions(Path::new("src/plugin.hpp"), content, &settings()).is_empty());
    }

    #[test]
    fn test_classic_guard_accepted() {
        let content = "#ifndef PLUGIN_HPP\n#define PLUGIN_HPP\nclass Plugin {};\n#endif\n";
        assert!(has_include_guard(content, "#pragma once"));
        assert!(!has_include_guard("#ifndef A\n#define B\n", "#pragma once"));
        assert!(!has_include_guard("int x;", ""));
    }

    #[test]
    fn test_wrong_header_suffix() {
        let content = "#pragma once\n";
        let violations = validate_conventions(Path::new("src/plugin.h"), content, &settings());

        assert_eq!(kinds(&violations), vec![ViolationKind::WrongHeaderSuffix]);
        assert!(!violations[0].auto_fixable);
        assert!(violations[0].suggestion.contains("plugin.hpp"));
    }

    #[test]
    fn test_suffix_setting_with_leading_dot() {
        let settings = ConventionSettings {
            header_suffix: ".h".to_string(),
            ..ConventionSettings::default()
        };
        assert!(validate_conventions(Path::new("src/plugin.h"), "#pragma once", &settings).is_empty());
    }

    #[test]
    fn test_disabled_checks_are_skipped() {
        let settings = ConventionSettings {
            enforce_header_suffix: false,
            enforce_include_guard: false,
            ..ConventionSettings::default()
        };
        assert!(validate_conventions(Path::new("src/plugin.h"), "class A {};", &settings).is_empty());

        let settings = ConventionSettings {
            enforce_ui_dir: false,
            enforce_meta_object_include: false,
            ..ConventionSettings::default()
        };
        let content = "#include <QDialog>\nvoid Settings::save() { emit saved(); }\n";
        assert!(validate_conventions(Path::new("src/settings.cpp"), content, &settings).is_empty());
        assert_eq!(
            kinds(&validate_conventions(Path::new("src/settings.cpp"), content, &ConventionSettings::default())),
            vec![ViolationKind::UiOutsideUiDir, ViolationKind::MissingMetaObjectInclude]
        );
    }

    #[test]
    fn test_ui_class_outside_ui_dir() {
        let content = "#include <QDialog>\nSettings::Settings() { ui->setupUi(this); }\n";
        let outside = validate_conventions(Path::new("src/settings.cpp"), content, &settings());
        assert_eq!(kinds(&outside), vec![ViolationKind::UiOutsideUiDir]);

        let inside = validate_conventions(Path::new("src/ui/settings.cpp"), content, &settings());
        assert!(inside.is_empty());
    }

    #[test]
    fn test_missing_meta_object_include() {
        let content = "#include \"ui/dock.hpp\"\n\nvoid Worker::run() {\n    emit finished();\n}\n";
        let violations = validate_conventions(Path::new("src/worker.cpp"), content, &settings());

        assert_eq!(kinds(&violations), vec![ViolationKind::MissingMetaObjectInclude]);
        assert!(violations[0].auto_fixable);
        assert!(violations[0].suggestion.contains("moc_worker.cpp"));

        let fixed = format!("{}\n#include \"moc_worker.cpp\"\n", content);
        assert!(validate_conventions(Path::new("src/worker.cpp"), &fixed, &settings()).is_empty());
    }

    #[test]
    fn test_signal_slot_header_does_not_need_include() {
        let content = "#pragma once\nclass Worker : public QObject {\n    Q_OBJECT\nsignals:\n    void finished();\n};\n";
        assert!(validate_conventions(Path::new("src/worker.hpp"), content, &settings()).is_empty());
    }

    #[test]
    fn test_other_files_ignored() {
        assert!(validate_conventions(Path::new("CMakeLists.txt"), "QWidget", &settings()).is_empty());
        assert!(validate_conventions(Path::new("README.md"), "", &settings()).is_empty());
    }

    #[test]
    fn test_meta_object_include_line() {
        let include = meta_object_include(Path::new("src/ui/dock.cpp"), &settings());
        assert_eq!(include, "#include \"moc_dock.cpp\"");
    }
}
