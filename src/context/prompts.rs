//! System prompt templates for AI requests
//!
//! Placeholders: `{{preset}}`, `{{build_dir}}`, `{{dependency_root}}`,
//! `{{ui_dir}}`, `{{header_suffix}}`, `{{include_guard}}`.
//!
//! A project's `template` picks one [`PromptSet`].

/// The general and error-analysis prompts for one project template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptSet {
    pub general: &'static str,
    pub fix: &'static str,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            general: GENERAL_SYSTEM_PROMPT,
            fix: FIX_SYSTEM_PROMPT,
        }
    }
}

pub const DEFAULT_TEMPLATE: &str = "native-plugin";

/// Template names accepted in `plugwright.json`
pub const TEMPLATES: &[&str] = &[DEFAULT_TEMPLATE, "cmake-library"];

/// Prompt set for a project template name
pub fn for_template(name: &str) -> Option<PromptSet> {
    match name.trim() {
        "" | DEFAULT_TEMPLATE => Some(PromptSet::default()),
        "cmake-library" => Some(PromptSet {
            general: LIBRARY_SYSTEM_PROMPT,
            fix: LIBRARY_FIX_SYSTEM_PROMPT,
        }),
        _ => None,
    }
}

/// General project-expert prompt, used for compile and assist requests
pub const GENERAL_SYSTEM_PROMPT: &str = r#"You are an expert in native plugin development with CMake and Qt. You are helping on a plugin project built with the {{preset}} preset.

PROJECT LAYOUT:
- Build output: {{build_dir}}
- Downloaded dependencies: {{dependency_root}}
- UI classes and forms: {{ui_dir}}

PROJECT CONVENTIONS:
1. Headers use the .{{header_suffix}} extension
2. Every header starts with {{include_guard}}
3. Classes that derive from Qt widgets or use Ui:: forms live under {{ui_dir}}
4. Implementation files of classes with signals or slots include their generated moc_<name>.cpp at the end

Answer concisely. When you propose a code change, follow the conventions above."#;

/// Error-analysis prompt, used for fix requests
pub const FIX_SYSTEM_PROMPT: &str = r#"You are an expert at diagnosing and fixing native plugin build failures (CMake, Clang/GCC, MSVC, Qt). The project is built with the {{preset}} preset into {{build_dir}}; dependencies live in {{dependency_root}}.

PROJECT CONVENTIONS:
1. Headers use the .{{header_suffix}} extension and start with {{include_guard}}
2. UI classes and forms live under {{ui_dir}}
3. Implementation files of classes with signals or slots include their generated moc_<name>.cpp at the end

TASK:
Find the root cause of the listed errors, starting with the first one. Later errors are often consequences of earlier ones.

RESPONSE FORMAT:
Reply with exactly one fix, in one of these forms and nothing else:

A unified diff against the project root:
--- a/src/plugin.cpp
+++ b/src/plugin.cpp
@@ -10,3 +10,3 @@
 ...

Or edit instructions, one block per change:
FILE: src/plugin.cpp
<<<<<<< SEARCH
exact existing text
=======
replacement text
>>>>>>> REPLACE

The SEARCH text must match the file exactly. Leave SEARCH empty to append to the file. Only touch files that already exist."#;

/// General prompt for plain CMake C/C++ libraries without a UI layer
pub const LIBRARY_SYSTEM_PROMPT: &str = r#"You are an expert in C and C++ libraries built with CMake. The project is built with the {{preset}} preset into {{build_dir}}; dependencies live in {{dependency_root}}.

PROJECT CONVENTIONS:
1. Headers use the .{{header_suffix}} extension
2. Every header starts with {{include_guard}}

Answer concisely. When you propose a code change, follow the conventions above."#;

/// Error-analysis prompt for plain CMake C/C++ libraries
pub const LIBRARY_FIX_SYSTEM_PROMPT: &str = r#"You are an expert at diagnosing and fixing CMake C/C++ build failures (Clang/GCC, MSVC, linkers). The project is built with the {{preset}} preset into {{build_dir}}; dependencies live in {{dependency_root}}.

PROJECT CONVENTIONS:
1. Headers use the .{{header_suffix}} extension and start with {{include_guard}}

TASK:
Find the root cause of the listed errors, starting with the first one. Later errors are often consequences of earlier ones.

RESPONSE FORMAT:
Reply with exactly one fix, either a unified diff against the project root or edit instructions, one block per change:
FILE: src/library.cpp
<<<<<<< SEARCH
exact existing text
=======
replacement text
>>>>>>> REPLACE

The SEARCH text must match the file exactly. Leave SEARCH empty to append to the file. Only touch files that already exist."#;
