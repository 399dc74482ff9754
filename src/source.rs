//! Source file classification shared by convention checks, context assembly
//! and commit message derivation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx"];
pub const IMPLEMENTATION_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "m", "mm"];
const UI_EXTENSIONS: &[&str] = &["ui", "qml", "qrc"];

/// Role of a file within a plugin project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Header,
    Implementation,
    Ui,
    BuildScript,
    Other,
}

impl FileKind {
    /// Infers the kind from the path and extension. Files below `ui_dir`
    /// count as UI regardless of extension.
    pub fn infer(path: &Path, ui_dir: &str) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if file_name == "CMakeLists.txt" || file_name == "CMakePresets.json" {
            return FileKind::BuildScript;
        }

        let ext = extension(path);
        if ext == "cmake" {
            return FileKind::BuildScript;
        }
        if UI_EXTENSIONS.contains(&ext.as_str()) || is_under_dir(path, ui_dir) {
            return FileKind::Ui;
        }
        if HEADER_EXTENSIONS.contains(&ext.as_str()) {
            return FileKind::Header;
        }
        if IMPLEMENTATION_EXTENSIONS.contains(&ext.as_str()) {
            return FileKind::Implementation;
        }
        FileKind::Other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Header => "header",
            FileKind::Implementation => "implementation",
            FileKind::Ui => "ui",
            FileKind::BuildScript => "build_script",
            FileKind::Other => "other",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension without the dot, empty when absent
pub fn extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn is_header(path: &Path) -> bool {
    HEADER_EXTENSIONS.contains(&extension(path).as_str())
}

pub fn is_implementation(path: &Path) -> bool {
    IMPLEMENTATION_EXTENSIONS.contains(&extension(path).as_str())
}

/// True when `dir` (a slash-separated relative path) appears as a run of
/// components inside `path`
pub fn is_under_dir(path: &Path, dir: &str) -> bool {
    let wanted: Vec<&str> = dir
        .split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    if wanted.is_empty() {
        return false;
    }

    let parent: Vec<String> = path
        .parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();

    parent
        .windows(wanted.len())
        .any(|window| window.iter().zip(&wanted).all(|(a, b)| a == b))
}

/// Conventional counterparts of a header or implementation file: same
/// directory, same stem, the other family of extensions
pub fn sibling_candidates(path: &Path) -> Vec<PathBuf> {
    let counterparts: &[&str] = if is_header(path) {
        IMPLEMENTATION_EXTENSIONS
    } else if is_implementation(path) {
        HEADER_EXTENSIONS
    } else {
        return Vec::new();
    };

    counterparts
        .iter()
        .map(|ext| path.with_extension(ext))
        .collect()
}

/// Slash-separated form of a path as it appears in build output
pub fn normalize_path(raw: &str) -> String {
    let mut path = raw.trim().replace('\\', "/");
    while let Some(stripped) = path.strip_prefix("./") {
        path = stripped.to_string();
    }
    path
}
