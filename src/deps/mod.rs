//! Dependency cache resolution
//!
//! Reads the build system's `CMakeCache.txt` (`KEY:TYPE=VALUE` lines) from a
//! build directory and reduces it to the handful of dependency roots a plugin
//! project cares about. Parsing never fails hard: a missing file is reported
//! through [`CacheValidationResult::errors`], malformed lines are skipped.
//!
//! ```no_run
//! use plugwright::deps::{compare_dependencies, CacheResolver};
//! use plugwright::ProjectConfig;
//! use std::path::Path;
//!
//! let resolver = CacheResolver::real();
//! let result = resolver.parse_cache_file(Path::new("build_macos"));
//! let config = ProjectConfig::default();
//! let diff = compare_dependencies(&config.dependency_map(), &result.dependencies);
//! if diff.has_changes {
//!     println!("{} dependency roots differ", diff.differences.len());
//! }
//! ```

mod resolver;

pub use resolver::{compare_dependencies, CacheResolver, CACHE_FILE_NAME};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Semantic name of an external dependency root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKey {
    /// Host application SDK sources
    SdkSource,
    /// UI toolkit package root
    UiToolkit,
    /// UI toolkit core module
    UiToolkitCore,
    /// Host frontend API library
    FrontendApi,
    /// Host core library
    CoreLibrary,
}

impl DependencyKey {
    pub const ALL: [DependencyKey; 5] = [
        DependencyKey::SdkSource,
        DependencyKey::UiToolkit,
        DependencyKey::UiToolkitCore,
        DependencyKey::FrontendApi,
        DependencyKey::CoreLibrary,
    ];

    /// Cache entry name written by the configure step
    pub fn cache_key(&self) -> &'static str {
        match self {
            DependencyKey::SdkSource => "OBS_SOURCE_DIR",
            DependencyKey::UiToolkit => "Qt6_DIR",
            DependencyKey::UiToolkitCore => "Qt6Core_DIR",
            DependencyKey::FrontendApi => "obs-frontend-api_DIR",
            DependencyKey::CoreLibrary => "libobs_DIR",
        }
    }

    pub fn from_cache_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.cache_key() == key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKey::SdkSource => "sdk_source",
            DependencyKey::UiToolkit => "ui_toolkit",
            DependencyKey::UiToolkitCore => "ui_toolkit_core",
            DependencyKey::FrontendApi => "frontend_api",
            DependencyKey::CoreLibrary => "core_library",
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type DependencyMap = BTreeMap<DependencyKey, PathBuf>;

/// Outcome of parsing a dependency cache. Each reparse replaces the previous
/// map wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheValidationResult {
    pub success: bool,
    pub dependencies: DependencyMap,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl CacheValidationResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![error.into()],
            ..Default::default()
        }
    }
}

/// One dependency root whose configured and cached values disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyDifference {
    pub current: Option<PathBuf>,
    pub cache: Option<PathBuf>,
}

/// Report produced by [`compare_dependencies`]; never applied automatically
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyComparison {
    pub has_changes: bool,
    pub differences: BTreeMap<DependencyKey, DependencyDifference>,
}
