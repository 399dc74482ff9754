use super::{
    CacheValidationResult, DependencyComparison, DependencyDifference, DependencyKey,
    DependencyMap,
};
use crate::fs::{FileSystem, RealFileSystem};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const CACHE_FILE_NAME: &str = "CMakeCache.txt";

/// Parses dependency caches and inspects build directories
pub struct CacheResolver {
    fs: Arc<dyn FileSystem>,
    entry_re: Regex,
}

impl CacheResolver {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            entry_re: Regex::new(r"^([^:=#\s][^:=]*):([A-Za-z_]+)=(.*)$").expect("valid regex"),
        }
    }

    pub fn real() -> Self {
        Self::new(Arc::new(RealFileSystem::new()))
    }

    /// Parses `<build_dir>/CMakeCache.txt` into a semantic dependency map
    pub fn parse_cache_file(&self, build_dir: &Path) -> CacheValidationResult {
        let cache_path = build_dir.join(CACHE_FILE_NAME);

        if !self.fs.is_file(&cache_path) {
            warn!(path = %cache_path.display(), "Dependency cache not found");
            return CacheValidationResult::failed(format!(
                "{} not found in {}; run configure first",
                CACHE_FILE_NAME,
                build_dir.display()
            ));
        }

        let content = match self.fs.read_to_string(&cache_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %cache_path.display(), error = %e, "Failed to read dependency cache");
                return CacheValidationResult::failed(format!(
                    "Failed to read {}: {}",
                    cache_path.display(),
                    e
                ));
            }
        };

        let result = self.parse_cache_content(&content);
        info!(
            path = %cache_path.display(),
            dependencies = result.dependencies.len(),
            warnings = result.warnings.len(),
            "Parsed dependency cache"
        );
        result
    }

    /// Parses cache text. Empty content is a valid, empty cache.
    pub fn parse_cache_content(&self, content: &str) -> CacheValidationResult {
        let mut result = CacheValidationResult {
            success: true,
            ..Default::default()
        };
        let mut skipped = 0usize;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }

            let Some(caps) = self.entry_re.captures(line) else {
                skipped += 1;
                continue;
            };

            let Some(key) = DependencyKey::from_cache_key(caps[1].trim()) else {
                continue;
            };

            let value = caps[3].trim();
            if value.is_empty() || value.ends_with("-NOTFOUND") {
                result
                    .warnings
                    .push(format!("{} ({}) is not set in the cache", key, key.cache_key()));
                continue;
            }

            result.dependencies.insert(key, PathBuf::from(value));
        }

        if skipped > 0 {
            debug!(skipped, "Skipped malformed cache lines");
        }

        result
    }

    /// One warning per path that is missing or not a directory
    pub fn validate_dependency_paths(&self, dependencies: &DependencyMap) -> Vec<String> {
        let mut warnings = Vec::new();

        for (key, path) in dependencies {
            if !self.fs.exists(path) {
                warnings.push(format!("{} path does not exist: {}", key, path.display()));
            } else if !self.fs.is_dir(path) {
                warnings.push(format!(
                    "{} path is not a directory: {}",
                    key,
                    path.display()
                ));
            }
        }

        warnings
    }

    /// Immediate subdirectories of `root` named like a build directory that
    /// hold a dependency cache
    pub fn find_build_directories(&self, root: &Path) -> Vec<PathBuf> {
        let entries = match self.fs.read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "Cannot list project root");
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter(|entry| entry.is_dir() && entry.name.to_lowercase().contains("build"))
            .filter(|entry| self.fs.is_file(&entry.path.join(CACHE_FILE_NAME)))
            .map(|entry| entry.path)
            .collect()
    }
}

/// Reports every dependency root whose configured and cached values differ,
/// including roots present on only one side
pub fn compare_dependencies(current: &DependencyMap, cache: &DependencyMap) -> DependencyComparison {
    let mut comparison = DependencyComparison::default();

    for key in DependencyKey::ALL {
        let current_value = current.get(&key);
        let cache_value = cache.get(&key);

        if current_value != cache_value {
            comparison.differences.insert(
                key,
                DependencyDifference {
                    current: current_value.cloned(),
                    cache: cache_value.cloned(),
                },
            );
        }
    }

    comparison.has_changes = !comparison.differences.is_empty();
    comparison
}
