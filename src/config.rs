//! Configuration management for plugwright
//!
//! Two layers:
//!
//! - [`ToolConfig`]: runtime settings loaded from environment variables with
//!   sensible defaults (timeouts, fix-loop bounds, commit policy, prompt limits).
//! - [`ProjectConfig`]: per-project data read from `plugwright.json` at the
//!   project root (presets, dependency roots, coding conventions). A missing
//!   file yields the defaults.
//!
//! # Environment Variables
//!
//! - `PLUGWRIGHT_BUILD_TIMEOUT`: build process timeout in seconds - default: "300"
//! - `PLUGWRIGHT_MAX_FIX_ITERATIONS`: fix loop bound - default: "3"
//! - `PLUGWRIGHT_COMMIT_POLICY`: never|compliant|always - default: "compliant"
//! - `PLUGWRIGHT_MAX_PROMPT_DIAGNOSTICS`: diagnostics listed in a prompt - default: "25"
//! - `PLUGWRIGHT_MAX_LOG_CHARS`: trailing build log characters sent to the AI - default: "6000"
//! - `PLUGWRIGHT_LOG_LEVEL`: logging level - default: "info"
//! - `PLUGWRIGHT_AI_COMMAND`: command that answers AI requests (envelope JSON
//!   on stdin, patch text on stdout) - default: unset

use crate::deps::DependencyMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_FIX_ITERATIONS: usize = 3;
const DEFAULT_MAX_PROMPT_DIAGNOSTICS: usize = 25;
const DEFAULT_MAX_LOG_CHARS: usize = 6000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// File name of the project configuration, relative to the project root
pub const PROJECT_CONFIG_FILE: &str = "plugwright.json";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),
}

/// Whether the Patch Manager honours a patch's `auto_commit` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitPolicy {
    /// Never commit, regardless of the patch flag
    Never,
    /// Commit when the patch was created convention-compliant
    Compliant,
    /// Commit every successfully applied patch
    Always,
}

impl CommitPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "never" => Some(CommitPolicy::Never),
            "compliant" => Some(CommitPolicy::Compliant),
            "always" => Some(CommitPolicy::Always),
            _ => None,
        }
    }

    pub fn should_commit(&self, auto_commit: bool) -> bool {
        match self {
            CommitPolicy::Never => false,
            CommitPolicy::Compliant => auto_commit,
            CommitPolicy::Always => true,
        }
    }
}

/// Runtime settings for the tool itself
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub build_timeout_secs: u64,
    pub max_fix_iterations: usize,
    pub commit_policy: CommitPolicy,
    pub max_prompt_diagnostics: usize,
    pub max_log_chars: usize,
    pub log_level: String,
    pub ai_command: Option<String>,
}

impl Default for ToolConfig {
    /// Loads `PLUGWRIGHT_*` variables, falling back to defaults for anything
    /// missing or unparsable
    fn default() -> Self {
        let build_timeout_secs = env::var("PLUGWRIGHT_BUILD_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_BUILD_TIMEOUT_SECS);

        let max_fix_iterations = env::var("PLUGWRIGHT_MAX_FIX_ITERATIONS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_FIX_ITERATIONS);

        let commit_policy = env::var("PLUGWRIGHT_COMMIT_POLICY")
            .ok()
            .and_then(|v| CommitPolicy::parse(&v))
            .unwrap_or(CommitPolicy::Compliant);

        let max_prompt_diagnostics = env::var("PLUGWRIGHT_MAX_PROMPT_DIAGNOSTICS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_PROMPT_DIAGNOSTICS);

        let max_log_chars = env::var("PLUGWRIGHT_MAX_LOG_CHARS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_LOG_CHARS);

        let log_level = env::var("PLUGWRIGHT_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        let ai_command = env::var("PLUGWRIGHT_AI_COMMAND")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Self {
            build_timeout_secs,
            max_fix_iterations,
            commit_policy,
            max_prompt_diagnostics,
            max_log_chars,
            log_level,
            ai_command,
        }
    }
}

impl ToolConfig {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Build timeout must be at least 1 second".to_string(),
            ));
        }
        if self.max_fix_iterations == 0 {
            return Err(ConfigError::ValidationFailed(
                "Fix loop needs at least one iteration".to_string(),
            ));
        }
        if self.max_prompt_diagnostics == 0 {
            return Err(ConfigError::ValidationFailed(
                "At least one diagnostic must fit in a prompt".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                self.log_level
            ))),
        }
    }

    pub fn to_display_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();

        map.insert(
            "build_timeout_secs".to_string(),
            self.build_timeout_secs.to_string(),
        );
        map.insert(
            "max_fix_iterations".to_string(),
            self.max_fix_iterations.to_string(),
        );
        map.insert(
            "commit_policy".to_string(),
            format!("{:?}", self.commit_policy).to_lowercase(),
        );
        map.insert(
            "max_prompt_diagnostics".to_string(),
            self.max_prompt_diagnostics.to_string(),
        );
        map.insert("max_log_chars".to_string(), self.max_log_chars.to_string());
        map.insert("log_level".to_string(), self.log_level.clone());
        if let Some(ref command) = self.ai_command {
            map.insert("ai_command".to_string(), command.clone());
        }

        map
    }
}

impl fmt::Display for ToolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plugwright Configuration:")?;
        writeln!(f, "  Build Timeout: {}s", self.build_timeout_secs)?;
        writeln!(f, "  Max Fix Iterations: {}", self.max_fix_iterations)?;
        writeln!(f, "  Commit Policy: {:?}", self.commit_policy)?;
        writeln!(f, "  Max Prompt Diagnostics: {}", self.max_prompt_diagnostics)?;
        writeln!(f, "  Max Log Chars: {}", self.max_log_chars)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(
            f,
            "  AI Command: {}",
            self.ai_command.as_deref().unwrap_or("(not set)")
        )?;
        Ok(())
    }
}

/// A named, platform-specific build configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub configure: String,
    pub build: String,
    #[serde(default)]
    pub clean: Option<String>,
    /// Build output directory, relative to the project root
    pub build_dir: PathBuf,
}

impl Preset {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    fn cmake(id: &str, name: &str, build_dir: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            configure: format!("cmake --preset {}", id),
            build: format!("cmake --build --preset {}", id),
            clean: Some(format!("cmake --build --preset {} --target clean", id)),
            build_dir: PathBuf::from(build_dir),
        }
    }
}

/// Project coding conventions checked by the diagnostics layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConventionSettings {
    /// Expected header extension, without the dot
    pub header_suffix: String,
    /// Directive expected near the top of every header
    pub include_guard: String,
    /// Directory where UI classes live, relative to the project root
    pub ui_dir: String,
    /// Prefix of generated meta-object sources (`moc_<stem>.cpp`)
    pub meta_object_prefix: String,
    pub enforce_header_suffix: bool,
    pub enforce_include_guard: bool,
    pub enforce_ui_dir: bool,
    pub enforce_meta_object_include: bool,
}

impl Default for ConventionSettings {
    fn default() -> Self {
        Self {
            header_suffix: "hpp".to_string(),
            include_guard: "#pragma once".to_string(),
            ui_dir: "src/ui".to_string(),
            meta_object_prefix: "moc_".to_string(),
            enforce_header_suffix: true,
            enforce_include_guard: true,
            enforce_ui_dir: true,
            enforce_meta_object_include: true,
        }
    }
}

/// Per-project configuration read from `plugwright.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub presets: Vec<Preset>,
    /// Configured dependency roots, by semantic key
    pub dependencies: DependencyMap,
    /// Directory holding downloaded dependencies, relative to the project root
    pub deps_dir: String,
    pub conventions: ConventionSettings,
    /// Project template; selects the AI prompt set
    pub template: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            presets: vec![
                Preset::cmake("macos", "macOS Universal", "build_macos"),
                Preset::cmake("windows-x64", "Windows x64", "build_x64"),
                Preset::cmake("linux-x86_64", "Linux x86_64", "build_x86_64"),
            ],
            dependencies: DependencyMap::new(),
            deps_dir: ".deps".to_string(),
            conventions: ConventionSettings::default(),
            template: "native-plugin".to_string(),
        }
    }
}

impl ProjectConfig {
    /// Loads `plugwright.json` from `root`, or defaults when it is absent
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(PROJECT_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let config: ProjectConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                field: path.display().to_string(),
                error: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for preset in &self.presets {
            if preset.id.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "Preset id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(preset.id.as_str()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "Duplicate preset id: {}",
                    preset.id
                )));
            }
            if preset.configure.trim().is_empty() || preset.build.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "Preset {} needs configure and build commands",
                    preset.id
                )));
            }
        }

        if crate::context::prompts::for_template(&self.template).is_none() {
            return Err(ConfigError::ValidationFailed(format!(
                "Unknown template '{}' (expected one of: {})",
                self.template,
                crate::context::prompts::TEMPLATES.join(", ")
            )));
        }

        if self.conventions.header_suffix.trim_start_matches('.').is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Header suffix cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn preset(&self, id: &str) -> Result<&Preset, ConfigError> {
        self.presets
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ConfigError::UnknownPreset(id.to_string()))
    }

    /// The preset matching the host platform, else the first declared one
    pub fn default_preset(&self) -> Option<&Preset> {
        let platform_hint = if cfg!(target_os = "macos") {
            "macos"
        } else if cfg!(target_os = "windows") {
            "windows"
        } else {
            "linux"
        };

        self.presets
            .iter()
            .find(|p| p.id.contains(platform_hint))
            .or_else(|| self.presets.first())
    }

    pub fn dependency_map(&self) -> DependencyMap {
        self.dependencies.clone()
    }
}
