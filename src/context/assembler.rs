use super::prompts::{self, PromptSet, DEFAULT_TEMPLATE};
use super::{format_errors_for_ai, ContextRequest, FileContext, Intent, ProjectStructure, RequestEnvelope};
use crate::config::{ProjectConfig, ToolConfig};
use crate::fs::{FileSystem, RealFileSystem};
use crate::source::{sibling_candidates, FileKind};
use crate::util::interpolate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lines of context on each side of the cursor
pub const SNIPPET_RADIUS: u32 = 10;

/// Characters kept from a header/implementation sibling
pub const SIBLING_MAX_CHARS: usize = 1000;

/// Build directories reported in the project structure, when they exist
pub const BUILD_DIR_CANDIDATES: &[&str] = &[
    "build_macos",
    "build_x64",
    "build_x86_64",
    "build_aarch64",
    "build",
];

const PRESET_MANIFEST: &str = "CMakePresets.json";

#[derive(Deserialize)]
struct PresetManifest {
    #[serde(default, rename = "configurePresets")]
    configure_presets: Vec<ManifestPreset>,
}

#[derive(Deserialize)]
struct ManifestPreset {
    name: String,
}

/// Builds [`RequestEnvelope`]s for one project
pub struct ContextAssembler {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    config: ProjectConfig,
    max_diagnostics: usize,
    max_log_chars: usize,
}

impl ContextAssembler {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, config: ProjectConfig) -> Self {
        let tool = ToolConfig::default();
        Self {
            fs,
            root: root.into(),
            config,
            max_diagnostics: tool.max_prompt_diagnostics,
            max_log_chars: tool.max_log_chars,
        }
    }

    pub fn real(root: impl Into<PathBuf>, config: ProjectConfig) -> Self {
        Self::new(Arc::new(RealFileSystem::new()), root, config)
    }

    pub fn with_limits(mut self, max_diagnostics: usize, max_log_chars: usize) -> Self {
        self.max_diagnostics = max_diagnostics;
        self.max_log_chars = max_log_chars;
        self
    }

    pub fn assemble(&self, request: &ContextRequest) -> RequestEnvelope {
        let prompts = self.prompt_set();
        let template = match request.intent {
            Intent::Fix => prompts.fix,
            Intent::Compile | Intent::Assist => prompts.general,
        };
        let system_prompt = interpolate(template, &self.template_values(request.preset_id.as_deref()));

        let mut file_context = Vec::new();
        if let Some(active) = &request.active_file {
            let path = self.resolve(&active.path);
            match self.snippet(&path, active.line) {
                Some(snippet) => {
                    file_context.push(snippet);
                    file_context.extend(self.sibling(&path));
                }
                None => warn!(path = %path.display(), "Active file not readable; skipping file context"),
            }
        }

        let envelope = RequestEnvelope {
            intent: request.intent,
            system_prompt,
            user_prompt: self.user_prompt(request),
            file_context,
            build_log: request
                .build_log
                .as_deref()
                .filter(|log| !log.trim().is_empty())
                .map(|log| tail_chars(log, self.max_log_chars)),
            conventions: self.config.conventions.clone(),
            project_structure: self.project_structure(),
        };

        debug!(
            intent = %envelope.intent,
            files = envelope.file_context.len(),
            diagnostics = request.diagnostics.len(),
            "Assembled AI request"
        );
        envelope
    }

    /// Build directories, manifest presets, UI and dependency directories
    pub fn project_structure(&self) -> ProjectStructure {
        let build_dirs = BUILD_DIR_CANDIDATES
            .iter()
            .filter(|name| self.fs.is_dir(&self.root.join(name)))
            .map(|name| name.to_string())
            .collect();

        ProjectStructure {
            build_dirs,
            presets: self.manifest_presets(),
            ui_dir: self.config.conventions.ui_dir.clone(),
            deps_dir: self.config.deps_dir.clone(),
        }
    }

    fn prompt_set(&self) -> PromptSet {
        prompts::for_template(&self.config.template).unwrap_or_else(|| {
            warn!(template = %self.config.template, "Unknown project template; using {}", DEFAULT_TEMPLATE);
            PromptSet::default()
        })
    }

    fn template_values(&self, preset_id: Option<&str>) -> HashMap<&'static str, String> {
        let preset = preset_id
            .and_then(|id| self.config.preset(id).ok())
            .or_else(|| self.config.default_preset());

        let conventions = &self.config.conventions;
        let mut values = HashMap::new();
        values.insert(
            "preset",
            preset
                .map(|p| p.display_name().to_string())
                .or_else(|| preset_id.map(str::to_string))
                .unwrap_or_else(|| "default".to_string()),
        );
        values.insert(
            "build_dir",
            preset
                .map(|p| p.build_dir.display().to_string())
                .unwrap_or_else(|| "build".to_string()),
        );
        values.insert("dependency_root", self.config.deps_dir.clone());
        values.insert("ui_dir", conventions.ui_dir.clone());
        values.insert(
            "header_suffix",
            conventions.header_suffix.trim_start_matches('.').to_string(),
        );
        values.insert("include_guard", conventions.include_guard.clone());
        values
    }

    fn user_prompt(&self, request: &ContextRequest) -> String {
        let mut prompt = request.question.trim().to_string();

        if !request.diagnostics.is_empty() && request.intent != Intent::Assist {
            let heading = match request.intent {
                Intent::Fix => "Build errors:",
                _ => "Build diagnostics:",
            };
            prompt.push_str("\n\n");
            prompt.push_str(heading);
            prompt.push('\n');
            prompt.push_str(&format_errors_for_ai(&request.diagnostics, self.max_diagnostics));
        }

        prompt
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
            .replace('\\', "/")
    }

    fn snippet(&self, path: &Path, line: u32) -> Option<FileContext> {
        let content = self.fs.read_to_string(path).ok()?;
        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len() as u32;

        let cursor = line.clamp(1, total.max(1));
        let start = cursor.saturating_sub(SNIPPET_RADIUS).max(1);
        let end = (cursor + SNIPPET_RADIUS).min(total);
        let window = if total == 0 {
            String::new()
        } else {
            lines[(start - 1) as usize..end as usize].join("\n")
        };

        Some(FileContext {
            path: self.display_path(path),
            kind: FileKind::infer(path, &self.config.conventions.ui_dir),
            content: window,
            start_line: start,
            end_line: end.max(start),
            truncated: start > 1 || end < total,
        })
    }

    fn sibling(&self, path: &Path) -> Option<FileContext> {
        let sibling = sibling_candidates(path)
            .into_iter()
            .find(|candidate| self.fs.is_file(candidate))?;
        let content = self.fs.read_to_string(&sibling).ok()?;

        let (content, truncated) = truncate_chars(&content, SIBLING_MAX_CHARS);
        let end_line = content.lines().count().max(1) as u32;

        Some(FileContext {
            path: self.display_path(&sibling),
            kind: FileKind::infer(&sibling, &self.config.conventions.ui_dir),
            content,
            start_line: 1,
            end_line,
            truncated,
        })
    }

    fn manifest_presets(&self) -> Vec<String> {
        let path = self.root.join(PRESET_MANIFEST);
        if !self.fs.is_file(&path) {
            return Vec::new();
        }

        let parsed = self
            .fs
            .read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<PresetManifest>(&content).ok());
        match parsed {
            Some(manifest) => manifest
                .configure_presets
                .into_iter()
                .map(|p| p.name)
                .collect(),
            None => {
                warn!(path = %path.display(), "Could not parse preset manifest");
                Vec::new()
            }
        }
    }
}

/// First `max` characters, cut on a char boundary
fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// Last `max` characters, cut on a char boundary
fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    match text.char_indices().nth(count - max) {
        Some((idx, _)) => text[idx..].to_string(),
        None => String::new(),
    }
}
