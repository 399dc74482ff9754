//! plugwright - build, diagnose and patch native plugin projects
//!
//! This library drives the edit/build/fix cycle of CMake-based native
//! plugins (Qt UI, OBS-style host SDKs): it runs build presets as child
//! processes, turns their output into structured diagnostics, reconciles
//! dependency roots recorded by the build system, assembles context for an
//! AI assistant, and validates and applies the patches it returns.
//!
//! # Core Concepts
//!
//! - **Presets**: named, platform-specific configure/build/clean commands
//!   read from `plugwright.json`
//! - **Diagnostics**: compiler, linker and CMake messages normalized to
//!   file/line/column/severity, optionally tagged with a convention violation
//! - **Request envelope**: prompts, code snippets and project structure for
//!   one AI request
//! - **Patches**: unified diffs or SEARCH/REPLACE edit instructions, applied
//!   all-or-nothing and committed according to the commit policy
//!
//! # Example Usage
//!
//! ```no_run
//! use plugwright::{BuildOrchestrator, ProjectConfig};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let root = Path::new(".");
//! let config = ProjectConfig::load(root)?;
//! let preset = config.default_preset().ok_or("no presets")?;
//!
//! let result = BuildOrchestrator::new().build(preset, root).await?;
//! for error in result.errors() {
//!     println!("{}", error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`build`]: process orchestration for configure/build/clean
//! - [`diagnostics`]: output parsing and convention checks
//! - [`deps`]: dependency cache resolution
//! - [`context`]: AI request assembly
//! - [`patch`]: patch classification, validation and application
//! - [`workflow`]: the build/fix loop tying them together

pub mod ai;
pub mod build;
pub mod cli;
pub mod config;
pub mod context;
pub mod deps;
pub mod diagnostics;
pub mod fs;
pub mod patch;
pub mod process;
pub mod progress;
pub mod source;
pub mod util;
pub mod workflow;

pub use ai::{AiBackend, BackendError, CommandBackend, MockBackend};
pub use build::{BuildAction, BuildError, BuildOrchestrator, BuildResult, Termination};
pub use config::{CommitPolicy, ConfigError, ConventionSettings, Preset, ProjectConfig, ToolConfig};
pub use context::{ContextAssembler, ContextRequest, Intent, RequestEnvelope};
pub use deps::{CacheResolver, CacheValidationResult, DependencyComparison, DependencyKey};
pub use diagnostics::{ConventionViolation, Diagnostic, DiagnosticExtractor, Severity, ViolationKind};
pub use patch::{PatchError, PatchKind, PatchManager, PatchOperation, PatchStatus};
pub use util::{init_from_env, init_logging, LoggingConfig};
pub use workflow::{FixLoop, FixOutcome, FixReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
