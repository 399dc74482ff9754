use crate::context::Intent;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Build, diagnose and patch native plugin projects
#[derive(Parser, Debug)]
#[command(
    name = "plugwright",
    about = "Build, diagnose and patch native plugin projects",
    version,
    author,
    long_about = "plugwright runs a project's configure/build/clean presets, turns compiler, \
                  linker and CMake output into structured diagnostics, assembles context for \
                  an AI assistant and applies the patches it returns, checked against the \
                  project's coding conventions."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run a preset's configure command",
        long_about = "Runs the configure command of a preset and reconciles the dependency \
                      roots found in the resulting CMakeCache.txt with plugwright.json.\n\n\
                      Examples:\n  \
                      plugwright configure\n  \
                      plugwright configure --preset windows-x64"
    )]
    Configure(RunArgs),

    #[command(
        about = "Run a preset's build command",
        long_about = "Runs the build command of a preset, streaming its output, and reports \
                      the diagnostics found in it. Ctrl-C cancels the build.\n\n\
                      Examples:\n  \
                      plugwright build\n  \
                      plugwright build --preset macos --format json"
    )]
    Build(RunArgs),

    #[command(about = "Run a preset's clean command")]
    Clean(RunArgs),

    #[command(
        about = "Build and let the AI backend fix errors",
        long_about = "Builds a preset and, while it fails, sends the errors to the command in \
                      PLUGWRIGHT_AI_COMMAND, applies the patch it returns and rebuilds.\n\n\
                      Examples:\n  \
                      PLUGWRIGHT_AI_COMMAND=./ask-ai plugwright fix\n  \
                      plugwright fix --preset linux --max-iterations 5"
    )]
    Fix(FixArgs),

    #[command(
        about = "Extract diagnostics from a saved build log",
        long_about = "Parses GCC/Clang, MSVC, CMake and linker messages from a log file.\n\n\
                      Examples:\n  \
                      plugwright diagnose build.log\n  \
                      plugwright diagnose - < build.log"
    )]
    Diagnose(DiagnoseArgs),

    #[command(
        about = "Check source files against the project conventions",
        long_about = "Reports header suffix, include guard, UI directory and meta-object \
                      include violations. With --fix, applies the auto-fixable ones.\n\n\
                      Examples:\n  \
                      plugwright check src/plugin.hpp src/ui/dock.cpp\n  \
                      plugwright check --fix src/plugin.hpp"
    )]
    Check(CheckArgs),

    #[command(
        about = "Inspect dependency roots in a build directory's cache",
        long_about = "Reads CMakeCache.txt from a build directory and compares the dependency \
                      roots it records with plugwright.json.\n\n\
                      Examples:\n  \
                      plugwright deps build_macos\n  \
                      plugwright deps --list"
    )]
    Deps(DepsArgs),

    #[command(
        about = "Print the request envelope the AI backend would receive",
        long_about = "Assembles prompts, file snippets and project structure for a question.\n\n\
                      Examples:\n  \
                      plugwright context \"Why does the dock not show?\"\n  \
                      plugwright context --intent fix --file src/plugin.cpp --line 42 \"fix this\""
    )]
    Context(ContextArgs),

    #[command(
        about = "Validate and apply an AI-generated patch",
        long_about = "Classifies a unified diff or SEARCH/REPLACE edit instructions, checks the \
                      targets and, with --apply, applies and commits it per the commit policy.\n\n\
                      Examples:\n  \
                      plugwright patch fix.diff\n  \
                      plugwright patch response.txt --apply"
    )]
    Patch(PatchArgs),

    #[command(about = "Show the effective tool configuration")]
    Config(ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ProjectArgs {
    #[arg(
        short = 'r',
        long,
        value_name = "PATH",
        help = "Project root (defaults to current directory)"
    )]
    pub root: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(
        short = 'p',
        long,
        value_name = "ID",
        help = "Preset id (defaults to the preset for this platform)"
    )]
    pub preset: Option<String>,

    #[arg(long, value_name = "SECONDS", help = "Override the build timeout")]
    pub timeout: Option<u64>,
}

#[derive(Parser, Debug, Clone)]
pub struct FixArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[arg(long, value_name = "N", help = "Override the fix iteration bound")]
    pub max_iterations: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct DiagnoseArgs {
    #[arg(value_name = "LOG", help = "Build log to parse, or - for stdin")]
    pub log: PathBuf,

    #[arg(
        short = 'p',
        long,
        value_name = "ID",
        default_value = "",
        help = "Preset id recorded on each diagnostic"
    )]
    pub preset: String,

    #[arg(long, help = "Only report errors")]
    pub errors_only: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct CheckArgs {
    #[arg(value_name = "FILE", required = true, help = "Files to check")]
    pub files: Vec<PathBuf>,

    #[arg(long, help = "Apply auto-fixable violations in place")]
    pub fix: bool,

    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct DepsArgs {
    #[arg(
        value_name = "BUILD_DIR",
        help = "Build directory holding CMakeCache.txt (defaults to the preset's)"
    )]
    pub build_dir: Option<PathBuf>,

    #[arg(long, help = "List build directories that contain a cache")]
    pub list: bool,

    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct ContextArgs {
    #[arg(value_name = "QUESTION", help = "Question or instruction for the assistant")]
    pub question: String,

    #[arg(
        short = 'i',
        long,
        value_enum,
        default_value = "assist",
        help = "Request intent"
    )]
    pub intent: IntentArg,

    #[arg(long, value_name = "FILE", help = "Active file")]
    pub file: Option<PathBuf>,

    #[arg(
        long,
        value_name = "LINE",
        requires = "file",
        help = "Cursor line in the active file (defaults to 1)"
    )]
    pub line: Option<u32>,

    #[arg(short = 'p', long, value_name = "ID", help = "Preset id to mention")]
    pub preset: Option<String>,

    #[arg(long, value_name = "LOG", help = "Build log to include")]
    pub log: Option<PathBuf>,

    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct PatchArgs {
    #[arg(value_name = "FILE", help = "Patch text, or - for stdin")]
    pub patch: PathBuf,

    #[arg(
        short = 't',
        long = "target",
        value_name = "PATH",
        help = "Target file (repeatable; derived from the patch when omitted)"
    )]
    pub targets: Vec<String>,

    #[arg(long, help = "Apply the patch after validation")]
    pub apply: bool,

    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentArg {
    Compile,
    Fix,
    Assist,
}

impl From<IntentArg> for Intent {
    fn from(arg: IntentArg) -> Self {
        match arg {
            IntentArg::Compile => Intent::Compile,
            IntentArg::Fix => Intent::Fix,
            IntentArg::Assist => Intent::Assist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_build_args() {
        let args = CliArgs::parse_from(["plugwright", "build"]);
        match args.command {
            Commands::Build(run) => {
                assert!(run.preset.is_none());
                assert!(run.timeout.is_none());
                assert!(run.project.root.is_none());
                assert_eq!(run.project.format, OutputFormatArg::Human);
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_configure_with_options() {
        let args = CliArgs::parse_from([
            "plugwright",
            "configure",
            "--preset",
            "windows-x64",
            "--root",
            "/tmp/plugin",
            "--format",
            "json",
            "--timeout",
            "30",
        ]);
        match args.command {
            Commands::Configure(run) => {
                assert_eq!(run.preset.as_deref(), Some("windows-x64"));
                assert_eq!(run.project.root, Some(PathBuf::from("/tmp/plugin")));
                assert_eq!(run.project.format, OutputFormatArg::Json);
                assert_eq!(run.timeout, Some(30));
            }
            _ => panic!("Expected Configure command"),
        }
    }

    #[test]
    fn test_fix_args() {
        let args = CliArgs::parse_from(["plugwright", "fix", "-p", "linux", "--max-iterations", "5"]);
        match args.command {
            Commands::Fix(fix) => {
                assert_eq!(fix.run.preset.as_deref(), Some("linux"));
                assert_eq!(fix.max_iterations, Some(5));
            }
            _ => panic!("Expected Fix command"),
        }
    }

    #[test]
    fn test_diagnose_args() {
        let args = CliArgs::parse_from(["plugwright", "diagnose", "build.log", "--errors-only"]);
        match args.command {
            Commands::Diagnose(diag) => {
                assert_eq!(diag.log, PathBuf::from("build.log"));
                assert!(diag.errors_only);
                assert_eq!(diag.preset, "");
            }
            _ => panic!("Expected Diagnose command"),
        }
    }

    #[test]
    fn test_check_requires_files() {
        assert!(CliArgs::try_parse_from(["plugwright", "check"]).is_err());

        let args = CliArgs::parse_from(["plugwright", "check", "--fix", "a.hpp", "b.cpp"]);
        match args.command {
            Commands::Check(check) => {
                assert!(check.fix);
                assert_eq!(check.files.len(), 2);
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_deps_list() {
        let args = CliArgs::parse_from(["plugwright", "deps", "--list"]);
        match args.command {
            Commands::Deps(deps) => {
                assert!(deps.list);
                assert!(deps.build_dir.is_none());
            }
            _ => panic!("Expected Deps command"),
        }
    }

    #[test]
    fn test_context_args() {
        let args = CliArgs::parse_from([
            "plugwright",
            "context",
            "--intent",
            "fix",
            "--file",
            "src/plugin.cpp",
            "--line",
            "42",
            "fix the build",
        ]);
        match args.command {
            Commands::Context(ctx) => {
                assert_eq!(ctx.intent, IntentArg::Fix);
                assert_eq!(Intent::from(ctx.intent), Intent::Fix);
                assert_eq!(ctx.file, Some(PathBuf::from("src/plugin.cpp")));
                assert_eq!(ctx.line, Some(42));
                assert_eq!(ctx.question, "fix the build");
            }
            _ => panic!("Expected Context command"),
        }
    }

    #[test]
    fn test_context_line_requires_file() {
        assert!(CliArgs::try_parse_from(["plugwright", "context", "--line", "3", "q"]).is_err());
    }

    #[test]
    fn test_patch_targets_repeatable() {
        let args = CliArgs::parse_from([
            "plugwright",
            "patch",
            "fix.diff",
            "-t",
            "src/a.cpp",
            "--target",
            "src/b.hpp",
            "--apply",
        ]);
        match args.command {
            Commands::Patch(patch) => {
                assert_eq!(patch.targets, vec!["src/a.cpp", "src/b.hpp"]);
                assert!(patch.apply);
            }
            _ => panic!("Expected Patch command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["plugwright", "-v", "build"]);
        assert!(args.verbose);
        assert!(!args.quiet);

        let args = CliArgs::parse_from(["plugwright", "-q", "config"]);
        assert!(args.quiet);

        let args = CliArgs::parse_from(["plugwright", "--log-level", "debug", "config"]);
        assert_eq!(args.log_level, Some("debug".to_string()));

        assert!(CliArgs::try_parse_from(["plugwright", "-v", "-q", "config"]).is_err());
    }
}
