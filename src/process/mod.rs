//! External process capability
//!
//! Build tools and version control are reached through one small seam:
//! [`CommandRunner::run`] takes a parsed [`CommandLine`] and a working
//! directory and returns the exit code plus captured output. Tests swap in
//! [`MockCommandRunner`].

mod mock;
mod system;

pub use mock::{MockCommandRunner, RecordedCall};
pub use system::TokioCommandRunner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Exit code reported when a process could not be started at all
pub const SPAWN_FAILED_EXIT_CODE: i32 = -1;

/// Executable plus arguments, split from a composed command string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a command string on whitespace, honouring single and double
    /// quotes. Backslashes are literal outside double quotes so Windows paths
    /// survive. Returns `None` for an empty command.
    pub fn parse(command: &str) -> Option<Self> {
        let mut words = Vec::new();
        let mut current = String::new();
        let mut in_word = false;
        let mut quote: Option<char> = None;
        let mut chars = command.chars().peekable();

        while let Some(c) = chars.next() {
            match quote {
                Some(q) if c == q => quote = None,
                Some('"') if c == '\\' && matches!(chars.peek(), Some('"') | Some('\\')) => {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                }
                Some(_) => current.push(c),
                None if c == '"' || c == '\'' => {
                    quote = Some(c);
                    in_word = true;
                }
                None if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                None => {
                    current.push(c);
                    in_word = true;
                }
            }
        }
        if in_word {
            words.push(current);
        }

        let mut words = words.into_iter();
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote_word(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote_word(arg))?;
        }
        Ok(())
    }
}

fn quote_word(word: &str) -> String {
    if word.is_empty() || word.chars().any(|c| c.is_whitespace() || c == '\'') {
        format!("\"{}\"", word.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        word.to_string()
    }
}

/// Exit code and captured streams of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed stderr, falling back to stdout when stderr is empty
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs an external command to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// A non-zero exit is an `Ok` output; `Err` means the process never ran
    async fn run(&self, command: &CommandLine, cwd: &Path) -> anyhow::Result<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> CommandLine {
        CommandLine::parse(s).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let cmd = parse("cmake --build build_macos --config RelWithDebInfo");
        assert_eq!(cmd.program, "cmake");
        assert_eq!(
            cmd.args,
            vec!["--build", "build_macos", "--config", "RelWithDebInfo"]
        );
    }

    #[test]
    fn test_parse_quotes() {
        let cmd = parse(r#"cmake -S . -B "build dir" -DNAME='my plugin' -DX="a\"b""#);
        assert_eq!(
            cmd.args,
            vec!["-S", ".", "-B", "build dir", "-DNAME=my plugin", "-DX=a\"b"]
        );
    }

    #[test]
    fn test_parse_windows_paths() {
        let cmd = parse(r"cmake --build C:\work\plugin\build_x64");
        assert_eq!(cmd.args[1], r"C:\work\plugin\build_x64");
    }

    #[test]
    fn test_parse_empty_quoted_argument() {
        let cmd = parse(r#"sh -c """#);
        assert_eq!(cmd.args, vec!["-c", ""]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(CommandLine::parse("").is_none());
        assert!(CommandLine::parse("   \t ").is_none());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let cmd = CommandLine::new("sh", ["-c", "echo 'hi there'"]);
        assert_eq!(parse(&cmd.to_string()), cmd);
    }

    #[test]
    fn test_failure_reason_prefers_stderr() {
        let output = CommandOutput {
            exit_code: 1,
            stdout: "out".to_string(),
            stderr: " err \n".to_string(),
        };
        assert_eq!(output.failure_reason(), "err");
        assert!(!output.success());

        let output = CommandOutput {
            exit_code: 1,
            stdout: "only stdout".to_string(),
            stderr: String::new(),
        };
        assert_eq!(output.failure_reason(), "only stdout");
    }
}
