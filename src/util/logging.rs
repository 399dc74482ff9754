//! Structured logging setup for plugwright
//!
//! All log output goes to stderr so stdout stays clean for command results.
//! The level is chosen, in order, from an explicit `--log-level`, the `-v` /
//! `-q` flags, `PLUGWRIGHT_LOG_LEVEL`, and finally `info`. `RUST_LOG`, when
//! set, replaces the computed filter entirely.
//!
//! # Example
//!
//! ```no_run
//! use plugwright::util::logging;
//! use tracing::{info, warn};
//!
//! logging::init_from_env();
//!
//! info!(preset = "macos", "Configure started");
//! warn!(line = 12, "Skipping malformed cache entry");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

const LEVEL_VAR: &str = "PLUGWRIGHT_LOG_LEVEL";
const JSON_VAR: &str = "PLUGWRIGHT_LOG_JSON";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: Level,
    /// One JSON object per line, for editor integrations parsing stderr
    pub use_json: bool,
    pub include_target: bool,
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Level and format from `PLUGWRIGHT_LOG_LEVEL` / `PLUGWRIGHT_LOG_JSON`
    pub fn from_env() -> Self {
        let level = env::var(LEVEL_VAR)
            .map(|v| parse_level(&v))
            .unwrap_or(Level::INFO);

        Self {
            level,
            use_json: json_from_env(),
            ..Self::default()
        }
    }

    /// Applies command-line overrides on top of [`LoggingConfig::from_env`]
    pub fn from_args(log_level: Option<&str>, verbose: bool, quiet: bool) -> Self {
        let mut config = Self::from_env();
        if let Some(level) = log_level {
            config.level = parse_level(level);
        } else if verbose {
            config.level = Level::DEBUG;
            config.include_location = true;
        } else if quiet {
            config.level = Level::ERROR;
        }
        config
    }
}

fn json_from_env() -> bool {
    env::var(JSON_VAR)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Parses a log level from a string, falling back to `INFO`
///
/// ```
/// use plugwright::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("WARN"), Level::WARN);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn build_filter(level: Level) -> EnvFilter {
    if env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    match format!("plugwright={}", level).parse() {
        Ok(directive) => EnvFilter::default().add_directive(directive),
        Err(_) => EnvFilter::new(level.to_string()),
    }
}

/// Installs the global subscriber. Only the first call has an effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let json = config.use_json.then(|| {
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(config.include_target)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
        });
        let text = (!config.use_json).then(|| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(config.include_target)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
        });

        tracing_subscriber::registry()
            .with(build_filter(config.level))
            .with(json)
            .with(text)
            .init();
    });
}

pub fn init_from_env() {
    init_logging(LoggingConfig::from_env());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard(Vec<&'static str>);

    impl EnvGuard {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            for (key, value) in vars {
                env::set_var(key, value);
            }
            Self(vars.iter().map(|(k, _)| *k).collect())
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in &self.0 {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level(" Debug "), Level::DEBUG);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("ERROR"), Level::ERROR);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::set(&[(LEVEL_VAR, "warn"), (JSON_VAR, "true")]);
        let config = LoggingConfig::from_env();
        assert_eq!(config.level, Level::WARN);
        assert!(config.use_json);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        env::remove_var(LEVEL_VAR);
        env::remove_var(JSON_VAR);
        assert_eq!(LoggingConfig::from_env(), LoggingConfig::default());
    }

    #[test]
    #[serial]
    fn test_args_override_env() {
        let _guard = EnvGuard::set(&[(LEVEL_VAR, "warn")]);

        assert_eq!(LoggingConfig::from_args(Some("trace"), true, false).level, Level::TRACE);

        let verbose = LoggingConfig::from_args(None, true, false);
        assert_eq!(verbose.level, Level::DEBUG);
        assert!(verbose.include_location);

        assert_eq!(LoggingConfig::from_args(None, false, true).level, Level::ERROR);
        assert_eq!(LoggingConfig::from_args(None, false, false).level, Level::WARN);
    }
}
