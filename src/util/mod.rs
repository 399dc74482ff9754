//! Utility modules for plugwright
//!
//! - Structured logging setup and configuration
//! - Key-value template interpolation for prompt templates

pub mod logging;
pub mod template;

pub use logging::{init_from_env, init_logging, LoggingConfig};
pub use template::interpolate;
