//! Progress reporting for build, patch and fix-loop operations

mod handler;
mod logging;

pub use handler::{NoOpHandler, OutputStream, ProgressEvent, ProgressHandler};
pub use logging::{ConsoleHandler, LoggingHandler};
