//! AI backend boundary
//!
//! The core never talks to a model itself. An [`AiBackend`] receives a
//! [`RequestEnvelope`](crate::context::RequestEnvelope) and returns patch
//! text; [`CommandBackend`] hands the envelope to an external program and
//! [`MockBackend`] replays canned responses in tests.

mod backend;
mod command;
mod error;
mod mock;

pub use backend::AiBackend;
pub use command::CommandBackend;
pub use error::BackendError;
pub use mock::{MockBackend, MockResponse};
