use super::BackendError;
use crate::context::RequestEnvelope;
use async_trait::async_trait;

/// Transport-agnostic AI backend: envelope in, unified diff or edit
/// instructions out
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn complete(&self, envelope: &RequestEnvelope) -> Result<String, BackendError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
