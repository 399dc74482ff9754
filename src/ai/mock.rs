use super::{AiBackend, BackendError};
use crate::context::RequestEnvelope;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Canned backend reply
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub error: Option<BackendError>,
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: None,
        }
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            content: String::new(),
            error: Some(error),
        }
    }
}

/// Backend that replays queued responses and records every envelope
pub struct MockBackend {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<RequestEnvelope>>,
    name: String,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_name("MockBackend")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            name: name.into(),
        }
    }

    pub fn add_response(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        let mut queue = self.responses.lock().unwrap();
        for response in responses {
            queue.push_back(response);
        }
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    /// Envelopes received so far, oldest first
    pub fn requests(&self) -> Vec<RequestEnvelope> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiBackend for MockBackend {
    async fn complete(&self, envelope: &RequestEnvelope) -> Result<String, BackendError> {
        self.requests.lock().unwrap().push(envelope.clone());

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::Io {
                message: "MockBackend: No more responses in queue".to_string(),
            })?;

        match response.error {
            Some(error) => Err(error),
            None => Ok(response.content),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::context::{ContextAssembler, ContextRequest, Intent};
    use crate::fs::MockFileSystem;
    use std::sync::Arc;

    fn envelope() -> RequestEnvelope {
        ContextAssembler::new(Arc::new(MockFileSystem::new()), "/mock", ProjectConfig::default())
            .assemble(&ContextRequest::new(Intent::Assist, "hello"))
    }

    #[tokio::test]
    async fn test_replays_in_order() {
        let backend = MockBackend::new();
        backend.add_responses([
            MockResponse::text("first"),
            MockResponse::error(BackendError::Timeout { seconds: 1 }),
        ]);

        assert_eq!(backend.complete(&envelope()).await.unwrap(), "first");
        assert_eq!(
            backend.complete(&envelope()).await.unwrap_err(),
            BackendError::Timeout { seconds: 1 }
        );
        assert!(backend.complete(&envelope()).await.is_err());

        assert_eq!(backend.remaining_responses(), 0);
        assert_eq!(backend.requests().len(), 3);
        assert_eq!(backend.requests()[0].user_prompt, "hello");
    }

    #[test]
    fn test_name() {
        assert_eq!(MockBackend::with_name("replay").name(), "replay");
    }
}
