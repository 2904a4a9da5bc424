use std::sync::Mutex;

use async_trait::async_trait;

use super::CompletionService;
use crate::error::CompletionError;

/// Replays a canned response and records every prompt it was given.
pub struct MockCompletion {
    response: Result<String, u16>,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    pub fn replying(response: impl Into<String>) -> Self {
        Self {
            response: Ok(response.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request with the given HTTP status.
    pub fn failing(status: u16) -> Self {
        Self {
            response: Err(status),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(CompletionError::Status {
                status: *status,
                body: "overloaded".into(),
            }),
        }
    }
}
