pub mod anthropic;

use async_trait::async_trait;

use crate::error::CompletionError;

/// A stateless text completion endpoint.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[cfg(test)]
pub mod mock;
