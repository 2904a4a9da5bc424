use std::sync::Arc;

use anyhow::Result;

use crate::completion::anthropic::AnthropicClient;
use crate::completion::CompletionService;
use crate::config::AppConfig;
use crate::pipeline::execute::ExecutionMode;
use crate::store::azure::AzureDevOpsStore;
use crate::store::WorkItemStore;

/// The clients one run of the tool works with, built once from config and
/// passed to whatever needs them.
#[derive(Clone)]
pub struct Session {
    pub store: Arc<dyn WorkItemStore>,
    pub completion: Arc<dyn CompletionService>,
    pub execution: ExecutionMode,
}

impl Session {
    pub fn new(
        store: Arc<dyn WorkItemStore>,
        completion: Arc<dyn CompletionService>,
        execution: ExecutionMode,
    ) -> Self {
        Self {
            store,
            completion,
            execution,
        }
    }

    /// Fails when any credential is missing.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.ensure_credentials()?;
        let azure = &config.azure;
        let store = match &azure.host {
            Some(host) => AzureDevOpsStore::with_host(host, &azure.organization, &azure.pat),
            None => AzureDevOpsStore::new(&azure.organization, &azure.pat),
        };
        let completion = AnthropicClient::new(
            config.anthropic.api_key.clone(),
            config.anthropic.model.clone(),
            config.anthropic.max_tokens,
        );
        Ok(Self::new(
            Arc::new(store),
            Arc::new(completion),
            config.pipeline.execution,
        ))
    }
}
