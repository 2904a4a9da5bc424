use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pipeline::execute::ExecutionMode;

pub const MAX_RECENT_PROJECTS: usize = 5;
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_REFRESH_SECS: u64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    // Plain values precede the tables so the file serializes cleanly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_project: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_projects: Vec<String>,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub pat: String,
    /// People offered by the assignee filter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    /// Alternate service host, for on-premises servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnthropicConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub execution: ExecutionMode,
    /// Dashboard auto-refresh interval; 0 turns it off.
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionMode::default(),
            refresh_secs: default_refresh_secs(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_refresh_secs() -> u64 {
    DEFAULT_REFRESH_SECS
}

impl AppConfig {
    /// Environment variables win over the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(org) = non_empty("AZURE_DEVOPS_ORG") {
            self.azure.organization = org;
        }
        if let Some(pat) = non_empty("AZURE_DEVOPS_PAT") {
            self.azure.pat = pat;
        }
        if let Some(key) = non_empty("ANTHROPIC_API_KEY") {
            self.anthropic.api_key = key;
        }
    }

    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.azure.organization.trim().is_empty() {
            missing.push("azure.organization (AZURE_DEVOPS_ORG)");
        }
        if self.azure.pat.trim().is_empty() {
            missing.push("azure.pat (AZURE_DEVOPS_PAT)");
        }
        if self.anthropic.api_key.trim().is_empty() {
            missing.push("anthropic.api_key (ANTHROPIC_API_KEY)");
        }
        missing
    }

    pub fn ensure_credentials(&self) -> Result<()> {
        let missing = self.missing_credentials();
        if !missing.is_empty() {
            bail!(
                "Missing credentials: {}. Set them in {} or the environment.",
                missing.join(", "),
                config_path().display()
            );
        }
        Ok(())
    }

    /// Make `project` the last used one and move it to the front of the
    /// recent list.
    pub fn remember_project(&mut self, project: &str) {
        self.last_project = Some(project.to_string());
        self.recent_projects.retain(|known| known != project);
        self.recent_projects.insert(0, project.to_string());
        self.recent_projects.truncate(MAX_RECENT_PROJECTS);
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("DEVOPS_AGENT_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".devops-agent")
}

fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn data_dir() -> PathBuf {
    config_dir()
}

/// File config with environment overrides applied.
pub fn load_config() -> Result<AppConfig> {
    let mut config = load_from(&config_path())?;
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

pub fn load_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| "Failed to parse config.toml")?;
    Ok(config)
}

pub fn save_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write config to {}", path.display()))
}

/// Persist the project choice without writing environment secrets to disk.
pub fn remember_project(project: &str) -> Result<()> {
    remember_project_in(&config_path(), project)
}

fn remember_project_in(path: &Path, project: &str) -> Result<()> {
    let mut on_disk = load_from(path)?;
    on_disk.remember_project(project);
    save_to(path, &on_disk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config: AppConfig = toml::from_str(
            r#"
            last_project = "Web"
            recent_projects = ["Web", "Mobile"]

            [azure]
            organization = "acme"
            pat = "secret"
            users = ["Ana", "Bo"]

            [anthropic]
            api_key = "sk-test"

            [pipeline]
            execution = "sequential"
            "#,
        )
        .unwrap();
        assert_eq!(config.azure.users, vec!["Ana", "Bo"]);
        assert_eq!(config.anthropic.model, DEFAULT_MODEL);
        assert_eq!(config.anthropic.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.pipeline.execution, ExecutionMode::Sequential);
        assert_eq!(config.pipeline.refresh_secs, DEFAULT_REFRESH_SECS);
        assert!(config.missing_credentials().is_empty());
    }

    #[test]
    fn empty_config_reports_every_missing_credential() {
        let config = AppConfig::default();
        assert_eq!(config.missing_credentials().len(), 3);
        let err = config.ensure_credentials().unwrap_err().to_string();
        assert!(err.contains("AZURE_DEVOPS_PAT"));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = AppConfig::default();
        config.azure.organization = "file-org".into();
        config.apply_env(|key| match key {
            "AZURE_DEVOPS_ORG" => Some("env-org".into()),
            "AZURE_DEVOPS_PAT" => Some("  ".into()),
            "ANTHROPIC_API_KEY" => Some("sk-env".into()),
            _ => None,
        });
        assert_eq!(config.azure.organization, "env-org");
        assert_eq!(config.azure.pat, "");
        assert_eq!(config.anthropic.api_key, "sk-env");
    }

    #[test]
    fn recent_projects_are_deduped_and_capped() {
        let mut config = AppConfig::default();
        for project in ["A", "B", "C", "D", "E", "F", "C"] {
            config.remember_project(project);
        }
        assert_eq!(config.last_project.as_deref(), Some("C"));
        assert_eq!(config.recent_projects, vec!["C", "F", "E", "D", "B"]);
    }

    #[test]
    fn remember_project_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.azure.organization = "acme".into();
        save_to(&path, &config).unwrap();

        remember_project_in(&path, "Web").unwrap();
        let reloaded = load_from(&path).unwrap();
        assert_eq!(reloaded.azure.organization, "acme");
        assert_eq!(reloaded.last_project.as_deref(), Some("Web"));
        assert_eq!(reloaded.recent_projects, vec!["Web"]);
    }

    #[test]
    fn missing_file_is_default_config() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_from(&dir.path().join("none.toml")).unwrap(), AppConfig::default());
    }
}
