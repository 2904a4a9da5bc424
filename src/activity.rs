use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

use crate::config::data_dir;
use crate::model::mutation::MutationResult;

/// One applied or failed mutation, as written to the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: String,
    pub project: String,
    pub instruction: String,
    #[serde(flatten)]
    pub result: MutationResult,
}

impl ActivityEntry {
    pub fn new(project: &str, instruction: &str, result: MutationResult) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            project: project.to_string(),
            instruction: instruction.to_string(),
            result,
        }
    }
}

/// Append-only JSONL log of mutations.
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_location() -> Self {
        Self::new(data_dir().join("activity.jsonl"))
    }

    pub fn append(&self, project: &str, instruction: &str, results: &[MutationResult]) -> Result<()> {
        if results.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        for result in results {
            let line = serde_json::to_string(&ActivityEntry::new(project, instruction, result.clone()))?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Most recent entries last. Unreadable lines are skipped.
    pub fn read(&self, limit: Option<usize>) -> Vec<ActivityEntry> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let mut entries: Vec<ActivityEntry> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        if let Some(limit) = limit {
            let len = entries.len();
            if len > limit {
                entries = entries.split_off(len - limit);
            }
        }
        entries
    }
}
