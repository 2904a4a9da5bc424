use std::fmt;

use serde::{Deserialize, Serialize};

use super::work_item::WorkItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationAction {
    Create,
    Update,
    Delete,
    BatchCreate,
    BatchUpdate,
    BatchDelete,
    None,
}

/// What happens to a single item, independent of batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationAction {
    /// Accepts `batch-create`, `batch_create`, `batchCreate`, `Batch Create`, ...
    pub fn parse(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "create" => Some(MutationAction::Create),
            "update" => Some(MutationAction::Update),
            "delete" => Some(MutationAction::Delete),
            "batchcreate" => Some(MutationAction::BatchCreate),
            "batchupdate" => Some(MutationAction::BatchUpdate),
            "batchdelete" => Some(MutationAction::BatchDelete),
            "none" | "" => Some(MutationAction::None),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MutationAction::Create => "create",
            MutationAction::Update => "update",
            MutationAction::Delete => "delete",
            MutationAction::BatchCreate => "batch-create",
            MutationAction::BatchUpdate => "batch-update",
            MutationAction::BatchDelete => "batch-delete",
            MutationAction::None => "none",
        }
    }

    pub fn kind(self) -> Option<MutationKind> {
        match self {
            MutationAction::Create | MutationAction::BatchCreate => Some(MutationKind::Create),
            MutationAction::Update | MutationAction::BatchUpdate => Some(MutationKind::Update),
            MutationAction::Delete | MutationAction::BatchDelete => Some(MutationKind::Delete),
            MutationAction::None => None,
        }
    }

    pub fn is_batch(self) -> bool {
        matches!(
            self,
            MutationAction::BatchCreate | MutationAction::BatchUpdate | MutationAction::BatchDelete
        )
    }

    pub fn batched(self) -> Self {
        match self {
            MutationAction::Create => MutationAction::BatchCreate,
            MutationAction::Update => MutationAction::BatchUpdate,
            MutationAction::Delete => MutationAction::BatchDelete,
            other => other,
        }
    }

    /// Same batching shape, different kind (e.g. `batch-create` -> `batch-update`).
    pub fn with_kind(self, kind: MutationKind) -> Self {
        let single = match kind {
            MutationKind::Create => MutationAction::Create,
            MutationKind::Update => MutationAction::Update,
            MutationKind::Delete => MutationAction::Delete,
        };
        if self.is_batch() {
            single.batched()
        } else {
            single
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        })
    }
}

/// Validated output of intent extraction.
///
/// Fields are private so every batch goes through [`MutationBatch::new`],
/// which keeps the action/payload-count invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationBatch {
    action: MutationAction,
    work_items: Vec<WorkItem>,
}

impl MutationBatch {
    pub fn none() -> Self {
        Self {
            action: MutationAction::None,
            work_items: Vec::new(),
        }
    }

    /// `none` drops its payload, a singular action with no payload becomes
    /// `none`, and a singular action with several payloads is promoted to its
    /// batch form.
    pub fn new(action: MutationAction, work_items: Vec<WorkItem>) -> Self {
        match action {
            MutationAction::None => Self::none(),
            _ if action.is_batch() => Self { action, work_items },
            _ => match work_items.len() {
                0 => Self::none(),
                1 => Self { action, work_items },
                _ => Self {
                    action: action.batched(),
                    work_items,
                },
            },
        }
    }

    pub fn action(&self) -> MutationAction {
        self.action
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.work_items
    }

    pub fn into_items(self) -> Vec<WorkItem> {
        self.work_items
    }

    pub fn is_none(&self) -> bool {
        self.action == MutationAction::None
    }

    pub fn len(&self) -> usize {
        self.work_items.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MutationOutcome {
    Applied,
    Failed { error: String },
}

/// Per-item result of executing a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResult {
    pub kind: MutationKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(flatten)]
    pub outcome: MutationOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl MutationResult {
    pub fn applied(kind: MutationKind, title: impl Into<String>, id: u32) -> Self {
        Self {
            kind,
            title: title.into(),
            id: Some(id),
            outcome: MutationOutcome::Applied,
            warnings: Vec::new(),
        }
    }

    pub fn failed(
        kind: MutationKind,
        title: impl Into<String>,
        id: Option<u32>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            id,
            outcome: MutationOutcome::Failed {
                error: error.into(),
            },
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, MutationOutcome::Applied)
    }

    pub fn summary(&self) -> String {
        let id = self.id.map(|id| format!("#{id} ")).unwrap_or_default();
        match &self.outcome {
            MutationOutcome::Applied => format!("{} {id}{}: ok", self.kind, self.title),
            MutationOutcome::Failed { error } => {
                format!("{} {id}{}: failed ({error})", self.kind, self.title)
            }
        }
    }
}
