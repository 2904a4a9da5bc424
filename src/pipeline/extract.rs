use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::dedupe;
use super::repair::repair_json;
use crate::completion::CompletionService;
use crate::error::CompletionError;
use crate::model::mutation::{MutationAction, MutationBatch, MutationKind};
use crate::model::work_item::{ParentRef, WorkItem, WorkItemType};

const DEFAULT_STATE: &str = "New";

/// Compact view of an item handed to the model.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptItem<'a> {
    id: u32,
    title: &'a str,
    state: &'a str,
    #[serde(rename = "type")]
    item_type: &'a str,
    assigned_to: &'a str,
    parent: &'a ParentRef,
}

fn items_block(items: &[WorkItem]) -> String {
    if items.is_empty() {
        return "(no work items yet)".to_string();
    }
    items
        .iter()
        .filter_map(|item| {
            serde_json::to_string(&PromptItem {
                id: item.id,
                title: &item.title,
                state: item.state.as_deref().unwrap_or_default(),
                item_type: item.type_label(),
                assigned_to: item.assignee_label(),
                parent: &item.parent,
            })
            .ok()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(instruction: &str, project: &str, items: &[WorkItem]) -> String {
    format!(
        r#"You manage Azure DevOps work items for the project "{project}".

## Current work items
One JSON object per line. "parent" is the parent's title, its id, or null.
{items}

## Request
{instruction}

## Response format
Reply with exactly one JSON object and nothing else:
{{"action": "create" | "update" | "delete" | "batch-create" | "batch-update" | "batch-delete" | "none",
  "workItems": [{{"id": number, "title": string, "state": string, "type": "Task" | "Epic" | "Feature" | "User Story" | "Bug", "assignedTo": string, "parent": string | number | null}}]}}

## Rules
1. Changing the parent of an existing item is an update of that item, using its id. Never create a new item for it.
2. New items default to state "New" and type "Task" unless the request says otherwise.
3. "parent" may be a title or an id from the list above. Use null only to remove a parent. Leave it out to keep the current parent.
4. Updates carry the id plus only the fields that change. Deletes need only id and title.
5. When asked to create every item of a category (for example "all form controls"), list each concrete item as its own entry, all under the requested parent.
6. When asked to remove duplicates, only treat items as duplicates if their titles mean the same thing. Keep the one with the lowest id and put the others in a "batch-delete". If unsure, leave the item alone. With no duplicates, return "batch-delete" with an empty list.
7. Use "assignedTo": "Unassigned" to remove an assignee.
8. If the request does not ask to change work items, return {{"action": "none", "workItems": []}}."#,
        project = project,
        items = items_block(items),
        instruction = instruction.trim(),
    )
}

/// Completion output shape, tolerant of the key spellings models produce.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBatch {
    #[serde(default)]
    action: String,
    #[serde(default, alias = "items", alias = "work_items")]
    work_items: Option<Vec<WorkItem>>,
    #[serde(default, alias = "item", alias = "work_item")]
    work_item: Option<WorkItem>,
}

impl RawBatch {
    fn into_items(self) -> Vec<WorkItem> {
        match (self.work_items, self.work_item) {
            (Some(items), _) if !items.is_empty() => items,
            (_, Some(item)) => vec![item],
            (items, None) => items.unwrap_or_default(),
        }
    }
}

/// Turns a natural-language instruction into a validated [`MutationBatch`].
pub struct IntentExtractor<'a> {
    completion: &'a dyn CompletionService,
}

impl<'a> IntentExtractor<'a> {
    pub fn new(completion: &'a dyn CompletionService) -> Self {
        Self { completion }
    }

    /// Transport failures are returned as errors. Output that cannot be
    /// understood becomes a `none` batch.
    pub async fn extract_intent(
        &self,
        instruction: &str,
        project: &str,
        current_items: &[WorkItem],
    ) -> Result<MutationBatch, CompletionError> {
        let prompt = build_prompt(instruction, project, current_items);
        debug!(project, items = current_items.len(), prompt_len = prompt.len(), "requesting intent");
        let raw = self.completion.complete(&prompt).await?;
        let batch = parse_batch(&raw, instruction, current_items);
        info!(action = %batch.action(), items = batch.len(), "extracted intent");
        Ok(batch)
    }
}

pub fn parse_batch(raw: &str, instruction: &str, snapshot: &[WorkItem]) -> MutationBatch {
    let Some(json) = repair_json(raw) else {
        warn!(response_len = raw.len(), "completion contained no JSON object");
        return MutationBatch::none();
    };
    let parsed: RawBatch = match serde_json::from_str(&json) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "completion JSON did not match the batch shape");
            return MutationBatch::none();
        }
    };
    let Some(action) = MutationAction::parse(&parsed.action) else {
        warn!(action = %parsed.action, "completion named an unknown action");
        return MutationBatch::none();
    };
    normalize(MutationBatch::new(action, parsed.into_items()), instruction, snapshot)
}

fn normalize(batch: MutationBatch, instruction: &str, snapshot: &[WorkItem]) -> MutationBatch {
    let action = batch.action();
    let mut items = batch.into_items();
    for item in &mut items {
        item.is_new = false;
    }

    match action.kind() {
        Some(MutationKind::Create) => {
            let existing: HashSet<u32> = snapshot.iter().map(|item| item.id).collect();
            if !items.is_empty() && items.iter().all(|item| existing.contains(&item.id)) {
                info!(items = items.len(), "create names existing items, treating it as an update");
                return MutationBatch::new(action.with_kind(MutationKind::Update), items);
            }
            // Payloads naming an existing item keep their id and are updated
            // in place by the executor; only the rest get create defaults.
            let known = items.iter().filter(|item| existing.contains(&item.id)).count();
            if known > 0 {
                info!(known, items = items.len(), "create names some existing items, updating those");
            }
            for item in items.iter_mut().filter(|item| !existing.contains(&item.id)) {
                apply_create_defaults(item);
            }
            share_parent(&mut items);
        }
        Some(MutationKind::Delete)
            if action == MutationAction::BatchDelete && dedupe::mentions_duplicates(instruction) =>
        {
            items = dedupe::retain_true_duplicates(items, snapshot);
        }
        _ => {}
    }
    MutationBatch::new(action, items)
}

fn apply_create_defaults(item: &mut WorkItem) {
    item.id = 0;
    if item.state.as_deref().map_or(true, |state| state.trim().is_empty()) {
        item.state = Some(DEFAULT_STATE.to_string());
    }
    if item.item_type.is_none() {
        item.item_type = Some(WorkItemType::Task);
    }
}

/// A batch create that names exactly one parent puts every new item under it.
fn share_parent(items: &mut [WorkItem]) {
    let mut named = items.iter().map(|item| &item.parent).filter(|p| !p.is_unspecified());
    let Some(first) = named.next().cloned() else {
        return;
    };
    if named.any(|other| *other != first) {
        return;
    }
    for item in items
        .iter_mut()
        .filter(|item| item.id == 0 && item.parent.is_unspecified())
    {
        item.parent = first.clone();
    }
}
