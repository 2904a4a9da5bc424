use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::compile::compile;
use super::resolve::{resolve_parent, resolve_target_id, ParentResolution};
use crate::model::mutation::{MutationBatch, MutationKind, MutationOutcome, MutationResult};
use crate::model::remote::{RemoteFields, RemoteItem};
use crate::model::work_item::{WorkItem, WorkItemType};
use crate::store::WorkItemStore;

/// How the items of a batch are sent to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// All items at once; results still come back in payload order.
    #[default]
    Parallel,
    /// One item after another, for stores that rate-limit writes.
    Sequential,
}

pub struct MutationExecutor<'a> {
    store: &'a dyn WorkItemStore,
    mode: ExecutionMode,
}

impl<'a> MutationExecutor<'a> {
    pub fn new(store: &'a dyn WorkItemStore, mode: ExecutionMode) -> Self {
        Self { store, mode }
    }

    /// Apply every item of the batch, one result per item in payload order.
    ///
    /// A failing item never stops the others.
    pub async fn execute(
        &self,
        batch: &MutationBatch,
        project: &str,
        snapshot: &[WorkItem],
    ) -> Vec<MutationResult> {
        let Some(kind) = batch.action().kind() else {
            return Vec::new();
        };
        match self.mode {
            ExecutionMode::Parallel => {
                join_all(
                    batch
                        .items()
                        .iter()
                        .map(|item| self.apply(kind, item, project, snapshot)),
                )
                .await
            }
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(batch.len());
                for item in batch.items() {
                    results.push(self.apply(kind, item, project, snapshot).await);
                }
                results
            }
        }
    }

    async fn apply(
        &self,
        kind: MutationKind,
        item: &WorkItem,
        project: &str,
        snapshot: &[WorkItem],
    ) -> MutationResult {
        let result = match kind {
            MutationKind::Create => self.create(item, project, snapshot).await,
            MutationKind::Update => self.update(item, project, snapshot).await,
            MutationKind::Delete => self.delete(item, project, snapshot).await,
        };
        match &result.outcome {
            MutationOutcome::Applied => {
                info!(%kind, id = ?result.id, title = %result.title, "work item mutation applied");
            }
            MutationOutcome::Failed { error } => {
                warn!(%kind, title = %result.title, error = %error, "work item mutation failed");
            }
        }
        for warning in &result.warnings {
            warn!(%kind, title = %result.title, "{warning}");
        }
        result
    }

    async fn create(&self, item: &WorkItem, project: &str, snapshot: &[WorkItem]) -> MutationResult {
        if item.id != 0 && snapshot.iter().any(|known| known.id == item.id) {
            let mut result = self.update(item, project, snapshot).await;
            result
                .warnings
                .insert(0, format!("#{} already exists, updated instead of created", item.id));
            return result;
        }
        let title = item.title.trim();
        if title.is_empty() {
            return MutationResult::failed(
                MutationKind::Create,
                "(untitled)",
                None,
                "missing required field: title",
            );
        }

        let mut warnings = Vec::new();
        let parent = checked_parent(item, None, snapshot, &mut warnings);
        // The type travels in the request path, not the patch.
        let item_type = item.item_type.clone().unwrap_or(WorkItemType::Task);
        let mut fields = item.clone();
        fields.item_type = None;

        let url = |id: u32| self.store.item_url(id);
        let ops = compile(&fields, &parent, &RemoteFields::default(), &[], &url);
        match self.store.create_item(project, &item_type, &ops).await {
            Ok(id) => MutationResult::applied(MutationKind::Create, title, id).with_warnings(warnings),
            Err(err) => MutationResult::failed(MutationKind::Create, title, None, err.to_string())
                .with_warnings(warnings),
        }
    }

    async fn update(&self, item: &WorkItem, project: &str, snapshot: &[WorkItem]) -> MutationResult {
        let Some(id) = resolve_target_id(item, snapshot) else {
            return MutationResult::failed(
                MutationKind::Update,
                display_title(item, None, snapshot),
                None,
                "no id given and no item has that title",
            );
        };
        let title = display_title(item, Some(id), snapshot);

        let existing = match self.store.fetch_item(project, id).await {
            Ok(existing) => existing,
            Err(err) => {
                warn!(id, error = %err, "could not load current state, patching as if empty");
                RemoteItem::default()
            }
        };

        let mut warnings = Vec::new();
        let parent = checked_parent(item, Some(id), snapshot, &mut warnings);
        let url = |id: u32| self.store.item_url(id);
        let ops = compile(item, &parent, &existing.fields, &existing.relations, &url);
        if ops.is_empty() {
            warnings.push("nothing to change".to_string());
            return MutationResult::applied(MutationKind::Update, title, id).with_warnings(warnings);
        }

        match self.store.update_item(project, id, &ops).await {
            Ok(id) => MutationResult::applied(MutationKind::Update, title, id).with_warnings(warnings),
            Err(err) => MutationResult::failed(MutationKind::Update, title, Some(id), err.to_string())
                .with_warnings(warnings),
        }
    }

    async fn delete(&self, item: &WorkItem, project: &str, snapshot: &[WorkItem]) -> MutationResult {
        let Some(id) = resolve_target_id(item, snapshot) else {
            return MutationResult::failed(
                MutationKind::Delete,
                display_title(item, None, snapshot),
                None,
                "no id given and no item has that title",
            );
        };
        let title = display_title(item, Some(id), snapshot);
        match self.store.delete_item(project, id).await {
            Ok(()) => MutationResult::applied(MutationKind::Delete, title, id),
            Err(err) => MutationResult::failed(MutationKind::Delete, title, Some(id), err.to_string()),
        }
    }
}

/// Resolve the parent, turning misses and self-references into warnings.
fn checked_parent(
    item: &WorkItem,
    own_id: Option<u32>,
    snapshot: &[WorkItem],
    warnings: &mut Vec<String>,
) -> ParentResolution {
    match resolve_parent(item, snapshot) {
        ParentResolution::Set(parent) if Some(parent) == own_id => {
            warnings.push(format!("#{parent} cannot be its own parent, parent left unchanged"));
            ParentResolution::Unchanged
        }
        ParentResolution::Missing(title) => {
            warnings.push(format!("parent \"{title}\" not found, parent cleared"));
            ParentResolution::Missing(title)
        }
        resolved => resolved,
    }
}

fn display_title(item: &WorkItem, id: Option<u32>, snapshot: &[WorkItem]) -> String {
    let title = item.title.trim();
    if !title.is_empty() {
        return title.to_string();
    }
    id.and_then(|id| snapshot.iter().find(|known| known.id == id))
        .map(|known| known.title.clone())
        .or_else(|| id.map(|id| format!("#{id}")))
        .unwrap_or_else(|| "(untitled)".to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::mutation::MutationAction;
    use crate::model::patch::{PatchOp, PatchOperation};
    use crate::model::remote::{Relation, HIERARCHY_PARENT};
    use crate::model::work_item::ParentRef;
    use crate::store::mock::{MockStore, StoreCall};

    fn snapshot() -> Vec<WorkItem> {
        vec![
            WorkItem::new("Checkout").with_id(5),
            WorkItem::new("Payments").with_id(6),
            WorkItem::new("Pay button").with_id(7),
        ]
    }

    fn parent_link(id: u32) -> Relation {
        Relation {
            rel: HIERARCHY_PARENT.into(),
            url: format!("https://mock.test/_apis/wit/workItems/{id}"),
            attributes: None,
        }
    }

    fn store() -> MockStore {
        MockStore::new()
            .with_item(5, json!({ "System.Title": "Checkout", "System.State": "Active" }))
            .with_item(6, json!({ "System.Title": "Payments" }))
            .with_item_relations(7, json!({ "System.Title": "Pay button" }), vec![parent_link(5)])
    }

    async fn run(store: &MockStore, batch: MutationBatch, mode: ExecutionMode) -> Vec<MutationResult> {
        MutationExecutor::new(store, mode)
            .execute(&batch, "Web", &snapshot())
            .await
    }

    #[tokio::test]
    async fn none_batch_does_nothing() {
        let store = store();
        assert!(run(&store, MutationBatch::none(), ExecutionMode::Parallel).await.is_empty());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn create_resolves_parent_and_sends_type_in_path() {
        let store = store();
        let item = WorkItem::new("Card form")
            .with_state("New")
            .with_type(WorkItemType::Feature)
            .with_parent(ParentRef::Title("Checkout".into()));
        let results = run(&store, MutationBatch::new(MutationAction::Create, vec![item]), ExecutionMode::Parallel).await;

        assert_eq!(results, vec![MutationResult::applied(MutationKind::Create, "Card form", 1000)]);
        let StoreCall::Create { item_type, ops } = &store.calls()[0] else {
            panic!("expected a create call");
        };
        assert_eq!(item_type, "Feature");
        assert!(ops.iter().all(|op| op.path != "/fields/System.WorkItemType"));
        assert_eq!(
            ops.last().and_then(|op| op.value.clone()),
            Some(json!({ "rel": HIERARCHY_PARENT, "url": "https://mock.test/_apis/wit/workItems/5" }))
        );
        assert_eq!(store.item(1000).unwrap().to_work_item().parent, ParentRef::Id(5));
    }

    #[tokio::test]
    async fn create_without_title_fails_alone() {
        let store = store();
        let batch = MutationBatch::new(
            MutationAction::BatchCreate,
            vec![WorkItem::new("  "), WorkItem::new("Card form")],
        );
        let results = run(&store, batch, ExecutionMode::Sequential).await;
        assert!(!results[0].is_success());
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn reparent_replaces_existing_link() {
        let store = store();
        let item = WorkItem::new("").with_id(7).with_parent(ParentRef::Title("Payments".into()));
        let results = run(&store, MutationBatch::new(MutationAction::Update, vec![item]), ExecutionMode::Parallel).await;

        assert_eq!(results[0].title, "Pay button");
        assert!(results[0].is_success());
        assert_eq!(
            store.calls()[1],
            StoreCall::Update {
                id: 7,
                ops: vec![
                    PatchOperation::remove_relation(0),
                    PatchOperation::add_relation(json!({
                        "rel": HIERARCHY_PARENT,
                        "url": "https://mock.test/_apis/wit/workItems/6",
                    })),
                ],
            }
        );
        assert_eq!(store.item(7).unwrap().to_work_item().parent, ParentRef::Id(6));
    }

    #[tokio::test]
    async fn missing_parent_clears_with_warning() {
        let store = store();
        let item = WorkItem::new("").with_id(7).with_parent(ParentRef::Title("Nowhere".into()));
        let results = run(&store, MutationBatch::new(MutationAction::Update, vec![item]), ExecutionMode::Parallel).await;
        assert!(results[0].is_success());
        assert_eq!(results[0].warnings, vec!["parent \"Nowhere\" not found, parent cleared"]);
        assert!(store.item(7).unwrap().relations.is_empty());
    }

    #[tokio::test]
    async fn self_parent_is_ignored() {
        let store = store();
        let item = WorkItem::new("").with_id(7).with_state("Done").with_parent(ParentRef::Id(7));
        let results = run(&store, MutationBatch::new(MutationAction::Update, vec![item]), ExecutionMode::Parallel).await;
        assert_eq!(results[0].warnings.len(), 1);
        assert_eq!(store.item(7).unwrap().relations, vec![parent_link(5)]);
    }

    #[tokio::test]
    async fn update_uses_replace_for_populated_fields() {
        let store = store();
        let item = WorkItem::new("").with_id(5).with_state("Closed").with_assignee("Ana");
        run(&store, MutationBatch::new(MutationAction::Update, vec![item]), ExecutionMode::Parallel).await;
        let StoreCall::Update { ops, .. } = &store.calls()[1] else {
            panic!("expected an update call");
        };
        let kinds: Vec<(PatchOp, &str)> = ops.iter().map(|op| (op.op, op.path.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (PatchOp::Replace, "/fields/System.State"),
                (PatchOp::Add, "/fields/System.AssignedTo"),
            ]
        );
    }

    #[tokio::test]
    async fn failed_prefetch_falls_back_to_add() {
        let store = store().fail_fetch(5);
        let item = WorkItem::new("").with_id(5).with_state("Closed");
        let results = run(&store, MutationBatch::new(MutationAction::Update, vec![item]), ExecutionMode::Parallel).await;
        assert!(results[0].is_success());
        let StoreCall::Update { ops, .. } = &store.calls()[1] else {
            panic!("expected an update call");
        };
        assert_eq!(ops[0].op, PatchOp::Add);
    }

    #[tokio::test]
    async fn update_by_title_when_id_missing() {
        let store = store();
        let item = WorkItem::new("Payments").with_state("Active");
        let results = run(&store, MutationBatch::new(MutationAction::Update, vec![item]), ExecutionMode::Parallel).await;
        assert_eq!(results[0].id, Some(6));

        let unknown = WorkItem::new("Nope").with_state("Active");
        let results = run(&store, MutationBatch::new(MutationAction::Update, vec![unknown]), ExecutionMode::Parallel).await;
        assert!(!results[0].is_success());
    }

    #[tokio::test]
    async fn failures_are_isolated_and_ordered() {
        let batch = MutationBatch::new(
            MutationAction::BatchDelete,
            vec![
                WorkItem::new("Checkout").with_id(5),
                WorkItem::new("Payments").with_id(6),
                WorkItem::new("Pay button").with_id(7),
            ],
        );
        for mode in [ExecutionMode::Parallel, ExecutionMode::Sequential] {
            let store = store().fail_write(6);
            let results = run(&store, batch.clone(), mode).await;
            let outcome: Vec<(Option<u32>, bool)> =
                results.iter().map(|r| (r.id, r.is_success())).collect();
            assert_eq!(outcome, vec![(Some(5), true), (Some(6), false), (Some(7), true)]);
            assert!(store.item(5).is_none());
            assert!(store.item(6).is_some());
        }
    }

    #[tokio::test]
    async fn batch_update_isolates_fetch_and_write_failures() {
        let batch = MutationBatch::new(
            MutationAction::BatchUpdate,
            vec![
                WorkItem::new("").with_id(5).with_state("Closed"),
                WorkItem::new("").with_id(6).with_state("Closed"),
                WorkItem::new("").with_id(7).with_state("Closed"),
            ],
        );
        for mode in [ExecutionMode::Parallel, ExecutionMode::Sequential] {
            let store = store().fail_fetch(6).fail_write(6);
            let results = run(&store, batch.clone(), mode).await;
            let outcome: Vec<(Option<u32>, bool)> =
                results.iter().map(|r| (r.id, r.is_success())).collect();
            assert_eq!(outcome, vec![(Some(5), true), (Some(6), false), (Some(7), true)]);
            assert_eq!(store.item(5).unwrap().fields.state(), Some("Closed"));
            assert_eq!(store.item(7).unwrap().fields.state(), Some("Closed"));
            assert_eq!(store.item(6).unwrap().fields.state(), None);
        }
    }

    #[tokio::test]
    async fn create_naming_an_existing_item_updates_it() {
        let store = store();
        let batch = MutationBatch::new(
            MutationAction::BatchCreate,
            vec![
                WorkItem::new("Pay button")
                    .with_id(7)
                    .with_parent(ParentRef::Title("Payments".into())),
                WorkItem::new("Card form")
                    .with_state("New")
                    .with_parent(ParentRef::Title("Payments".into())),
            ],
        );
        let results = run(&store, batch, ExecutionMode::Sequential).await;

        assert_eq!(results[0].kind, MutationKind::Update);
        assert_eq!(results[0].id, Some(7));
        assert_eq!(results[0].warnings, vec!["#7 already exists, updated instead of created"]);
        assert_eq!(results[1].kind, MutationKind::Create);
        assert_eq!(results[1].id, Some(1000));

        assert_eq!(store.item(7).unwrap().to_work_item().parent, ParentRef::Id(6));
        assert_eq!(store.item(1000).unwrap().to_work_item().parent, ParentRef::Id(6));
        assert!(store.item(1001).is_none());
    }

    #[tokio::test]
    async fn no_op_update_skips_the_write() {
        let store = store();
        let item = WorkItem::new("").with_id(7).with_parent(ParentRef::Title("Checkout".into()));
        let results = run(&store, MutationBatch::new(MutationAction::Update, vec![item]), ExecutionMode::Parallel).await;
        assert!(results[0].is_success());
        assert_eq!(store.calls(), vec![StoreCall::FetchItem(7)]);
    }
}
