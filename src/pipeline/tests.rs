use std::sync::Arc;

use serde_json::json;

use super::dedupe::duplicate_batch;
use super::{run_batch, run_instruction};
use crate::completion::mock::MockCompletion;
use crate::error::{CompletionError, PipelineError};
use crate::model::mutation::MutationAction;
use crate::model::remote::{Relation, HIERARCHY_PARENT};
use crate::model::work_item::{ParentRef, WorkItemType};
use crate::pipeline::execute::ExecutionMode;
use crate::session::Session;
use crate::store::mock::{MockStore, StoreCall};
use crate::store::{fetch_snapshot, ItemQuery};

fn board() -> MockStore {
    MockStore::new()
        .with_item(
            5,
            json!({ "System.Title": "Checkout", "System.WorkItemType": "Epic", "System.State": "Active" }),
        )
        .with_item(6, json!({ "System.Title": "Add dark mode", "System.WorkItemType": "Task" }))
        .with_item_relations(
            7,
            json!({ "System.Title": "Implement dark mode", "System.WorkItemType": "Task", "System.Parent": 5 }),
            vec![Relation {
                rel: HIERARCHY_PARENT.into(),
                url: "https://mock.test/_apis/wit/workItems/5".into(),
                attributes: None,
            }],
        )
}

fn session(store: &Arc<MockStore>, reply: &str) -> Session {
    Session::new(
        store.clone(),
        Arc::new(MockCompletion::replying(reply)),
        ExecutionMode::Parallel,
    )
}

fn writes(store: &MockStore) -> usize {
    store
        .calls()
        .iter()
        .filter(|call| {
            matches!(
                call,
                StoreCall::Create { .. } | StoreCall::Update { .. } | StoreCall::Delete(_)
            )
        })
        .count()
}

#[tokio::test]
async fn create_under_existing_parent_shows_up_in_refresh() {
    let store = Arc::new(board());
    let session = session(
        &store,
        r#"{"action":"create","workItems":[{"title":"Card form","parent":"Checkout"}]}"#,
    );

    let outcome = run_instruction(&session, "Web", "add a card form under checkout", &ItemQuery::default())
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results[0].is_success());
    let snapshot = outcome.snapshot.unwrap();
    let created = snapshot.iter().find(|item| item.title == "Card form").unwrap();
    assert_eq!(created.id, 1000);
    assert_eq!(created.state.as_deref(), Some("New"));
    assert_eq!(created.item_type, Some(WorkItemType::Task));
    assert_eq!(created.parent, ParentRef::Title("Checkout".into()));
}

#[tokio::test]
async fn none_intent_writes_nothing() {
    let store = Arc::new(board());
    let session = session(&store, "Sorry, I only manage work items.");

    let outcome = run_instruction(&session, "Web", "what's the weather?", &ItemQuery::default())
        .await
        .unwrap();

    assert!(outcome.batch.is_none());
    assert!(outcome.results.is_empty());
    assert!(outcome.snapshot.is_none());
    assert_eq!(writes(&store), 0);
}

#[tokio::test]
async fn completion_failure_is_reported_without_writes() {
    let store = Arc::new(board());
    let session = Session::new(
        store.clone(),
        Arc::new(MockCompletion::failing(500)),
        ExecutionMode::Parallel,
    );

    let err = run_instruction(&session, "Web", "close checkout", &ItemQuery::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Completion(CompletionError::Status { status: 500, .. })));
    assert_eq!(writes(&store), 0);
}

#[tokio::test]
async fn model_sees_whole_project_while_view_stays_filtered() {
    let store = Arc::new(board());
    let session = session(
        &store,
        r#"{"action":"update","workItems":[{"id":6,"parent":"Checkout"}]}"#,
    );
    let epics = ItemQuery {
        item_type: Some(WorkItemType::Epic),
        assigned_to: None,
    };

    let outcome = run_instruction(&session, "Web", "put dark mode under checkout", &epics)
        .await
        .unwrap();

    assert!(outcome.results[0].is_success());
    let snapshot = outcome.snapshot.unwrap();
    assert!(snapshot.iter().all(|item| item.item_type == Some(WorkItemType::Epic)));

    let all = fetch_snapshot(store.as_ref(), "Web", &ItemQuery::default()).await.unwrap();
    let moved = all.iter().find(|item| item.id == 6).unwrap();
    assert_eq!(moved.parent, ParentRef::Title("Checkout".into()));
}

#[tokio::test]
async fn clearing_a_parent_removes_the_link() {
    let store = Arc::new(board());
    let session = session(&store, r#"{"action":"update","workItems":[{"id":7,"parent":null}]}"#);

    run_instruction(&session, "Web", "detach 7 from its epic", &ItemQuery::default())
        .await
        .unwrap();

    assert!(store.item(7).unwrap().relations.is_empty());
}

#[tokio::test]
async fn local_dedupe_deletes_the_later_copy() {
    let store = Arc::new(board());
    let session = session(&store, "");
    let snapshot = fetch_snapshot(store.as_ref(), "Web", &ItemQuery::default()).await.unwrap();

    let batch = duplicate_batch(&snapshot);
    assert_eq!(batch.action(), MutationAction::BatchDelete);

    let outcome = run_batch(&session, "Web", batch, &snapshot, &ItemQuery::default()).await;
    assert_eq!(outcome.failures(), 0);
    assert!(store.item(7).is_none());
    assert!(store.item(6).is_some());
}
