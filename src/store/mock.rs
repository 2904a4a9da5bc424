use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{ItemQuery, WorkItemStore};
use crate::error::StoreError;
use crate::model::patch::{PatchOp, PatchOperation};
use crate::model::remote::{Relation, RemoteFields, RemoteItem};
use crate::model::work_item::WorkItemType;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    QueryIds,
    FetchItems(Vec<u32>),
    FetchItem(u32),
    Create {
        item_type: String,
        ops: Vec<PatchOperation>,
    },
    Update {
        id: u32,
        ops: Vec<PatchOperation>,
    },
    Delete(u32),
}

/// In-memory store that applies patches and records every call.
pub struct MockStore {
    items: Mutex<BTreeMap<u32, RemoteItem>>,
    calls: Mutex<Vec<StoreCall>>,
    failing_fetch: Mutex<HashSet<u32>>,
    failing_write: Mutex<HashSet<u32>>,
    next_id: AtomicU32,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            failing_fetch: Mutex::new(HashSet::new()),
            failing_write: Mutex::new(HashSet::new()),
            next_id: AtomicU32::new(1000),
        }
    }

    pub fn with_item(self, id: u32, fields: Value) -> Self {
        self.with_item_relations(id, fields, Vec::new())
    }

    pub fn with_item_relations(self, id: u32, fields: Value, relations: Vec<Relation>) -> Self {
        let fields = match fields {
            Value::Object(map) => RemoteFields::from_map(map),
            _ => RemoteFields::default(),
        };
        self.items.lock().unwrap().insert(
            id,
            RemoteItem {
                id,
                fields,
                relations,
            },
        );
        self
    }

    /// Make `fetch_item(id)` fail.
    pub fn fail_fetch(self, id: u32) -> Self {
        self.failing_fetch.lock().unwrap().insert(id);
        self
    }

    /// Make updates and deletes of `id` fail.
    pub fn fail_write(self, id: u32) -> Self {
        self.failing_write.lock().unwrap().insert(id);
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn item(&self, id: u32) -> Option<RemoteItem> {
        self.items.lock().unwrap().get(&id).cloned()
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn apply(&self, item: &mut RemoteItem, ops: &[PatchOperation]) {
        for op in ops {
            if let Some(name) = op.path.strip_prefix("/fields/") {
                item.fields
                    .insert(name, op.value.clone().unwrap_or(Value::Null));
            } else if op.op == PatchOp::Add {
                if let Some(Value::Object(value)) = &op.value {
                    item.relations.push(Relation {
                        rel: value.get("rel").and_then(Value::as_str).unwrap_or_default().into(),
                        url: value.get("url").and_then(Value::as_str).unwrap_or_default().into(),
                        attributes: None,
                    });
                }
            } else if let Some(index) = op
                .path
                .strip_prefix("/relations/")
                .and_then(|i| i.parse::<usize>().ok())
            {
                if index < item.relations.len() {
                    item.relations.remove(index);
                }
            }
        }
        // The real service keeps System.Parent in step with the hierarchy link.
        let parent = item
            .relations
            .iter()
            .find(|relation| relation.is_hierarchy_parent())
            .and_then(Relation::target_id);
        item.fields
            .insert("System.Parent", parent.map_or(Value::Null, Value::from));
    }
}

#[async_trait]
impl WorkItemStore for MockStore {
    async fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        Ok(vec!["Web".into(), "Mobile".into()])
    }

    async fn query_ids(&self, _project: &str, query: &ItemQuery) -> Result<Vec<u32>, StoreError> {
        self.record(StoreCall::QueryIds);
        let items = self.items.lock().unwrap();
        Ok(items
            .values()
            .rev()
            .filter(|item| {
                query
                    .item_type
                    .as_ref()
                    .map_or(true, |t| item.fields.work_item_type().as_ref() == Some(t))
            })
            .map(|item| item.id)
            .collect())
    }

    async fn fetch_items(&self, _project: &str, ids: &[u32]) -> Result<Vec<RemoteItem>, StoreError> {
        self.record(StoreCall::FetchItems(ids.to_vec()));
        let items = self.items.lock().unwrap();
        Ok(ids.iter().filter_map(|id| items.get(id).cloned()).collect())
    }

    async fn fetch_item(&self, _project: &str, id: u32) -> Result<RemoteItem, StoreError> {
        self.record(StoreCall::FetchItem(id));
        if self.failing_fetch.lock().unwrap().contains(&id) {
            return Err(StoreError::request(format!("fetch work item {id}"), "connection reset"));
        }
        self.items
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::Status {
                context: format!("fetch work item {id}"),
                status: 404,
                body: "not found".into(),
            })
    }

    async fn create_item(
        &self,
        _project: &str,
        item_type: &WorkItemType,
        ops: &[PatchOperation],
    ) -> Result<u32, StoreError> {
        self.record(StoreCall::Create {
            item_type: item_type.to_string(),
            ops: ops.to_vec(),
        });
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut item = RemoteItem {
            id,
            ..RemoteItem::default()
        };
        item.fields
            .insert("System.WorkItemType", Value::from(item_type.as_str()));
        self.apply(&mut item, ops);
        self.items.lock().unwrap().insert(id, item);
        Ok(id)
    }

    async fn update_item(
        &self,
        _project: &str,
        id: u32,
        ops: &[PatchOperation],
    ) -> Result<u32, StoreError> {
        self.record(StoreCall::Update {
            id,
            ops: ops.to_vec(),
        });
        if self.failing_write.lock().unwrap().contains(&id) {
            return Err(StoreError::Status {
                context: format!("update work item {id}"),
                status: 400,
                body: "rule violation".into(),
            });
        }
        let mut items = self.items.lock().unwrap();
        let mut item = items.remove(&id).unwrap_or(RemoteItem {
            id,
            ..RemoteItem::default()
        });
        self.apply(&mut item, ops);
        items.insert(id, item);
        Ok(id)
    }

    async fn delete_item(&self, _project: &str, id: u32) -> Result<(), StoreError> {
        self.record(StoreCall::Delete(id));
        if self.failing_write.lock().unwrap().contains(&id) {
            return Err(StoreError::request(format!("delete work item {id}"), "timed out"));
        }
        self.items.lock().unwrap().remove(&id);
        Ok(())
    }

    fn item_url(&self, id: u32) -> String {
        format!("https://mock.test/_apis/wit/workItems/{id}")
    }
}
