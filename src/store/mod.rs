pub mod azure;

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;

use crate::error::StoreError;
use crate::model::patch::PatchOperation;
use crate::model::remote::RemoteItem;
use crate::model::work_item::{ParentRef, WorkItem, WorkItemType};

/// Maximum number of ids the store accepts in one detail request.
pub const FETCH_BATCH_SIZE: usize = 200;

/// Filters applied when listing a project's items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    pub item_type: Option<WorkItemType>,
    pub assigned_to: Option<String>,
}

#[async_trait]
pub trait WorkItemStore: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<String>, StoreError>;
    /// Ids matching the query, most recently changed first.
    async fn query_ids(&self, project: &str, query: &ItemQuery) -> Result<Vec<u32>, StoreError>;
    /// Details for at most [`FETCH_BATCH_SIZE`] ids. Ids that no longer exist are skipped.
    async fn fetch_items(&self, project: &str, ids: &[u32]) -> Result<Vec<RemoteItem>, StoreError>;
    /// One record with its relations.
    async fn fetch_item(&self, project: &str, id: u32) -> Result<RemoteItem, StoreError>;
    /// Returns the id the store assigned.
    async fn create_item(
        &self,
        project: &str,
        item_type: &WorkItemType,
        ops: &[PatchOperation],
    ) -> Result<u32, StoreError>;
    async fn update_item(
        &self,
        project: &str,
        id: u32,
        ops: &[PatchOperation],
    ) -> Result<u32, StoreError>;
    async fn delete_item(&self, project: &str, id: u32) -> Result<(), StoreError>;
    /// URL other records use when linking to this item.
    fn item_url(&self, id: u32) -> String;
}

/// Fetch a fresh item snapshot for a project, paging detail requests.
///
/// A page that fails to load is logged and skipped so one bad page doesn't
/// blank the whole view; a failing id query is returned as an error.
pub async fn fetch_snapshot(
    store: &dyn WorkItemStore,
    project: &str,
    query: &ItemQuery,
) -> Result<Vec<WorkItem>, StoreError> {
    let ids = store.query_ids(project, query).await?;
    let mut remote = Vec::with_capacity(ids.len());
    for page in ids.chunks(FETCH_BATCH_SIZE) {
        match store.fetch_items(project, page).await {
            Ok(items) => remote.extend(items),
            Err(err) => {
                warn!(project, page_len = page.len(), error = %err, "skipping work item page");
            }
        }
    }
    Ok(build_snapshot(&remote))
}

/// Convert remote records to canonical items, replacing parent ids with the
/// parent's title when the parent is part of the same fetch.
pub fn build_snapshot(remote: &[RemoteItem]) -> Vec<WorkItem> {
    let titles: HashMap<u32, &str> = remote
        .iter()
        .filter_map(|r| r.fields.title().map(|title| (r.id, title)))
        .collect();

    remote
        .iter()
        .map(|r| {
            let mut item = r.to_work_item();
            if let ParentRef::Id(parent_id) = item.parent {
                if let Some(title) = titles.get(&parent_id) {
                    item.parent = ParentRef::Title((*title).to_string());
                }
            }
            item
        })
        .collect()
}

#[cfg(test)]
pub mod mock;
