use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ItemQuery, WorkItemStore};
use crate::error::{truncate_body, StoreError};
use crate::model::patch::PatchOperation;
use crate::model::remote::{KnownField, Relation, RemoteFields, RemoteItem};
use crate::model::work_item::WorkItemType;

const API_VERSION: &str = "7.0";
const DEFAULT_HOST: &str = "https://dev.azure.com";
const JSON_PATCH: &str = "application/json-patch+json";

/// Azure DevOps Boards over the REST API, authenticated with a personal access token.
pub struct AzureDevOpsStore {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
}

impl AzureDevOpsStore {
    pub fn new(organization: &str, pat: &str) -> Self {
        Self::with_host(DEFAULT_HOST, organization, pat)
    }

    /// For Azure DevOps Server installs that don't live on dev.azure.com.
    pub fn with_host(host: &str, organization: &str, pat: &str) -> Self {
        Self {
            base_url: format!("{}/{}", host.trim_end_matches('/'), organization),
            auth_header: basic_auth(pat),
            client: reqwest::Client::new(),
        }
    }

    fn project_url(&self, project: &str, path: &str) -> String {
        format!(
            "{}/{}/_apis/{path}",
            self.base_url,
            urlencoding::encode(project)
        )
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<reqwest::Response, StoreError> {
        let resp = request
            .header("Authorization", &self.auth_header)
            .query(&[("api-version", API_VERSION)])
            .send()
            .await
            .map_err(|e| StoreError::request(context, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                context: context.to_string(),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T, StoreError> {
        self.send(request, context)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::decode(context, e))
    }

    fn patch_body(ops: &[PatchOperation], context: &str) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(ops).map_err(|e| StoreError::decode(context, e))
    }
}

fn basic_auth(pat: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!(":{pat}"));
    format!("Basic {encoded}")
}

/// WIQL literals are single-quoted; embedded quotes are doubled.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn build_wiql(project: &str, query: &ItemQuery) -> String {
    let mut wiql = format!(
        "SELECT [System.Id] FROM WorkItems WHERE [System.TeamProject] = {}",
        quote(project)
    );
    if let Some(item_type) = &query.item_type {
        wiql.push_str(&format!(" AND [System.WorkItemType] = {}", quote(item_type.as_str())));
    }
    if let Some(user) = &query.assigned_to {
        wiql.push_str(&format!(" AND [System.AssignedTo] = {}", quote(user)));
    }
    wiql.push_str(" ORDER BY [System.ChangedDate] DESC");
    wiql
}

#[derive(Deserialize)]
struct ListResponse<T> {
    value: Vec<T>,
}

#[derive(Deserialize)]
struct ProjectRef {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WiqlResponse {
    #[serde(default)]
    work_items: Vec<WiqlRef>,
}

#[derive(Deserialize)]
struct WiqlRef {
    id: u32,
}

#[derive(Deserialize)]
struct ApiWorkItem {
    id: u32,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    relations: Option<Vec<Relation>>,
}

impl From<ApiWorkItem> for RemoteItem {
    fn from(item: ApiWorkItem) -> Self {
        RemoteItem {
            id: item.id,
            fields: RemoteFields::from_map(item.fields),
            relations: item.relations.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl WorkItemStore for AzureDevOpsStore {
    async fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        let url = format!("{}/_apis/projects", self.base_url);
        let resp: ListResponse<ProjectRef> = self
            .send_json(self.client.get(&url), "list projects")
            .await?;
        Ok(resp.value.into_iter().map(|p| p.name).collect())
    }

    async fn query_ids(&self, project: &str, query: &ItemQuery) -> Result<Vec<u32>, StoreError> {
        let wiql = build_wiql(project, query);
        debug!(project, %wiql, "running work item query");
        let resp: WiqlResponse = self
            .send_json(
                self.client
                    .post(self.project_url(project, "wit/wiql"))
                    .json(&serde_json::json!({ "query": wiql })),
                "query work items",
            )
            .await?;
        Ok(resp.work_items.into_iter().map(|w| w.id).collect())
    }

    async fn fetch_items(&self, project: &str, ids: &[u32]) -> Result<Vec<RemoteItem>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let fields = KnownField::ALL
            .iter()
            .map(|f| f.remote_name())
            .collect::<Vec<_>>()
            .join(",");

        // errorPolicy=omit returns null in place of deleted ids instead of failing the page.
        let resp: ListResponse<Option<ApiWorkItem>> = self
            .send_json(
                self.client
                    .get(self.project_url(project, "wit/workitems"))
                    .query(&[
                        ("ids", ids.as_str()),
                        ("fields", fields.as_str()),
                        ("errorPolicy", "omit"),
                    ]),
                "fetch work item details",
            )
            .await?;
        Ok(resp.value.into_iter().flatten().map(RemoteItem::from).collect())
    }

    async fn fetch_item(&self, project: &str, id: u32) -> Result<RemoteItem, StoreError> {
        let item: ApiWorkItem = self
            .send_json(
                self.client
                    .get(self.project_url(project, &format!("wit/workitems/{id}")))
                    .query(&[("$expand", "relations")]),
                &format!("fetch work item {id}"),
            )
            .await?;
        Ok(item.into())
    }

    async fn create_item(
        &self,
        project: &str,
        item_type: &WorkItemType,
        ops: &[PatchOperation],
    ) -> Result<u32, StoreError> {
        let context = format!("create {item_type}");
        let path = format!("wit/workitems/${}", urlencoding::encode(item_type.as_str()));
        let item: ApiWorkItem = self
            .send_json(
                self.client
                    .post(self.project_url(project, &path))
                    .header("Content-Type", JSON_PATCH)
                    .body(Self::patch_body(ops, &context)?),
                &context,
            )
            .await?;
        Ok(item.id)
    }

    async fn update_item(
        &self,
        project: &str,
        id: u32,
        ops: &[PatchOperation],
    ) -> Result<u32, StoreError> {
        let context = format!("update work item {id}");
        let item: ApiWorkItem = self
            .send_json(
                self.client
                    .patch(self.project_url(project, &format!("wit/workitems/{id}")))
                    .header("Content-Type", JSON_PATCH)
                    .body(Self::patch_body(ops, &context)?),
                &context,
            )
            .await?;
        Ok(item.id)
    }

    async fn delete_item(&self, project: &str, id: u32) -> Result<(), StoreError> {
        self.send(
            self.client
                .delete(self.project_url(project, &format!("wit/workitems/{id}"))),
            &format!("delete work item {id}"),
        )
        .await?;
        Ok(())
    }

    fn item_url(&self, id: u32) -> String {
        format!("{}/_apis/wit/workItems/{id}", self.base_url)
    }
}
