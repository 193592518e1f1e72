//! Data-driven DAO for GCP list/get/delete REST collections
//!
//! Every built-in GCP kind is a [`RestKind`] table entry: how to build its
//! collection and item URLs, how to read the list response, and how to derive
//! a per-pair unique id from an item.

use super::GcpBackend;
use crate::context::{ExecContext, Region};
use crate::error::{ResourceError, ResourceResult};
use crate::gcp::client::{add_query_params, flatten_aggregated_response, GcpClient};
use crate::resource::render::extract_short_name;
use crate::resource::{Dao, Operation, Page, PageToken, Resource, ResourceKind};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;

/// Page size used when a caller asks for everything at once
const LIST_ALL_PAGE_SIZE: usize = 500;

/// How a list response carries its items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListShape {
    /// `{"items": [...]}`
    Items,
    /// Compute aggregated list, `{"items": {"zones/x": {"instances": [...]}}}`
    Aggregated,
}

/// Static description of one REST-backed kind
pub struct RestKind {
    pub domain: &'static str,
    pub kind: &'static str,
    pub list_url: fn(&GcpClient, &ExecContext) -> ResourceResult<String>,
    pub item_url: fn(&GcpClient, &ExecContext, &str) -> ResourceResult<String>,
    pub shape: ListShape,
    /// Id unique within one (selection, region); defaults to `name`
    pub id_of: fn(&Value) -> Option<String>,
    /// Client-side narrowing to the client's region
    pub keep: fn(&Value, &Region) -> bool,
    pub read_only: bool,
}

impl RestKind {
    pub fn resource_kind(&self) -> ResourceKind {
        ResourceKind::new(self.domain, self.kind)
    }
}

pub fn id_from_name(item: &Value) -> Option<String> {
    item.get("name").and_then(|v| v.as_str()).map(str::to_string)
}

pub fn keep_all(_item: &Value, _region: &Region) -> bool {
    true
}

/// DAO over one [`RestKind`] for one client
pub struct RestDao {
    client: GcpClient,
    def: &'static RestKind,
}

impl RestDao {
    pub fn new(client: GcpClient, def: &'static RestKind) -> Self {
        Self { client, def }
    }

    /// Factory closure for the capability registry
    pub fn factory(
        backend: GcpBackend,
        def: &'static RestKind,
    ) -> impl Fn(ExecContext) -> BoxFuture<'static, ResourceResult<Arc<dyn Dao>>> + Send + Sync {
        move |ctx: ExecContext| {
            let backend = backend.clone();
            async move {
                let client = backend.client(&ctx).await?;
                Ok::<Arc<dyn Dao>, ResourceError>(Arc::new(RestDao::new(client, def)))
            }
            .boxed()
        }
    }

    fn to_resource(&self, item: Value) -> Resource {
        let item = post_process_item(item);
        let id = (self.def.id_of)(&item);
        let mut resource = Resource::from_json(self.def.resource_kind(), item, "name", "name");
        if let Some(id) = id {
            resource.id = id;
        }
        resource
    }

    fn extract_items(&self, response: &Value) -> Vec<Value> {
        let items = match self.def.shape {
            ListShape::Items => response
                .get("items")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default(),
            ListShape::Aggregated => flatten_aggregated_response(response, &self.client.region),
        };

        items
            .into_iter()
            .filter(|item| (self.def.keep)(item, &self.client.region))
            .collect()
    }
}

#[async_trait]
impl Dao for RestDao {
    async fn list(&self, ctx: &ExecContext) -> ResourceResult<Vec<Resource>> {
        let mut all = Vec::new();
        let mut token: Option<PageToken> = None;

        loop {
            let page = self.list_page(ctx, LIST_ALL_PAGE_SIZE, token.as_ref()).await?;
            all.extend(page.resources);

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(all)
    }

    async fn get(&self, ctx: &ExecContext, id: &str) -> ResourceResult<Resource> {
        let url = (self.def.item_url)(&self.client, ctx, id)?;
        let item = self.client.get(&url).await?;
        Ok(self.to_resource(item))
    }

    async fn delete(&self, ctx: &ExecContext, id: &str) -> ResourceResult<()> {
        if self.def.read_only {
            return Err(ResourceError::ReadOnly(self.def.resource_kind().to_string()));
        }
        let url = (self.def.item_url)(&self.client, ctx, id)?;
        self.client.delete(&url).await?;
        Ok(())
    }

    async fn list_page(
        &self,
        ctx: &ExecContext,
        page_size: usize,
        token: Option<&PageToken>,
    ) -> ResourceResult<Page> {
        let url = (self.def.list_url)(&self.client, ctx)?;
        let url = add_query_params(
            &url,
            &[
                ("maxResults", page_size.to_string()),
                ("pageToken", token.map(|t| t.as_str().to_string()).unwrap_or_default()),
            ],
        )?;

        let response = self.client.get(&url).await?;

        let resources = self
            .extract_items(&response)
            .into_iter()
            .map(|item| self.to_resource(item))
            .collect();

        let next_token = PageToken::new(
            response
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
        );

        Ok(Page {
            resources,
            next_token,
        })
    }

    fn supports(&self, operation: Operation) -> bool {
        match operation {
            Operation::Delete => !self.def.read_only,
            _ => true,
        }
    }
}

/// Add short names for URL-valued fields
fn post_process_item(mut item: Value) -> Value {
    if let Value::Object(ref mut map) = item {
        for field in ["zone", "region", "machineType", "network"] {
            if let Some(url) = map.get(field).and_then(|v| v.as_str()) {
                let short = extract_short_name(url);
                map.insert(format!("{}_short", field), Value::String(short));
            }
        }
    }
    item
}
