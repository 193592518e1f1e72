//! Resource identity wrapping
//!
//! A resource id is only unique inside one credential + region pair. When a
//! fetch fans out over several pairs, each resource is moved into a
//! [`ScopedResource`] that records where it came from and exposes a
//! qualified id that stays unique across the whole result.
//!
//! Wrap depth is an explicit stack of [`ResourceScope`] layers. Wrapping a
//! scoped item pushes another layer; [`unwrap_resource`] pops exactly one.
//! The fetch path only ever wraps plain [`Resource`] values, so it never
//! builds more than one layer.

use super::model::{Resource, ResourceKind};
use crate::context::{Region, Selection};
use serde_json::Value;
use std::collections::BTreeMap;

/// Where a resource was fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceScope {
    pub region: Region,
    pub selection: Option<Selection>,
    /// Resolved account identity (GCP project id) for `selection`
    pub account_id: Option<String>,
}

impl ResourceScope {
    pub fn region(region: Region) -> Self {
        Self {
            region,
            selection: None,
            account_id: None,
        }
    }

    pub fn identity(region: Region, selection: Selection, account_id: Option<String>) -> Self {
        Self {
            region,
            selection: Some(selection),
            account_id,
        }
    }

    fn prefix(&self) -> String {
        match &self.selection {
            Some(selection) => format!("{}/{}/", selection.id(), self.region),
            None => format!("{}/", self.region),
        }
    }
}

/// A resource plus one or more scope layers (innermost first, never empty)
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedResource {
    inner: Resource,
    layers: Vec<ResourceScope>,
}

impl ScopedResource {
    pub fn new(inner: Resource, scope: ResourceScope) -> Self {
        Self {
            inner,
            layers: vec![scope],
        }
    }

    pub fn inner(&self) -> &Resource {
        &self.inner
    }

    pub fn into_inner(self) -> Resource {
        self.inner
    }

    /// Outermost layer
    pub fn scope(&self) -> &ResourceScope {
        // layers is never empty: built with one layer, popped down to one at most
        &self.layers[self.layers.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Outermost prefix first, then the inner id
    pub fn qualified_id(&self) -> String {
        let mut id: String = self.layers.iter().rev().map(ResourceScope::prefix).collect();
        id.push_str(&self.inner.id);
        id
    }
}

/// A fetched resource: plain or scoped
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceItem {
    Plain(Resource),
    Scoped(ScopedResource),
}

impl ResourceItem {
    /// The underlying resource, however deeply scoped
    pub fn resource(&self) -> &Resource {
        match self {
            Self::Plain(r) => r,
            Self::Scoped(s) => &s.inner,
        }
    }

    /// Qualified id for scoped items, the plain id otherwise
    pub fn id(&self) -> String {
        match self {
            Self::Plain(r) => r.id.clone(),
            Self::Scoped(s) => s.qualified_id(),
        }
    }

    pub fn name(&self) -> &str {
        &self.resource().name
    }

    pub fn self_link(&self) -> Option<&str> {
        self.resource().self_link.as_deref()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.resource().tags
    }

    pub fn raw(&self) -> &Value {
        &self.resource().raw
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.resource().kind
    }

    /// Outermost scope, if any
    pub fn scope(&self) -> Option<&ResourceScope> {
        match self {
            Self::Plain(_) => None,
            Self::Scoped(s) => Some(s.scope()),
        }
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self, Self::Scoped(_))
    }

    /// Strip every layer
    pub fn into_resource(self) -> Resource {
        match self {
            Self::Plain(r) => r,
            Self::Scoped(s) => s.inner,
        }
    }
}

impl From<Resource> for ResourceItem {
    fn from(r: Resource) -> Self {
        Self::Plain(r)
    }
}

/// Add a region layer
pub fn wrap_with_region(item: ResourceItem, region: Region) -> ResourceItem {
    wrap_with_scope(item, ResourceScope::region(region))
}

/// Add a region + selection (+ account) layer
pub fn wrap_with_identity(
    item: ResourceItem,
    region: Region,
    selection: Selection,
    account_id: Option<String>,
) -> ResourceItem {
    wrap_with_scope(item, ResourceScope::identity(region, selection, account_id))
}

pub fn wrap_with_scope(item: ResourceItem, scope: ResourceScope) -> ResourceItem {
    match item {
        ResourceItem::Plain(r) => ResourceItem::Scoped(ScopedResource::new(r, scope)),
        ResourceItem::Scoped(mut s) => {
            s.layers.push(scope);
            ResourceItem::Scoped(s)
        }
    }
}

/// Remove exactly one layer. Plain items are returned unchanged.
pub fn unwrap_resource(item: ResourceItem) -> ResourceItem {
    match item {
        ResourceItem::Plain(r) => ResourceItem::Plain(r),
        ResourceItem::Scoped(mut s) => {
            if s.layers.len() > 1 {
                s.layers.pop();
                ResourceItem::Scoped(s)
            } else {
                ResourceItem::Plain(s.inner)
            }
        }
    }
}

/// Region of the outermost layer
pub fn resource_region(item: &ResourceItem) -> Option<&Region> {
    item.scope().map(|s| &s.region)
}
