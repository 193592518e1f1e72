//! Resource kinds and plain resource values

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// `(domain, kind)` pair, e.g. `compute/instances`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceKind {
    pub domain: String,
    pub kind: String,
}

impl ResourceKind {
    pub fn new(domain: &str, kind: &str) -> Self {
        Self {
            domain: domain.to_string(),
            kind: kind.to_string(),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.kind)
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((domain, kind)) if !domain.is_empty() && !kind.is_empty() && !kind.contains('/') => {
                Ok(Self::new(domain, kind))
            }
            _ => Err(format!("Expected <domain>/<kind>, got '{}'", s)),
        }
    }
}

/// A resource as returned by a DAO
///
/// `id` is unique only within one credential + region pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
    /// Fully qualified link (GCP `selfLink`)
    pub self_link: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub raw: Value,
}

impl Resource {
    pub fn new(kind: ResourceKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            name: name.into(),
            self_link: None,
            tags: BTreeMap::new(),
            raw: Value::Null,
        }
    }

    /// Build from an API item: `id_field`/`name_field` are top-level keys,
    /// `selfLink` and `labels` are picked up when present.
    pub fn from_json(kind: ResourceKind, item: Value, id_field: &str, name_field: &str) -> Self {
        let name = item
            .get(name_field)
            .and_then(json_scalar)
            .unwrap_or_else(|| "-".to_string());
        let id = item
            .get(id_field)
            .and_then(json_scalar)
            .unwrap_or_else(|| name.clone());
        let self_link = item
            .get("selfLink")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let tags = item
            .get("labels")
            .and_then(|v| v.as_object())
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            kind,
            id,
            name,
            self_link,
            tags,
            raw: item,
        }
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }
}

fn json_scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
