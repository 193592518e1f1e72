//! GCP Client
//!
//! Binds a token source, a project and a region to the HTTP client, and
//! builds the REST URLs the built-in kinds use.

use super::auth::AccessTokenSource;
use super::http::GcpHttpClient;
use crate::context::Region;
use crate::error::{ResourceError, ResourceResult};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// API base URLs, overridable for emulators and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub compute: String,
    pub storage: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com".to_string(),
            storage: "https://storage.googleapis.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Every API served from one base URL
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            compute: base.clone(),
            storage: base,
        }
    }
}

/// Client for one (identity, project, region)
#[derive(Clone)]
pub struct GcpClient {
    credentials: Arc<dyn AccessTokenSource>,
    pub http: GcpHttpClient,
    pub endpoints: Endpoints,
    pub project_id: String,
    pub region: Region,
}

impl GcpClient {
    pub fn new(
        credentials: Arc<dyn AccessTokenSource>,
        http: GcpHttpClient,
        endpoints: Endpoints,
        project_id: &str,
        region: Region,
    ) -> Self {
        Self {
            credentials,
            http,
            endpoints,
            project_id: project_id.to_string(),
            region,
        }
    }

    /// Make a GET request to a GCP API. A rejected token is refreshed and
    /// the request retried once.
    pub async fn get(&self, url: &str) -> ResourceResult<Value> {
        let token = self.credentials.access_token().await?;
        match self.http.get(url, &token).await {
            Err(ResourceError::Credential(reason)) => {
                tracing::debug!("Token rejected ({}), refreshing", reason);
                let token = self.credentials.refresh().await?;
                self.http.get(url, &token).await
            }
            other => other,
        }
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str) -> ResourceResult<Value> {
        let token = self.credentials.access_token().await?;
        self.http.delete(url, &token).await
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, path: &str) -> String {
        format!(
            "{}/compute/v1/projects/{}/{}",
            self.endpoints.compute, self.project_id, path
        )
    }

    /// Build zonal Compute Engine API URL
    pub fn compute_zonal_url(&self, zone: &str, resource: &str) -> String {
        self.compute_url(&format!("zones/{}/{}", zone, resource))
    }

    /// Build regional Compute Engine API URL
    pub fn compute_regional_url(&self, resource: &str) -> String {
        self.compute_url(&format!("regions/{}/{}", self.region, resource))
    }

    /// Build aggregated Compute Engine API URL (all zones)
    pub fn compute_aggregated_url(&self, resource: &str) -> String {
        self.compute_url(&format!("aggregated/{}", resource))
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    /// Build Cloud Storage API URL
    pub fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.endpoints.storage, path)
    }

    /// Build Cloud Storage bucket URL
    pub fn storage_bucket_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}", urlencoding::encode(bucket)))
    }

    /// Build Cloud Storage objects URL
    pub fn storage_objects_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}/o", urlencoding::encode(bucket)))
    }

    /// Build Cloud Storage object URL; object names may contain `/`
    pub fn storage_object_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/{}",
            self.storage_objects_url(bucket),
            urlencoding::encode(object)
        )
    }
}

/// Append query parameters to a URL, skipping empty values
pub fn add_query_params(url: &str, params: &[(&str, String)]) -> ResourceResult<String> {
    let mut parsed =
        Url::parse(url).map_err(|e| ResourceError::transient(format!("Invalid URL {}: {}", url, e)))?;

    {
        let mut query = parsed.query_pairs_mut();
        for (key, value) in params.iter().filter(|(_, v)| !v.is_empty()) {
            query.append_pair(key, value);
        }
    }

    let out = parsed.to_string();
    Ok(out.strip_suffix('?').map(str::to_string).unwrap_or(out))
}

/// Flatten a Compute Engine aggregated list into `items`, keeping only the
/// zones of `region`. Keys look like `zones/us-central1-a`.
pub fn flatten_aggregated_response(response: &Value, region: &Region) -> Vec<Value> {
    let Some(items) = response.get("items").and_then(|v| v.as_object()) else {
        return Vec::new();
    };

    let mut all_items: Vec<Value> = Vec::new();

    for (scope_key, scope_data) in items {
        let in_region = match scope_key.split_once('/') {
            Some(("zones", zone)) => region.contains_zone(zone),
            Some(("regions", name)) => name == region.as_str(),
            _ => false,
        };
        if !in_region {
            continue;
        }

        // Each scope entry has "instances", "disks", etc. plus an optional "warning"
        if let Some(obj) = scope_data.as_object() {
            for (key, value) in obj {
                if key == "warning" {
                    continue;
                }
                if let Some(arr) = value.as_array() {
                    all_items.extend(arr.iter().cloned());
                }
            }
        }
    }

    all_items
}
