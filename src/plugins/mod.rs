//! Built-in resource kinds
//!
//! - [`compute`] - `compute/instances`, `compute/subnetworks`, `compute/zones`
//! - [`storage`] - `storage/buckets`, `storage/objects`
//! - [`local`] - `local/identities`
//!
//! GCP kinds share one [`GcpBackend`]; their DAO factories resolve
//! credentials for the selection in the execution context and bind a client
//! to its region.

pub mod compute;
pub mod local;
pub mod rest;
pub mod storage;

use crate::config::Config;
use crate::context::ExecContext;
use crate::error::ResourceResult;
use crate::gcp::auth::CredentialSource;
use crate::gcp::client::{Endpoints, GcpClient};
use crate::gcp::http::GcpHttpClient;
use crate::resource::CapabilityRegistry;
use std::sync::Arc;

/// Shared plumbing for the GCP-backed kinds
#[derive(Clone)]
pub struct GcpBackend {
    pub credentials: Arc<dyn CredentialSource>,
    pub http: GcpHttpClient,
    pub endpoints: Endpoints,
}

impl GcpBackend {
    pub fn new(credentials: Arc<dyn CredentialSource>, http: GcpHttpClient) -> Self {
        Self {
            credentials,
            http,
            endpoints: Endpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Client for the selection and region carried by `ctx`
    pub async fn client(&self, ctx: &ExecContext) -> ResourceResult<GcpClient> {
        let region = ctx.require_region()?.clone();
        let credentials = self.credentials.credentials(&ctx.selection_or_default()).await?;
        let project_id = credentials.project_id().await?;

        Ok(GcpClient::new(
            credentials,
            self.http.clone(),
            self.endpoints.clone(),
            &project_id,
            region,
        ))
    }
}

/// Register every built-in kind
pub fn register_builtin(registry: &mut CapabilityRegistry, backend: &GcpBackend, config: &Config) {
    compute::register(registry, backend);
    storage::register(registry, backend);
    local::register(registry, config);
}
