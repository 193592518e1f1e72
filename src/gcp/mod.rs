//! GCP API interaction module
//!
//! Authentication per credential selection, the HTTP client and the REST
//! URL helpers used by the built-in resource kinds.
//!
//! # Module Structure
//!
//! - [`auth`] - Token sources per selection (ADC, env key file, named keys)
//! - [`client`] - Client bound to one identity, project and region
//! - [`http`] - HTTP utilities and status mapping for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use tfleet::context::{Region, Selection};
//! use tfleet::gcp::auth::{CredentialSource, CredentialStore};
//!
//! async fn example(store: &CredentialStore) -> tfleet::error::ResourceResult<()> {
//!     let creds = store.credentials(&Selection::DefaultChain).await?;
//!     let project = creds.project_id().await?;
//!     println!("{}", project);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;

/// Environment variables that name the default project, in priority order
const PROJECT_ENV_VARS: &[&str] = &["GOOGLE_CLOUD_PROJECT", "CLOUDSDK_CORE_PROJECT"];

/// Project pinned through the environment, if any
pub fn default_project() -> Option<String> {
    PROJECT_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
