//! Resource abstraction layer
//!
//! Resource kinds are pluggable: each `(domain, kind)` registers a DAO
//! factory and a renderer factory in the [`CapabilityRegistry`]. The
//! [`FetchOrchestrator`] drives those DAOs across every credential selection
//! and region the operator has active.
//!
//! # Architecture
//!
//! - [`registry`] - Capability registry populated at startup
//! - [`dao`] - Data-access contract every kind implements
//! - [`fetcher`] - Concurrent fan-out, aggregation and pagination
//! - [`scoped`] - Region/identity wrapping of fetched resources
//! - [`pagination`] - Per-pair continuation cursors
//! - [`render`] - Column-driven renderers
//!
//! # Example
//!
//! ```ignore
//! use tfleet::context::{ExecContext, OperationContext};
//! use tfleet::resource::{FetchOrchestrator, ResourceKind};
//!
//! async fn list_vms(fetcher: &FetchOrchestrator, op: &OperationContext) -> anyhow::Result<()> {
//!     let kind = ResourceKind::new("compute", "instances");
//!     let result = fetcher.load_resources(&ExecContext::new(), &kind, op).await?;
//!     for item in &result.resources {
//!         println!("{} {}", item.id(), item.name());
//!     }
//!     Ok(())
//! }
//! ```

pub mod dao;
pub mod fetcher;
pub mod model;
pub mod pagination;
pub mod registry;
pub mod render;
pub mod scoped;

pub use dao::{Dao, DaoFactory, Operation};
pub use fetcher::{AccountResolver, FetchOrchestrator, FetchResult, FetchSettings};
pub use model::{Resource, ResourceKind};
pub use pagination::{Page, PageKey, PageToken, PageTokenMap};
pub use registry::{CapabilityEntry, CapabilityRegistry, KindScope, Precedence};
pub use render::{extract_json_value, ColumnDef, ColumnRenderer, Renderer};
pub use scoped::{
    resource_region, unwrap_resource, wrap_with_identity, wrap_with_region, wrap_with_scope,
    ResourceItem, ResourceScope, ScopedResource,
};
