//! Error taxonomy for resource access
//!
//! DAOs, the capability registry and the fetch orchestrator all speak
//! [`ResourceError`]. The binary converts it into `anyhow::Error` at the edge.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while resolving, fetching or acting on resources
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    #[error("Unknown service: {0}")]
    DomainNotFound(String),

    #[error("Unknown resource kind: {domain}/{kind}")]
    KindNotFound { domain: String, kind: String },

    /// A single record is absent. Tolerated during describe-after-list passes.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// One remote call failed. Recorded per pair, never fatal on its own.
    #[error("{0}")]
    Transient(String),

    /// Every fan-out pair failed.
    #[error("All fetches failed: {}", .errors.join("; "))]
    AggregateFetch { errors: Vec<String> },

    /// The kind needs a scoping field (e.g. a parent id) the caller did not supply.
    #[error("{kind} requires a '{field}' filter")]
    FilterRequired { kind: String, field: String },

    #[error("Operation '{operation}' is not supported by {kind}")]
    Unsupported { kind: String, operation: String },

    #[error("{0} is read-only")]
    ReadOnly(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid operation context: {0}")]
    InvalidContext(String),
}

impl ResourceError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Errors that must abort a whole fetch instead of being recorded per pair
    pub fn is_escalating(&self) -> bool {
        matches!(self, Self::FilterRequired { .. })
    }
}

pub type ResourceResult<T> = std::result::Result<T, ResourceError>;
