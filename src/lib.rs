//! tfleet - browse GCP resources across several identities and regions
//!
//! The library holds everything but argument parsing: the resource
//! abstraction layer, the GCP backend and the built-in kinds.

pub mod config;
pub mod context;
pub mod error;
pub mod gcp;
pub mod plugins;
pub mod resource;
pub mod ui;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
