//! Configuration Management
//!
//! Handles persistent configuration storage for tfleet.

use crate::context::{OperationContext, Region, Selection};
use crate::error::ResourceResult;
use crate::resource::FetchSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_selections() -> Vec<String> {
    vec!["default".to_string()]
}

fn default_regions() -> Vec<String> {
    vec!["us-central1".to_string()]
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    50
}

/// A named credential identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Service account key file
    pub key_file: PathBuf,
    /// Project to use instead of the one in the key file
    #[serde(default)]
    pub project_id: Option<String>,
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active credential selections (`default`, `env` or identity names)
    #[serde(default = "default_selections")]
    pub selections: Vec<String>,
    /// Active regions
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,
    /// Named identities
    #[serde(default)]
    pub identities: BTreeMap<String, IdentityConfig>,
    /// Upper bound on concurrent remote calls per fetch (0 = unbounded)
    #[serde(default)]
    pub max_concurrent_fetches: usize,
    /// Deadline for one multi-region fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Block all write operations
    #[serde(default)]
    pub readonly: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            selections: default_selections(),
            regions: default_regions(),
            identities: BTreeMap::new(),
            max_concurrent_fetches: 0,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            page_size: default_page_size(),
            readonly: false,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tfleet").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from an explicit path; missing or invalid files give defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Operation context from the configured selections and regions
    pub fn operation_context(&self) -> ResourceResult<OperationContext> {
        OperationContext::new(
            self.selections.iter().map(|s| Selection::parse(s)).collect(),
            self.regions.iter().map(|r| Region::new(r.as_str())).collect(),
        )
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
            page_size: self.page_size.max(1),
            max_concurrent: self.max_concurrent_fetches,
        }
    }

    /// Remember the operator's selections and save
    pub fn set_selections(&mut self, selections: &[Selection]) -> Result<()> {
        self.selections = selections.iter().map(|s| s.id().to_string()).collect();
        self.save()
    }

    /// Remember the operator's regions and save
    pub fn set_regions(&mut self, regions: &[Region]) -> Result<()> {
        self.regions = regions.iter().map(|r| r.to_string()).collect();
        self.save()
    }
}
