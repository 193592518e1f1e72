//! Credential selections, regions and execution contexts
//!
//! [`OperationContext`] is what the operator picked: an ordered set of
//! credential selections and an ordered set of regions. Every fetch fans out
//! over their cross product. [`ExecContext`] is the per-call value handed to
//! DAO factories and DAOs; selection and region overrides travel in it
//! explicitly instead of through ambient state.

use crate::error::{ResourceError, ResourceResult};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Identifier of the default credential chain
pub const DEFAULT_SELECTION_ID: &str = "default";
/// Identifier of the environment-only credential source
pub const ENV_SELECTION_ID: &str = "env";

/// One credential identity choice
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Selection {
    /// Application Default Credentials (env var, gcloud, metadata server)
    DefaultChain,
    /// Only `GOOGLE_APPLICATION_CREDENTIALS`
    Environment,
    /// A named identity from the config file
    Named(String),
}

impl Selection {
    /// Parse a CLI/config token. `default` and `env` are reserved.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" | DEFAULT_SELECTION_ID => Self::DefaultChain,
            ENV_SELECTION_ID => Self::Environment,
            name => Self::Named(name.to_string()),
        }
    }

    /// Stable identifier, used in qualified ids and page keys
    pub fn id(&self) -> &str {
        match self {
            Self::DefaultChain => DEFAULT_SELECTION_ID,
            Self::Environment => ENV_SELECTION_ID,
            Self::Named(name) => name,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::DefaultChain => "default credentials",
            Self::Environment => "environment",
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One geographic endpoint scope, e.g. `us-central1`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region(String);

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Location of resources that belong to no region
    pub fn global() -> Self {
        Self::new("global")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `zone` (e.g. `us-central1-a`) belongs to this region
    pub fn contains_zone(&self, zone: &str) -> bool {
        zone.rsplit_once('-')
            .map(|(region, _)| region == self.0)
            .unwrap_or(false)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Filter for resources (parent ids, label selectors, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFilter {
    pub param: String,
    pub values: Vec<String>,
}

impl ResourceFilter {
    pub fn new(param: &str, values: Vec<String>) -> Self {
        Self {
            param: param.to_string(),
            values,
        }
    }

    /// Parse `key=value[,value...]`
    pub fn parse(s: &str) -> Option<Self> {
        let (param, values) = s.split_once('=')?;
        let param = param.trim();
        if param.is_empty() {
            return None;
        }
        let values = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if values.is_empty() {
            return None;
        }
        Some(Self::new(param, values))
    }
}

/// The operator's active selections and regions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    selections: Vec<Selection>,
    regions: Vec<Region>,
}

impl OperationContext {
    pub fn new(selections: Vec<Selection>, regions: Vec<Region>) -> ResourceResult<Self> {
        Ok(Self {
            selections: non_empty_dedup(selections, "credential selection")?,
            regions: non_empty_dedup(regions, "region")?,
        })
    }

    /// One selection, one region
    pub fn single(selection: Selection, region: Region) -> Self {
        Self {
            selections: vec![selection],
            regions: vec![region],
        }
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Switch identities (explicit user action)
    pub fn set_selections(&mut self, selections: Vec<Selection>) -> ResourceResult<()> {
        self.selections = non_empty_dedup(selections, "credential selection")?;
        Ok(())
    }

    /// Switch regions (explicit user action)
    pub fn set_regions(&mut self, regions: Vec<Region>) -> ResourceResult<()> {
        self.regions = non_empty_dedup(regions, "region")?;
        Ok(())
    }

    pub fn is_multi_identity(&self) -> bool {
        self.selections.len() > 1
    }

    /// Number of fan-out pairs
    pub fn fan_out(&self) -> usize {
        self.selections.len() * self.regions.len()
    }

    /// Cross product, selections outer, regions inner
    pub fn pairs(&self) -> Vec<(Selection, Region)> {
        self.selections
            .iter()
            .flat_map(|s| self.regions.iter().map(move |r| (s.clone(), r.clone())))
            .collect()
    }
}

fn non_empty_dedup<T: PartialEq>(items: Vec<T>, what: &str) -> ResourceResult<Vec<T>> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    if out.is_empty() {
        return Err(ResourceError::InvalidContext(format!(
            "at least one {} is required",
            what
        )));
    }
    Ok(out)
}

/// Per-call execution context
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    pub selection: Option<Selection>,
    pub region: Option<Region>,
    pub filters: Vec<ResourceFilter>,
    pub cancel: CancellationToken,
}

impl ExecContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_filters(mut self, filters: Vec<ResourceFilter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Derive a context for one fan-out pair. Filters are inherited.
    pub fn scoped(&self, selection: &Selection, region: &Region, cancel: CancellationToken) -> Self {
        Self {
            selection: Some(selection.clone()),
            region: Some(region.clone()),
            filters: self.filters.clone(),
            cancel,
        }
    }

    /// Selection override, or the default chain
    pub fn selection_or_default(&self) -> Selection {
        self.selection.clone().unwrap_or(Selection::DefaultChain)
    }

    /// Region override, required by regional DAOs
    pub fn require_region(&self) -> ResourceResult<&Region> {
        self.region
            .as_ref()
            .ok_or_else(|| ResourceError::transient("No region in execution context"))
    }

    /// First value of a filter
    pub fn filter_value(&self, param: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| f.param == param)
            .and_then(|f| f.values.first())
            .map(String::as_str)
    }
}
