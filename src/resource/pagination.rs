//! Pagination continuation state
//!
//! Each fan-out pair paginates independently. [`PageTokenMap`] keeps one
//! cursor per pair; a pair that reports no further pages is dropped and never
//! queried again by "next page".

use super::model::Resource;
use crate::context::{OperationContext, Region, Selection};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque continuation cursor for one pair. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken(String);

impl PageToken {
    /// `None` for empty or missing cursors
    pub fn new(token: Option<String>) -> Option<Self> {
        token.filter(|t| !t.is_empty()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which pair a token belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageKey {
    /// Single selection, single region
    Single,
    /// Single selection, several regions
    Region(Region),
    /// Several selections
    Pair { selection: String, region: Region },
}

impl PageKey {
    /// Key for a fan-out pair under the shape of `ctx`
    pub fn for_pair(ctx: &OperationContext, selection: &Selection, region: &Region) -> Self {
        if ctx.is_multi_identity() {
            Self::Pair {
                selection: selection.id().to_string(),
                region: region.clone(),
            }
        } else {
            Self::Region(region.clone())
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("*"),
            Self::Region(region) => write!(f, "{}", region),
            Self::Pair { selection, region } => write!(f, "{}/{}", selection, region),
        }
    }
}

/// Continuation cursors keyed by pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTokenMap {
    tokens: BTreeMap<PageKey, PageToken>,
}

impl PageTokenMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest cursor for `key`. `None` means the pair is exhausted.
    pub fn update(&mut self, key: PageKey, token: Option<PageToken>) {
        match token {
            Some(token) => {
                self.tokens.insert(key, token);
            }
            None => {
                self.tokens.remove(&key);
            }
        }
    }

    pub fn get(&self, key: &PageKey) -> Option<&PageToken> {
        self.tokens.get(key)
    }

    pub fn contains(&self, key: &PageKey) -> bool {
        self.tokens.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PageKey> {
        self.tokens.keys()
    }
}

/// One page from a cursor-paginated listing
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub resources: Vec<Resource>,
    pub next_token: Option<PageToken>,
}

impl Page {
    pub fn last(resources: Vec<Resource>) -> Self {
        Self {
            resources,
            next_token: None,
        }
    }
}
