//! Capability Registry - map resource kinds to DAO and renderer factories
//!
//! The registry is filled once at startup (built-in plugins first, custom
//! overrides after) and then frozen behind an `Arc`. Lookups take `&self`
//! only, so concurrent fetch tasks read it without locking. Registration must
//! finish before the first fetch starts.

use super::dao::{Dao, DaoFactory};
use super::model::ResourceKind;
use super::render::Renderer;
use crate::context::ExecContext;
use crate::error::{ResourceError, ResourceResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds a renderer for a kind
pub type RendererFactory = Arc<dyn Fn() -> Box<dyn Renderer> + Send + Sync>;

/// Which registration wins when two claim the same kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    BuiltIn,
    Custom,
}

/// How a kind relates to regions and identities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindScope {
    /// Listed per region
    #[default]
    Regional,
    /// Project-wide; fetched once per selection under the `global` region
    Global,
    /// Derived locally; never fanned out or wrapped
    Local,
}

/// Factories and metadata for one resource kind
#[derive(Clone)]
pub struct CapabilityEntry {
    pub display_name: String,
    pub category: String,
    pub scope: KindScope,
    /// Filters that must be present in the execution context
    pub required_filters: Vec<String>,
    dao_factory: Arc<dyn DaoFactory>,
    renderer_factory: RendererFactory,
}

impl CapabilityEntry {
    pub fn new<D, R>(display_name: &str, category: &str, dao_factory: D, renderer_factory: R) -> Self
    where
        D: DaoFactory + 'static,
        R: Fn() -> Box<dyn Renderer> + Send + Sync + 'static,
    {
        Self {
            display_name: display_name.to_string(),
            category: category.to_string(),
            scope: KindScope::Regional,
            required_filters: Vec::new(),
            dao_factory: Arc::new(dao_factory),
            renderer_factory: Arc::new(renderer_factory),
        }
    }

    pub fn with_scope(mut self, scope: KindScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn requires_filter(mut self, field: &str) -> Self {
        self.required_filters.push(field.to_string());
        self
    }

    /// First required filter missing from `ctx`
    pub fn missing_filter(&self, ctx: &ExecContext) -> Option<&str> {
        self.required_filters
            .iter()
            .find(|f| ctx.filter_value(f).is_none())
            .map(String::as_str)
    }
}

impl fmt::Debug for CapabilityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityEntry")
            .field("display_name", &self.display_name)
            .field("category", &self.category)
            .field("scope", &self.scope)
            .field("required_filters", &self.required_filters)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct Registration {
    entry: CapabilityEntry,
    precedence: Precedence,
}

/// Lookup table from `(domain, kind)` to capability entries
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    domains: BTreeMap<String, BTreeMap<String, Registration>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built-in kind. A later built-in registration replaces an
    /// earlier one; it never replaces a custom one.
    pub fn register(&mut self, kind: ResourceKind, entry: CapabilityEntry) {
        self.register_with(kind, entry, Precedence::BuiltIn);
    }

    /// Register a custom plugin; it wins over built-ins whatever the order.
    pub fn register_override(&mut self, kind: ResourceKind, entry: CapabilityEntry) {
        self.register_with(kind, entry, Precedence::Custom);
    }

    pub fn register_with(&mut self, kind: ResourceKind, entry: CapabilityEntry, precedence: Precedence) {
        let kinds = self.domains.entry(kind.domain.clone()).or_default();

        if let Some(existing) = kinds.get(&kind.kind) {
            if existing.precedence > precedence {
                tracing::debug!(
                    "Keeping {:?} registration for {}, ignoring {:?}",
                    existing.precedence,
                    kind,
                    precedence
                );
                return;
            }
            tracing::debug!("Overriding registration for {}", kind);
        }

        kinds.insert(kind.kind, Registration { entry, precedence });
    }

    /// Look up the entry for a kind
    pub fn entry(&self, kind: &ResourceKind) -> ResourceResult<&CapabilityEntry> {
        let kinds = self
            .domains
            .get(&kind.domain)
            .ok_or_else(|| ResourceError::DomainNotFound(kind.domain.clone()))?;

        kinds
            .get(&kind.kind)
            .map(|r| &r.entry)
            .ok_or_else(|| ResourceError::KindNotFound {
                domain: kind.domain.clone(),
                kind: kind.kind.clone(),
            })
    }

    /// Build the DAO for `kind` under `ctx` (which may carry overrides)
    pub async fn get_dao(&self, ctx: &ExecContext, kind: &ResourceKind) -> ResourceResult<Arc<dyn Dao>> {
        let entry = self.entry(kind)?;
        entry.dao_factory.create(ctx).await
    }

    pub fn get_renderer(&self, kind: &ResourceKind) -> ResourceResult<Box<dyn Renderer>> {
        let entry = self.entry(kind)?;
        Ok((entry.renderer_factory)())
    }

    /// Registered domains, sorted
    pub fn list_services(&self) -> Vec<&str> {
        self.domains.keys().map(String::as_str).collect()
    }

    /// Kinds of one domain, sorted
    pub fn list_resources(&self, domain: &str) -> Vec<&str> {
        self.domains
            .get(domain)
            .map(|kinds| kinds.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every registered kind (for autocomplete)
    pub fn all_kinds(&self) -> Vec<ResourceKind> {
        self.domains
            .iter()
            .flat_map(|(domain, kinds)| kinds.keys().map(move |k| ResourceKind::new(domain, k)))
            .collect()
    }

    /// Kinds grouped by category
    pub fn list_services_by_category(&self) -> BTreeMap<String, Vec<ResourceKind>> {
        let mut out: BTreeMap<String, Vec<ResourceKind>> = BTreeMap::new();
        for (domain, kinds) in &self.domains {
            for (kind, registration) in kinds {
                out.entry(registration.entry.category.clone())
                    .or_default()
                    .push(ResourceKind::new(domain, kind));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::render::{ColumnDef, ColumnRenderer};
    use crate::resource::Resource;
    use async_trait::async_trait;

    struct NamedDao(&'static str);

    #[async_trait]
    impl Dao for NamedDao {
        async fn list(&self, _ctx: &ExecContext) -> ResourceResult<Vec<Resource>> {
            Ok(vec![Resource::new(ResourceKind::new("test", "things"), self.0, self.0)])
        }

        async fn get(&self, _ctx: &ExecContext, id: &str) -> ResourceResult<Resource> {
            Err(ResourceError::NotFound(id.to_string()))
        }

        async fn delete(&self, _ctx: &ExecContext, _id: &str) -> ResourceResult<()> {
            Ok(())
        }
    }

    fn entry(tag: &'static str, category: &str) -> CapabilityEntry {
        CapabilityEntry::new(
            tag,
            category,
            move |_ctx: ExecContext| async move {
                Ok::<Arc<dyn Dao>, ResourceError>(Arc::new(NamedDao(tag)))
            },
            move || Box::new(ColumnRenderer::new(tag, vec![ColumnDef::new("NAME", "name", 100)])) as Box<dyn Renderer>,
        )
    }

    async fn list_tag(registry: &CapabilityRegistry, kind: &ResourceKind) -> String {
        let dao = registry.get_dao(&ExecContext::new(), kind).await.unwrap();
        dao.list(&ExecContext::new()).await.unwrap()[0].id.clone()
    }

    #[tokio::test]
    async fn test_later_registration_overrides() {
        let mut registry = CapabilityRegistry::new();
        let kind = ResourceKind::new("compute", "instances");
        registry.register(kind.clone(), entry("first", "Compute"));
        registry.register(kind.clone(), entry("second", "Compute"));

        assert_eq!(list_tag(&registry, &kind).await, "second");
        assert_eq!(registry.get_renderer(&kind).unwrap().title(), "second");
    }

    #[tokio::test]
    async fn test_custom_beats_builtin_in_any_order() {
        let kind = ResourceKind::new("compute", "instances");

        let mut before = CapabilityRegistry::new();
        before.register_override(kind.clone(), entry("custom", "Compute"));
        before.register(kind.clone(), entry("builtin", "Compute"));
        assert_eq!(list_tag(&before, &kind).await, "custom");

        let mut after = CapabilityRegistry::new();
        after.register(kind.clone(), entry("builtin", "Compute"));
        after.register_override(kind.clone(), entry("custom", "Compute"));
        assert_eq!(list_tag(&after, &kind).await, "custom");
    }

    #[tokio::test]
    async fn test_missing_domain_and_kind() {
        let mut registry = CapabilityRegistry::new();
        registry.register(ResourceKind::new("compute", "instances"), entry("vm", "Compute"));

        let err = registry
            .get_dao(&ExecContext::new(), &ResourceKind::new("sql", "instances"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ResourceError::DomainNotFound(d) if d == "sql"));

        let err = registry
            .get_dao(&ExecContext::new(), &ResourceKind::new("compute", "disks"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ResourceError::KindNotFound { .. }));
        assert!(registry.get_renderer(&ResourceKind::new("compute", "disks")).is_err());
    }

    #[tokio::test]
    async fn test_factory_error_is_returned() {
        let mut registry = CapabilityRegistry::new();
        let kind = ResourceKind::new("storage", "buckets");
        registry.register(
            kind.clone(),
            CapabilityEntry::new(
                "Buckets",
                "Storage",
                |_ctx: ExecContext| async move {
                    Err::<Arc<dyn Dao>, _>(ResourceError::Credential("no key".into()))
                },
                || Box::new(ColumnRenderer::new("Buckets", vec![])) as Box<dyn Renderer>,
            ),
        );

        let err = registry.get_dao(&ExecContext::new(), &kind).await.err().unwrap();
        assert!(matches!(err, ResourceError::Credential(_)));
    }

    #[test]
    fn test_enumeration_is_sorted_and_grouped() {
        let mut registry = CapabilityRegistry::new();
        registry.register(ResourceKind::new("storage", "buckets"), entry("b", "Storage"));
        registry.register(ResourceKind::new("compute", "subnetworks"), entry("s", "Networking"));
        registry.register(ResourceKind::new("compute", "instances"), entry("i", "Compute"));

        assert_eq!(registry.list_services(), vec!["compute", "storage"]);
        assert_eq!(registry.list_resources("compute"), vec!["instances", "subnetworks"]);
        assert!(registry.list_resources("nope").is_empty());
        assert_eq!(registry.all_kinds().len(), 3);

        let by_category = registry.list_services_by_category();
        assert_eq!(
            by_category.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["Compute", "Networking", "Storage"]
        );
        assert_eq!(by_category["Networking"], vec![ResourceKind::new("compute", "subnetworks")]);
    }

    #[test]
    fn test_missing_filter() {
        let e = entry("o", "Storage").requires_filter("bucket");
        assert_eq!(e.missing_filter(&ExecContext::new()), Some("bucket"));

        let ctx = ExecContext::new().with_filters(vec![crate::context::ResourceFilter::new(
            "bucket",
            vec!["logs".into()],
        )]);
        assert_eq!(e.missing_filter(&ctx), None);
    }
}
