//! Local kinds derived from the config file, never fetched remotely

use crate::config::Config;
use crate::context::{ExecContext, Selection, DEFAULT_SELECTION_ID, ENV_SELECTION_ID};
use crate::error::{ResourceError, ResourceResult};
use crate::resource::{
    CapabilityEntry, CapabilityRegistry, ColumnDef, ColumnRenderer, Dao, KindScope, Operation,
    Renderer, Resource, ResourceKind,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub fn identities_kind() -> ResourceKind {
    ResourceKind::new("local", "identities")
}

/// Credential selections the operator can switch between
pub struct IdentitiesDao {
    identities: Vec<Resource>,
}

impl IdentitiesDao {
    pub fn from_config(config: &Config) -> Self {
        let active: Vec<Selection> = config.selections.iter().map(|s| Selection::parse(s)).collect();
        let is_active = |selection: &Selection| active.contains(selection);

        let mut identities = vec![
            identity(
                DEFAULT_SELECTION_ID,
                "Application Default Credentials",
                None,
                is_active(&Selection::DefaultChain),
            ),
            identity(
                ENV_SELECTION_ID,
                "GOOGLE_APPLICATION_CREDENTIALS",
                None,
                is_active(&Selection::Environment),
            ),
        ];

        identities.extend(config.identities.iter().map(|(name, cfg)| {
            identity(
                name,
                &cfg.key_file.display().to_string(),
                cfg.project_id.as_deref(),
                is_active(&Selection::Named(name.clone())),
            )
        }));

        Self { identities }
    }
}

fn identity(id: &str, source: &str, project: Option<&str>, active: bool) -> Resource {
    Resource::new(identities_kind(), id, id).with_raw(json!({
        "name": id,
        "source": source,
        "project": project,
        "active": active,
    }))
}

#[async_trait]
impl Dao for IdentitiesDao {
    async fn list(&self, _ctx: &ExecContext) -> ResourceResult<Vec<Resource>> {
        Ok(self.identities.clone())
    }

    async fn get(&self, _ctx: &ExecContext, id: &str) -> ResourceResult<Resource> {
        self.identities
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(id.to_string()))
    }

    async fn delete(&self, _ctx: &ExecContext, _id: &str) -> ResourceResult<()> {
        Err(ResourceError::ReadOnly(identities_kind().to_string()))
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(operation, Operation::List | Operation::Get)
    }
}

fn identities_renderer() -> Box<dyn Renderer> {
    Box::new(ColumnRenderer::new(
        "Identities",
        vec![
            ColumnDef::new("NAME", "name", 20),
            ColumnDef::new("SOURCE", "source", 45),
            ColumnDef::new("PROJECT", "project", 25),
            ColumnDef::new("ACTIVE", "active", 10),
        ],
    ))
}

pub fn register(registry: &mut CapabilityRegistry, config: &Config) {
    let dao: Arc<dyn Dao> = Arc::new(IdentitiesDao::from_config(config));

    registry.register(
        identities_kind(),
        CapabilityEntry::new(
            "Identities",
            "Local",
            move |_ctx: ExecContext| {
                let dao = dao.clone();
                async move { Ok::<Arc<dyn Dao>, ResourceError>(dao) }
            },
            identities_renderer,
        )
        .with_scope(KindScope::Local),
    );
}
