//! Cloud Storage kinds: buckets and objects
//!
//! Both are project-wide, so they are fetched once per selection under the
//! `global` location. Objects are listed inside one bucket, named by the
//! `bucket` filter.

use super::rest::{id_from_name, keep_all, ListShape, RestDao, RestKind};
use super::GcpBackend;
use crate::context::ExecContext;
use crate::error::{ResourceError, ResourceResult};
use crate::gcp::client::add_query_params;
use crate::resource::{
    CapabilityEntry, CapabilityRegistry, ColumnDef, ColumnRenderer, KindScope, Renderer,
};

/// Filter naming the bucket whose objects are listed
pub const BUCKET_FILTER: &str = "bucket";

pub static BUCKETS: RestKind = RestKind {
    domain: "storage",
    kind: "buckets",
    list_url: |client, _ctx| {
        add_query_params(&client.storage_url("b"), &[("project", client.project_id.clone())])
    },
    item_url: |client, _ctx, id| Ok(client.storage_bucket_url(id)),
    shape: ListShape::Items,
    id_of: id_from_name,
    keep: keep_all,
    read_only: false,
};

pub static OBJECTS: RestKind = RestKind {
    domain: "storage",
    kind: "objects",
    list_url: |client, ctx| Ok(client.storage_objects_url(bucket(ctx)?)),
    item_url: |client, ctx, id| Ok(client.storage_object_url(bucket(ctx)?, id)),
    shape: ListShape::Items,
    id_of: id_from_name,
    keep: keep_all,
    read_only: false,
};

fn bucket(ctx: &ExecContext) -> ResourceResult<&str> {
    ctx.filter_value(BUCKET_FILTER)
        .ok_or_else(|| ResourceError::FilterRequired {
            kind: OBJECTS.resource_kind().to_string(),
            field: BUCKET_FILTER.to_string(),
        })
}

fn buckets_renderer() -> Box<dyn Renderer> {
    Box::new(ColumnRenderer::new(
        "Buckets",
        vec![
            ColumnDef::new("NAME", "name", 35),
            ColumnDef::new("LOCATION", "location", 20),
            ColumnDef::new("STORAGE CLASS", "storageClass", 20),
            ColumnDef::new("CREATED", "timeCreated", 25),
        ],
    ))
}

fn objects_renderer() -> Box<dyn Renderer> {
    Box::new(ColumnRenderer::new(
        "Objects",
        vec![
            ColumnDef::new("NAME", "name", 45),
            ColumnDef::new("SIZE", "size", 15),
            ColumnDef::new("CONTENT TYPE", "contentType", 20),
            ColumnDef::new("UPDATED", "updated", 20),
        ],
    ))
}

pub fn register(registry: &mut CapabilityRegistry, backend: &GcpBackend) {
    registry.register(
        BUCKETS.resource_kind(),
        CapabilityEntry::new(
            "Buckets",
            "Storage",
            RestDao::factory(backend.clone(), &BUCKETS),
            buckets_renderer,
        )
        .with_scope(KindScope::Global),
    );
    registry.register(
        OBJECTS.resource_kind(),
        CapabilityEntry::new(
            "Objects",
            "Storage",
            RestDao::factory(backend.clone(), &OBJECTS),
            objects_renderer,
        )
        .with_scope(KindScope::Global)
        .requires_filter(BUCKET_FILTER),
    );
}
