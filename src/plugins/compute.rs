//! Compute Engine kinds: instances, subnetworks, zones

use super::rest::{id_from_name, keep_all, ListShape, RestDao, RestKind};
use super::GcpBackend;
use crate::context::{ExecContext, Region};
use crate::error::{ResourceError, ResourceResult};
use crate::gcp::client::{add_query_params, GcpClient};
use crate::resource::{CapabilityEntry, CapabilityRegistry, ColumnDef, ColumnRenderer, Renderer};
use serde_json::Value;

/// VM instances of the region's zones. Ids are `<zone>/<name>`.
pub static INSTANCES: RestKind = RestKind {
    domain: "compute",
    kind: "instances",
    list_url: |client, _ctx| {
        add_query_params(
            &client.compute_aggregated_url("instances"),
            &[("filter", zone_filter(&client.region))],
        )
    },
    item_url: instance_url,
    shape: ListShape::Aggregated,
    id_of: zonal_id,
    keep: keep_all,
    read_only: false,
};

pub static SUBNETWORKS: RestKind = RestKind {
    domain: "compute",
    kind: "subnetworks",
    list_url: |client, _ctx| Ok(client.compute_regional_url("subnetworks")),
    item_url: |client, _ctx, id| Ok(client.compute_regional_url(&format!("subnetworks/{}", id))),
    shape: ListShape::Items,
    id_of: id_from_name,
    keep: keep_all,
    read_only: false,
};

/// Zones of the region. Read-only.
pub static ZONES: RestKind = RestKind {
    domain: "compute",
    kind: "zones",
    list_url: |client, _ctx| {
        add_query_params(&client.compute_url("zones"), &[("filter", region_filter(&client.region))])
    },
    item_url: |client, _ctx, id| Ok(client.compute_url(&format!("zones/{}", id))),
    shape: ListShape::Items,
    id_of: id_from_name,
    keep: zone_in_region,
    read_only: true,
};

/// Server-side filter keeping instances whose zone is in `region`, so each
/// page is already narrowed to the pair
fn zone_filter(region: &Region) -> String {
    format!("zone eq .*/zones/{}-[a-z]", region)
}

/// Server-side filter keeping zones of `region`
fn region_filter(region: &Region) -> String {
    format!("region eq .*/regions/{}", region)
}

fn zonal_id(item: &Value) -> Option<String> {
    let name = item.get("name")?.as_str()?;
    let zone = item.get("zone_short")?.as_str()?;
    Some(format!("{}/{}", zone, name))
}

fn instance_url(client: &GcpClient, _ctx: &ExecContext, id: &str) -> ResourceResult<String> {
    let (zone, name) = id
        .split_once('/')
        .ok_or_else(|| ResourceError::NotFound(format!("{} (expected <zone>/<name>)", id)))?;
    Ok(client.compute_zonal_url(zone, &format!("instances/{}", name)))
}

fn zone_in_region(item: &Value, region: &Region) -> bool {
    item.get("name")
        .and_then(|v| v.as_str())
        .map(|zone| region.contains_zone(zone))
        .unwrap_or(false)
}

fn instances_renderer() -> Box<dyn Renderer> {
    Box::new(ColumnRenderer::new(
        "VM Instances",
        vec![
            ColumnDef::new("NAME", "name", 25),
            ColumnDef::new("ZONE", "zone_short", 15),
            ColumnDef::new("STATUS", "status", 12).colored("status"),
            ColumnDef::new("MACHINE TYPE", "machineType_short", 15),
            ColumnDef::new("INTERNAL IP", "networkInterfaces.0.networkIP", 15),
            ColumnDef::new("EXTERNAL IP", "networkInterfaces.0.accessConfigs.0.natIP", 18),
        ],
    ))
}

fn subnetworks_renderer() -> Box<dyn Renderer> {
    Box::new(ColumnRenderer::new(
        "Subnetworks",
        vec![
            ColumnDef::new("NAME", "name", 30),
            ColumnDef::new("NETWORK", "network_short", 25),
            ColumnDef::new("RANGE", "ipCidrRange", 20),
            ColumnDef::new("GATEWAY", "gatewayAddress", 15),
            ColumnDef::new("PRIVATE ACCESS", "privateIpGoogleAccess", 10),
        ],
    ))
}

fn zones_renderer() -> Box<dyn Renderer> {
    Box::new(ColumnRenderer::new(
        "Zones",
        vec![
            ColumnDef::new("NAME", "name", 30),
            ColumnDef::new("STATUS", "status", 20).colored("status"),
            ColumnDef::new("REGION", "region_short", 25),
            ColumnDef::new("DESCRIPTION", "description", 25),
        ],
    ))
}

pub fn register(registry: &mut CapabilityRegistry, backend: &GcpBackend) {
    registry.register(
        INSTANCES.resource_kind(),
        CapabilityEntry::new(
            "VM Instances",
            "Compute",
            RestDao::factory(backend.clone(), &INSTANCES),
            instances_renderer,
        ),
    );
    registry.register(
        SUBNETWORKS.resource_kind(),
        CapabilityEntry::new(
            "Subnetworks",
            "Networking",
            RestDao::factory(backend.clone(), &SUBNETWORKS),
            subnetworks_renderer,
        ),
    );
    registry.register(
        ZONES.resource_kind(),
        CapabilityEntry::new(
            "Zones",
            "Compute",
            RestDao::factory(backend.clone(), &ZONES),
            zones_renderer,
        ),
    );
}
