//! Property-based tests using proptest
//!
//! These tests check scope wrapping, qualified ids and filter parsing
//! against randomized inputs.

use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use tfleet::context::{Region, ResourceFilter, Selection};
use tfleet::resource::{
    resource_region, unwrap_resource, wrap_with_identity, wrap_with_region, Resource, ResourceItem,
    ResourceKind,
};

/// Generate an arbitrary instance-like resource
fn arb_resource() -> impl Strategy<Value = Resource> {
    (
        "[a-z][a-z0-9-]{0,30}", // id
        prop_oneof!["RUNNING", "STOPPED", "TERMINATED", "STAGING"],
        prop::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..4),
    )
        .prop_map(|(id, status, labels)| {
            let mut resource = Resource::new(ResourceKind::new("compute", "instances"), id.as_str(), id.as_str())
                .with_raw(json!({"name": id, "status": status, "labels": labels.clone()}));
            resource.tags = labels;
            resource
        })
}

fn arb_region() -> impl Strategy<Value = Region> {
    "[a-z]{2,6}-[a-z]{2,8}[0-9]".prop_map(Region::new)
}

fn arb_selection() -> impl Strategy<Value = Selection> {
    prop_oneof![
        Just(Selection::DefaultChain),
        Just(Selection::Environment),
        "[a-z]{3,10}".prop_map(|s| Selection::parse(&s)),
    ]
}

proptest! {
    /// Wrapping then unwrapping once recovers the exact original
    #[test]
    fn wrap_unwrap_is_identity(
        resource in arb_resource(),
        region in arb_region(),
        selection in arb_selection(),
        account in proptest::option::of("[a-z0-9-]{6,20}"),
        by_identity in any::<bool>(),
    ) {
        let plain = ResourceItem::Plain(resource.clone());
        let wrapped = if by_identity {
            wrap_with_identity(plain.clone(), region.clone(), selection, account)
        } else {
            wrap_with_region(plain.clone(), region.clone())
        };

        prop_assert_eq!(wrapped.name(), resource.name.as_str());
        prop_assert_eq!(wrapped.raw(), &resource.raw);
        prop_assert_eq!(wrapped.tags(), &resource.tags);
        prop_assert_eq!(resource_region(&wrapped), Some(&region));
        prop_assert_eq!(unwrap_resource(wrapped), plain);
    }

    /// N wraps need N unwraps
    #[test]
    fn wrap_depth_matches_unwrap_count(
        resource in arb_resource(),
        regions in prop::collection::vec(arb_region(), 1..5),
    ) {
        let plain = ResourceItem::Plain(resource.clone());
        let mut item = plain.clone();
        for region in &regions {
            item = wrap_with_region(item, region.clone());
        }

        prop_assert_eq!(resource_region(&item), regions.last());

        for _ in 1..regions.len() {
            item = unwrap_resource(item);
            prop_assert!(item.is_scoped());
        }
        item = unwrap_resource(item);
        prop_assert_eq!(item.clone(), plain);
        prop_assert_eq!(item.into_resource(), resource);
    }

    /// The same inner id fetched from distinct pairs never collides
    #[test]
    fn qualified_ids_unique_across_pairs(
        resource in arb_resource(),
        selections in prop::collection::hash_set(arb_selection(), 1..4),
        regions in prop::collection::hash_set(arb_region(), 1..4),
    ) {
        let mut seen = HashSet::new();
        for selection in &selections {
            for region in &regions {
                let item = wrap_with_identity(
                    resource.clone().into(),
                    region.clone(),
                    selection.clone(),
                    None,
                );
                prop_assert!(item.id().ends_with(&resource.id));
                prop_assert!(seen.insert(item.id()), "duplicate id {}", item.id());
            }
        }
        prop_assert_eq!(seen.len(), selections.len() * regions.len());
    }

    /// Filter parsing keeps every non-empty value in order
    #[test]
    fn filter_parse_keeps_values(
        key in "[a-z][a-z_]{0,10}",
        values in prop::collection::vec("[a-z0-9-]{1,12}", 1..5),
    ) {
        let raw = format!("{}={}", key, values.join(","));
        let filter = ResourceFilter::parse(&raw);
        prop_assert_eq!(filter, Some(ResourceFilter::new(&key, values)));
    }

    /// Input without '=' never parses as a filter
    #[test]
    fn filter_parse_rejects_missing_separator(s in "[^=]{0,40}") {
        prop_assert!(ResourceFilter::parse(&s).is_none());
    }
}
