//! Property-based tests for normalization, inference and assembly

use proptest::prelude::*;
use std::collections::HashSet;
use stackmap_core::{
    build_design, infer_connections, normalize, normalize_all, sanitize, ArchitectureDesign,
    Category, Component, Connection, ConnectionType, RawResource, ScanOrigin, SourceKind,
};

fn source_kind() -> impl Strategy<Value = SourceKind> {
    prop::sample::select(SourceKind::ALL.to_vec())
}

fn raw_resource() -> impl Strategy<Value = RawResource> {
    (
        source_kind(),
        prop::option::weighted(0.9, "[a-z0-9-]{0,8}"),
        prop::option::of("[a-z ]{0,6}"),
        prop::option::of(prop::sample::select(vec![
            "running", "available", "active", "stopped", "deleting",
        ])),
    )
        .prop_map(|(kind, id, name, state)| RawResource {
            kind,
            id,
            name,
            state: state.map(str::to_string),
            attributes: Default::default(),
        })
}

fn component() -> impl Strategy<Value = Component> {
    ("[a-e ]", prop::sample::select(Category::ALL.to_vec())).prop_map(|(id, category)| Component {
        identifier: id.clone(),
        display_name: id,
        category,
        description: String::new(),
    })
}

fn assert_well_formed(design: &ArchitectureDesign) -> Result<(), TestCaseError> {
    let ids: HashSet<&str> = design
        .components
        .iter()
        .map(|c| c.identifier.as_str())
        .collect();
    prop_assert_eq!(ids.len(), design.components.len());
    prop_assert!(ids.iter().all(|id| !id.trim().is_empty()));

    let mut triples = HashSet::new();
    for c in &design.connections {
        prop_assert!(ids.contains(c.source_identifier.as_str()));
        prop_assert!(ids.contains(c.target_identifier.as_str()));
        prop_assert_ne!(&c.source_identifier, &c.target_identifier);
        prop_assert!(triples.insert(c.key()));
    }
    Ok(())
}

proptest! {
    #[test]
    fn test_pipeline_output_is_well_formed(resources in prop::collection::vec(raw_resource(), 0..24)) {
        let out = build_design(&resources, &ScanOrigin::new("AWS", None));
        assert_well_formed(&out.design)?;
        prop_assert!(!out.design.notes.is_empty());
    }

    #[test]
    fn test_normalization_is_idempotent(raw in raw_resource()) {
        prop_assert_eq!(normalize(&raw), normalize(&raw));
    }

    #[test]
    fn test_normalized_identifiers_are_unique(resources in prop::collection::vec(raw_resource(), 0..24)) {
        let out = normalize_all(&resources);
        let ids: HashSet<&str> = out.components.iter().map(|c| c.identifier.as_str()).collect();
        prop_assert_eq!(ids.len(), out.components.len());
    }

    #[test]
    fn test_inference_is_deterministic_and_order_independent(
        mut components in prop::collection::vec(component(), 0..12)
    ) {
        let first = infer_connections(&components);
        prop_assert_eq!(&first, &infer_connections(&components));
        components.reverse();
        prop_assert_eq!(&first, &infer_connections(&components));
    }

    #[test]
    fn test_sanitize_restores_invariants(
        components in prop::collection::vec(component(), 0..8),
        edges in prop::collection::vec(("[a-f]", "[a-f]"), 0..16),
    ) {
        let connections = edges
            .into_iter()
            .map(|(s, t)| Connection {
                source_identifier: s,
                target_identifier: t,
                connection_type: ConnectionType::Http,
                description: String::new(),
            })
            .collect();
        let design = ArchitectureDesign {
            title: "drafted".into(),
            components,
            connections,
            ..Default::default()
        };
        let out = sanitize(design);
        assert_well_formed(&out.design)?;
    }
}
