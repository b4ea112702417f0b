//! Design assembly: turns components, connections and notes into an
//! `ArchitectureDesign` that always satisfies the design invariants.

use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

use crate::normalize::{normalize_all, RawResource, SourceKind};
use crate::rules::infer;
use crate::{ArchitectureDesign, Component, Connection, CoreError};

/// An assembled design plus every anomaly dropped along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub design: ArchitectureDesign,
    pub warnings: Vec<CoreError>,
}

/// Build a design, dropping anything that would break its invariants:
/// duplicate component identifiers (first one wins), self-loops, repeated
/// `(source, target, type)` triples and connections to unknown components.
/// Components end up sorted by identifier; connection order is preserved.
pub fn assemble(
    components: Vec<Component>,
    connections: Vec<Connection>,
    notes: Vec<String>,
    title: &str,
    summary: &str,
) -> Assembly {
    let mut warnings = Vec::new();

    let mut by_id: BTreeMap<String, Component> = BTreeMap::new();
    for component in components {
        if by_id.contains_key(&component.identifier) {
            warn!(identifier = %component.identifier, "duplicate component dropped");
            warnings.push(CoreError::DuplicateComponent {
                identifier: component.identifier,
            });
            continue;
        }
        by_id.insert(component.identifier.clone(), component);
    }

    let mut kept: Vec<Connection> = Vec::with_capacity(connections.len());
    let mut seen = HashSet::new();
    for conn in connections {
        let missing = [&conn.source_identifier, &conn.target_identifier]
            .into_iter()
            .find(|id| !by_id.contains_key(id.as_str()))
            .cloned();
        if let Some(missing) = missing {
            let e = CoreError::DanglingConnection {
                source_id: conn.source_identifier,
                target_id: conn.target_identifier,
                missing,
            };
            warn!("{}", e);
            warnings.push(e);
            continue;
        }
        if conn.source_identifier == conn.target_identifier {
            let e = CoreError::InvalidConnection {
                source_id: conn.source_identifier,
                target_id: conn.target_identifier,
                reason: "self-loop".to_string(),
            };
            warn!("{}", e);
            warnings.push(e);
            continue;
        }
        let key = (
            conn.source_identifier.clone(),
            conn.target_identifier.clone(),
            conn.connection_type.clone(),
        );
        if !seen.insert(key) {
            let e = CoreError::InvalidConnection {
                source_id: conn.source_identifier,
                target_id: conn.target_identifier,
                reason: format!("duplicate {} connection", conn.connection_type),
            };
            warn!("{}", e);
            warnings.push(e);
            continue;
        }
        kept.push(conn);
    }

    Assembly {
        design: ArchitectureDesign {
            title: title.to_string(),
            summary: summary.to_string(),
            components: by_id.into_values().collect(),
            connections: kept,
            notes,
        },
        warnings,
    }
}

/// Re-validate a design that was produced elsewhere (e.g. drafted from a text
/// description). Components without an identifier are dropped; blank display
/// names fall back to the identifier.
pub fn sanitize(design: ArchitectureDesign) -> Assembly {
    let ArchitectureDesign {
        title,
        summary,
        components,
        connections,
        notes,
    } = design;

    let mut rejected = Vec::new();
    let mut kept = Vec::with_capacity(components.len());
    for mut c in components {
        if c.identifier.trim().is_empty() {
            let e = CoreError::MalformedResource {
                kind: c.category.to_string(),
                reason: if c.display_name.trim().is_empty() {
                    "component has no identifier".to_string()
                } else {
                    format!("'{}' has no identifier", c.display_name)
                },
            };
            warn!("{}", e);
            rejected.push(e);
            continue;
        }
        if c.display_name.trim().is_empty() {
            c.display_name = c.identifier.clone();
        }
        kept.push(c);
    }

    let mut assembly = assemble(kept, connections, notes, &title, &summary);
    prepend_warnings(&mut assembly, rejected);
    assembly
}

/// Where a scanned inventory came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOrigin {
    pub provider: String,
    pub region: Option<String>,
}

impl ScanOrigin {
    pub fn new(provider: impl Into<String>, region: Option<String>) -> Self {
        Self {
            provider: provider.into(),
            region,
        }
    }

    fn region_label(&self) -> &str {
        self.region.as_deref().unwrap_or("default region")
    }
}

const EMPTY_SCAN_NOTE: &str =
    "No active resources were found in the inventory, so the design has no components or connections.";

/// The deterministic inventory pipeline: normalize, infer, assemble.
pub fn build_design(resources: &[RawResource], origin: &ScanOrigin) -> Assembly {
    let normalized = normalize_all(resources);
    let title = format!("{} Infrastructure - {}", origin.provider, origin.region_label());

    if normalized.components.is_empty() {
        info!(
            provider = %origin.provider,
            records = resources.len(),
            "no active resources to map"
        );
        let mut assembly = assemble(
            Vec::new(),
            Vec::new(),
            vec![EMPTY_SCAN_NOTE.to_string()],
            &title,
            &format!("No active {} resources discovered", origin.provider),
        );
        prepend_warnings(&mut assembly, normalized.warnings);
        return assembly;
    }

    let inference = infer(&normalized.components);

    let mut notes = vec![
        format!("Scanned region: {}", origin.region_label()),
        format!("Total components discovered: {}", normalized.components.len()),
        "Connections are inferred from common architecture patterns and should be reviewed"
            .to_string(),
    ];
    if normalized.skipped_inactive > 0 {
        notes.push(format!(
            "{} inactive resources were left out",
            normalized.skipped_inactive
        ));
    }
    notes.extend(inference.notes);

    let summary = format!(
        "Automatically discovered {} architecture containing: {}",
        origin.provider,
        kind_summary(&normalized.counts)
    );

    let mut assembly = assemble(
        normalized.components,
        inference.connections,
        notes,
        &title,
        &summary,
    );
    prepend_warnings(&mut assembly, normalized.warnings);

    info!(
        components = assembly.design.components.len(),
        connections = assembly.design.connections.len(),
        warnings = assembly.warnings.len(),
        "design assembled"
    );
    assembly
}

fn prepend_warnings(assembly: &mut Assembly, mut earlier: Vec<CoreError>) {
    earlier.append(&mut assembly.warnings);
    assembly.warnings = earlier;
}

fn kind_summary(counts: &BTreeMap<SourceKind, usize>) -> String {
    counts
        .iter()
        .map(|(kind, n)| format!("{} {}", n, kind.label()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, ConnectionType};

    fn comp(id: &str, category: Category) -> Component {
        Component {
            identifier: id.to_string(),
            display_name: id.to_string(),
            category,
            description: String::new(),
        }
    }

    fn conn(source: &str, target: &str, ty: ConnectionType) -> Connection {
        Connection {
            source_identifier: source.to_string(),
            target_identifier: target.to_string(),
            connection_type: ty,
            description: String::new(),
        }
    }

    #[test]
    fn test_dangling_connection_is_dropped() {
        let out = assemble(
            vec![comp("a", Category::Service)],
            vec![conn("a", "ghost", ConnectionType::Http)],
            vec![],
            "t",
            "s",
        );
        assert!(out.design.connections.is_empty());
        assert_eq!(
            out.warnings,
            vec![CoreError::DanglingConnection {
                source_id: "a".into(),
                target_id: "ghost".into(),
                missing: "ghost".into(),
            }]
        );
    }

    #[test]
    fn test_self_loop_and_duplicate_dropped() {
        let out = assemble(
            vec![comp("a", Category::Service), comp("b", Category::Cache)],
            vec![
                conn("a", "a", ConnectionType::Internal),
                conn("a", "b", ConnectionType::CacheProtocol),
                conn("a", "b", ConnectionType::CacheProtocol),
                conn("a", "b", ConnectionType::Http),
            ],
            vec![],
            "t",
            "s",
        );
        assert_eq!(out.design.connections.len(), 2);
        assert_eq!(out.warnings.len(), 2);
    }

    #[test]
    fn test_duplicate_component_first_wins() {
        let mut second = comp("a", Category::Database);
        second.description = "second".into();
        let out = assemble(
            vec![comp("a", Category::Service), second],
            vec![],
            vec![],
            "t",
            "s",
        );
        assert_eq!(out.design.components.len(), 1);
        assert_eq!(out.design.components[0].category, Category::Service);
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let build = || {
            assemble(
                vec![comp("b", Category::Service), comp("a", Category::LoadBalancer)],
                vec![conn("a", "b", ConnectionType::Http)],
                vec!["n".into()],
                "t",
                "s",
            )
        };
        let first = serde_json::to_string(&build().design).unwrap();
        let second = serde_json::to_string(&build().design).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sanitize_fills_display_names() {
        let design = ArchitectureDesign {
            title: "t".into(),
            components: vec![Component {
                identifier: "Orders".into(),
                display_name: " ".into(),
                category: Category::Service,
                description: String::new(),
            }],
            ..Default::default()
        };
        let out = sanitize(design);
        assert_eq!(out.design.components[0].display_name, "Orders");
    }

    #[test]
    fn test_sanitize_drops_blank_identifiers() {
        let design = ArchitectureDesign {
            title: "t".into(),
            components: vec![
                comp(" ", Category::Cache),
                comp("svc", Category::Service),
            ],
            connections: vec![conn("svc", " ", ConnectionType::CacheProtocol)],
            ..Default::default()
        };
        let out = sanitize(design);
        assert_eq!(out.design.components.len(), 1);
        assert_eq!(out.design.components[0].identifier, "svc");
        assert!(out.design.connections.is_empty());
        assert!(matches!(
            out.warnings[0],
            CoreError::MalformedResource { ref kind, .. } if kind == "cache"
        ));
        assert!(matches!(
            out.warnings[1],
            CoreError::DanglingConnection { .. }
        ));
    }

    #[test]
    fn test_build_design_title_summary_and_notes() {
        let resources = vec![
            RawResource::new(SourceKind::LoadBalancer, "web-lb"),
            RawResource::new(SourceKind::ComputeInstance, "i-1").with_state("running"),
            RawResource::new(SourceKind::ComputeInstance, "i-2").with_state("stopped"),
        ];
        let out = build_design(
            &resources,
            &ScanOrigin::new("AWS", Some("eu-west-1".into())),
        );
        let d = &out.design;
        assert_eq!(d.title, "AWS Infrastructure - eu-west-1");
        assert_eq!(
            d.summary,
            "Automatically discovered AWS architecture containing: 1 compute instances, 1 load balancers"
        );
        assert_eq!(d.notes[0], "Scanned region: eu-west-1");
        assert!(d.notes.iter().any(|n| n.contains("1 inactive")));
        assert_eq!(d.connections.len(), 1);
    }

    #[test]
    fn test_build_design_all_inactive_is_empty() {
        let resources =
            vec![RawResource::new(SourceKind::ComputeInstance, "i-1").with_state("terminated")];
        let out = build_design(&resources, &ScanOrigin::new("AWS", None));
        assert!(out.design.components.is_empty());
        assert_eq!(out.design.notes, vec![EMPTY_SCAN_NOTE.to_string()]);
    }
}
