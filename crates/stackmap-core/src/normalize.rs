//! Resource normalization: one raw inventory record in, one `Component` out.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

use crate::{Category, Component, CoreError};

/// Source-specific kind of a discovered resource.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    ComputeInstance,
    ManagedDatabase,
    Function,
    ObjectStore,
    LoadBalancer,
    MessageQueue,
    CacheCluster,
    ApiFrontDoor,
    ContainerService,
}

impl SourceKind {
    pub const ALL: [SourceKind; 9] = [
        SourceKind::ComputeInstance,
        SourceKind::ManagedDatabase,
        SourceKind::Function,
        SourceKind::ObjectStore,
        SourceKind::LoadBalancer,
        SourceKind::MessageQueue,
        SourceKind::CacheCluster,
        SourceKind::ApiFrontDoor,
        SourceKind::ContainerService,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ComputeInstance => "compute_instance",
            SourceKind::ManagedDatabase => "managed_database",
            SourceKind::Function => "function",
            SourceKind::ObjectStore => "object_store",
            SourceKind::LoadBalancer => "load_balancer",
            SourceKind::MessageQueue => "message_queue",
            SourceKind::CacheCluster => "cache_cluster",
            SourceKind::ApiFrontDoor => "api_front_door",
            SourceKind::ContainerService => "container_service",
        }
    }

    /// Human label used in design summaries.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::ComputeInstance => "compute instances",
            SourceKind::ManagedDatabase => "managed databases",
            SourceKind::Function => "functions",
            SourceKind::ObjectStore => "object stores",
            SourceKind::LoadBalancer => "load balancers",
            SourceKind::MessageQueue => "message queues",
            SourceKind::CacheCluster => "cache clusters",
            SourceKind::ApiFrontDoor => "API front doors",
            SourceKind::ContainerService => "container services",
        }
    }

    /// Fixed mapping from resource kind to design category.
    pub fn category(&self) -> Category {
        match self {
            SourceKind::ComputeInstance => Category::Service,
            SourceKind::ManagedDatabase => Category::Database,
            SourceKind::Function => Category::Function,
            SourceKind::ObjectStore => Category::Storage,
            SourceKind::LoadBalancer => Category::LoadBalancer,
            SourceKind::MessageQueue => Category::Queue,
            SourceKind::CacheCluster => Category::Cache,
            SourceKind::ApiFrontDoor => Category::Api,
            SourceKind::ContainerService => Category::Service,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered resource as handed over by an inventory collector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct RawResource {
    /// Resource kind, e.g. "compute_instance" or "message_queue"
    pub kind: SourceKind,
    /// Stable ID of the resource within its kind (instance ID, bucket name, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name, if the source has one (e.g. a Name tag)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Lifecycle state as reported by the source. Absent for stateless kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Kind-specific details such as engine, runtime or cluster
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl RawResource {
    pub fn new(kind: SourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: Some(id.into()),
            name: None,
            state: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

const ACTIVE_STATES: [&str; 3] = ["running", "available", "active"];

/// Whether a resource should take part in the design. Records without a state
/// are active.
pub fn is_active(raw: &RawResource) -> bool {
    match raw.state.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(state) => ACTIVE_STATES.iter().any(|s| s.eq_ignore_ascii_case(state)),
    }
}

/// Map one raw resource to a component. Pure.
pub fn normalize(raw: &RawResource) -> Result<Component, CoreError> {
    let id = raw
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| CoreError::MalformedResource {
            kind: raw.kind.to_string(),
            reason: match &raw.name {
                Some(name) => format!("'{}' has no stable id", name),
                None => "missing stable id".to_string(),
            },
        })?;

    let display_name = raw
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(id);

    Ok(Component {
        identifier: format!("{}:{}", raw.kind.as_str(), id),
        display_name: display_name.to_string(),
        category: raw.kind.category(),
        description: describe(raw),
    })
}

fn describe(raw: &RawResource) -> String {
    match raw.kind {
        SourceKind::ComputeInstance => format!(
            "Compute instance ({})",
            raw.attr("instance_type").unwrap_or("unknown")
        ),
        SourceKind::ManagedDatabase => format!(
            "{} database",
            raw.attr("engine").unwrap_or("unknown").to_uppercase()
        ),
        SourceKind::Function => {
            format!("Function ({})", raw.attr("runtime").unwrap_or("unknown"))
        }
        SourceKind::ObjectStore => "Object storage bucket".to_string(),
        SourceKind::LoadBalancer => format!(
            "{} load balancer ({})",
            raw.attr("type").unwrap_or("unknown").to_uppercase(),
            raw.attr("scheme").unwrap_or("unknown")
        ),
        SourceKind::MessageQueue => "Message queue".to_string(),
        SourceKind::CacheCluster => format!(
            "Cache cluster ({})",
            capitalize(raw.attr("engine").unwrap_or("unknown"))
        ),
        SourceKind::ApiFrontDoor => format!(
            "API front door - {}",
            raw.attr("description").unwrap_or("REST API")
        ),
        SourceKind::ContainerService => format!(
            "Container service (cluster: {})",
            raw.attr("cluster").unwrap_or("unknown")
        ),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Result of normalizing a whole scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Components sorted by identifier
    pub components: Vec<Component>,
    pub warnings: Vec<CoreError>,
    pub skipped_inactive: usize,
    /// Normalized components per resource kind
    pub counts: BTreeMap<SourceKind, usize>,
}

/// Filter, normalize and deduplicate a fully gathered set of raw resources.
pub fn normalize_all(resources: &[RawResource]) -> Normalized {
    let mut out = Normalized::default();
    let mut seen: HashSet<String> = HashSet::new();

    for raw in resources {
        if !is_active(raw) {
            debug!(
                kind = %raw.kind,
                id = raw.id.as_deref().unwrap_or("?"),
                state = raw.state.as_deref().unwrap_or(""),
                "skipping inactive resource"
            );
            out.skipped_inactive += 1;
            continue;
        }

        match normalize(raw) {
            Ok(component) => {
                if seen.insert(component.identifier.clone()) {
                    *out.counts.entry(raw.kind).or_default() += 1;
                    out.components.push(component);
                } else {
                    warn!(identifier = %component.identifier, "duplicate resource skipped");
                    out.warnings.push(CoreError::DuplicateComponent {
                        identifier: component.identifier,
                    });
                }
            }
            Err(e) => {
                warn!("skipping resource: {}", e);
                out.warnings.push(e);
            }
        }
    }

    out.components.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_combines_kind_and_id() {
        let raw = RawResource::new(SourceKind::ComputeInstance, "i-0abc")
            .with_name("web-1")
            .with_state("running")
            .with_attribute("instance_type", "t3.micro");
        let c = normalize(&raw).unwrap();
        assert_eq!(c.identifier, "compute_instance:i-0abc");
        assert_eq!(c.display_name, "web-1");
        assert_eq!(c.category, Category::Service);
        assert_eq!(c.description, "Compute instance (t3.micro)");
    }

    #[test]
    fn test_same_name_different_kinds_do_not_collide() {
        let a = normalize(&RawResource::new(SourceKind::ObjectStore, "orders")).unwrap();
        let b = normalize(&RawResource::new(SourceKind::MessageQueue, "orders")).unwrap();
        assert_ne!(a.identifier, b.identifier);
        assert_eq!(a.display_name, b.display_name);
    }

    #[test]
    fn test_category_table() {
        assert_eq!(SourceKind::ContainerService.category(), Category::Service);
        assert_eq!(SourceKind::ApiFrontDoor.category(), Category::Api);
        assert_eq!(SourceKind::CacheCluster.category(), Category::Cache);
        assert_eq!(SourceKind::ObjectStore.category(), Category::Storage);
    }

    #[test]
    fn test_missing_id_is_malformed() {
        let mut raw = RawResource::new(SourceKind::ManagedDatabase, "");
        raw.name = Some("orders-db".into());
        let err = normalize(&raw).unwrap_err();
        assert!(matches!(err, CoreError::MalformedResource { .. }));
        assert!(err.to_string().contains("orders-db"));
    }

    #[test]
    fn test_descriptions_use_defaults() {
        let db = normalize(&RawResource::new(SourceKind::ManagedDatabase, "db1")).unwrap();
        assert_eq!(db.description, "UNKNOWN database");
        let cache = normalize(
            &RawResource::new(SourceKind::CacheCluster, "c1").with_attribute("engine", "redis"),
        )
        .unwrap();
        assert_eq!(cache.description, "Cache cluster (Redis)");
        let api = normalize(&RawResource::new(SourceKind::ApiFrontDoor, "a1")).unwrap();
        assert_eq!(api.description, "API front door - REST API");
    }

    #[test]
    fn test_active_states() {
        let base = RawResource::new(SourceKind::ComputeInstance, "i-1");
        assert!(is_active(&base));
        assert!(is_active(&base.clone().with_state("Running")));
        assert!(is_active(&base.clone().with_state("available")));
        assert!(!is_active(&base.clone().with_state("stopped")));
        assert!(!is_active(&base.with_state("deleting")));
    }

    #[test]
    fn test_normalize_all_filters_and_sorts() {
        let resources = vec![
            RawResource::new(SourceKind::MessageQueue, "jobs"),
            RawResource::new(SourceKind::ComputeInstance, "i-2").with_state("stopped"),
            RawResource::new(SourceKind::ComputeInstance, "i-1").with_state("running"),
            RawResource::new(SourceKind::MessageQueue, "jobs"),
        ];
        let out = normalize_all(&resources);
        let ids: Vec<_> = out.components.iter().map(|c| c.identifier.as_str()).collect();
        assert_eq!(ids, vec!["compute_instance:i-1", "message_queue:jobs"]);
        assert_eq!(out.skipped_inactive, 1);
        assert_eq!(
            out.warnings,
            vec![CoreError::DuplicateComponent {
                identifier: "message_queue:jobs".into()
            }]
        );
    }
}
