//! Connection inference rules. The table below is the single source of truth
//! for how a scanned inventory turns into edges.
//!
//! Rules run in table order over the whole component set. Inside a rule,
//! sources and targets are visited in identifier order, so the resulting
//! sequence depends only on which components exist, never on discovery order.
//! The engine prefers recall: every plausible pairing is emitted and a human
//! reviewing the diagram discards what does not apply.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::{Category, Component, Connection, ConnectionType};

/// How a rule pairs sources with targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    /// Every source connects to every target.
    All,
    /// Sources connect only when exactly one target exists. Several targets
    /// are ambiguous and produce a note instead of edges.
    SoleTarget,
}

#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub source: Category,
    pub target: Category,
    pub connection_type: ConnectionType,
    pub description: &'static str,
    pub fan_out: FanOut,
}

pub type CategoryCounts = BTreeMap<Category, usize>;

impl Rule {
    fn count(counts: &CategoryCounts, category: Category) -> usize {
        counts.get(&category).copied().unwrap_or(0)
    }

    /// Predicate over the category multiset.
    pub fn applies(&self, counts: &CategoryCounts) -> bool {
        let sources = Self::count(counts, self.source);
        let targets = Self::count(counts, self.target);
        match self.fan_out {
            FanOut::All => sources > 0 && targets > 0,
            FanOut::SoleTarget => sources > 0 && targets == 1,
        }
    }

    /// Note explaining why a sole-target rule produced nothing.
    pub fn ambiguity(&self, counts: &CategoryCounts) -> Option<String> {
        let sources = Self::count(counts, self.source);
        let targets = Self::count(counts, self.target);
        if self.fan_out == FanOut::SoleTarget && sources > 0 && targets > 1 {
            Some(format!(
                "{} {} components found; {}-to-{} connections were not inferred and need manual review",
                targets, self.target, self.source, self.target
            ))
        } else {
            None
        }
    }

    /// Production function: the edges this rule contributes. Callers check
    /// `applies` first.
    pub fn produce(&self, by_category: &BTreeMap<Category, Vec<&Component>>) -> Vec<Connection> {
        let empty = Vec::new();
        let sources = by_category.get(&self.source).unwrap_or(&empty);
        let targets = by_category.get(&self.target).unwrap_or(&empty);

        let mut out = Vec::with_capacity(sources.len() * targets.len());
        for source in sources {
            for target in targets {
                out.push(Connection {
                    source_identifier: source.identifier.clone(),
                    target_identifier: target.identifier.clone(),
                    connection_type: self.connection_type.clone(),
                    description: self.description.to_string(),
                });
            }
        }
        out
    }
}

/// The rule table, in priority order.
pub static RULES: &[Rule] = &[
    Rule {
        name: "load_balancer_to_service",
        source: Category::LoadBalancer,
        target: Category::Service,
        connection_type: ConnectionType::Http,
        description: "routes traffic to compute tier",
        fan_out: FanOut::All,
    },
    Rule {
        name: "service_to_database",
        source: Category::Service,
        target: Category::Database,
        connection_type: ConnectionType::Sql,
        description: "reads and writes application data",
        fan_out: FanOut::SoleTarget,
    },
    Rule {
        name: "service_to_cache",
        source: Category::Service,
        target: Category::Cache,
        connection_type: ConnectionType::CacheProtocol,
        description: "caches hot data",
        fan_out: FanOut::All,
    },
    Rule {
        name: "service_to_queue",
        source: Category::Service,
        target: Category::Queue,
        connection_type: ConnectionType::Async,
        description: "publishes messages to queue",
        fan_out: FanOut::All,
    },
    Rule {
        name: "api_to_function",
        source: Category::Api,
        target: Category::Function,
        connection_type: ConnectionType::Http,
        description: "gateway invokes function",
        fan_out: FanOut::All,
    },
    Rule {
        name: "service_to_storage",
        source: Category::Service,
        target: Category::Storage,
        connection_type: ConnectionType::Internal,
        description: "stores and retrieves objects",
        fan_out: FanOut::All,
    },
];

/// Full engine output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inference {
    pub connections: Vec<Connection>,
    pub notes: Vec<String>,
}

/// Run every rule over the component set.
pub fn infer(components: &[Component]) -> Inference {
    let mut sorted: Vec<&Component> = components.iter().collect();
    sorted.sort_by(|a, b| {
        a.identifier
            .cmp(&b.identifier)
            .then(a.category.cmp(&b.category))
    });
    // Categories count distinct identifiers.
    sorted.dedup_by(|later, earlier| {
        later.identifier == earlier.identifier && later.category == earlier.category
    });

    let mut by_category: BTreeMap<Category, Vec<&Component>> = BTreeMap::new();
    for component in sorted {
        by_category.entry(component.category).or_default().push(component);
    }
    let counts: CategoryCounts = by_category.iter().map(|(k, v)| (*k, v.len())).collect();

    let mut out = Inference::default();
    let mut seen: HashSet<(String, String, ConnectionType)> = HashSet::new();

    for rule in RULES {
        if let Some(note) = rule.ambiguity(&counts) {
            debug!(rule = rule.name, "ambiguous target, rule skipped");
            out.notes.push(note);
        }
        if !rule.applies(&counts) {
            continue;
        }
        let before = out.connections.len();
        for conn in rule.produce(&by_category) {
            if conn.source_identifier == conn.target_identifier {
                continue;
            }
            let key = (
                conn.source_identifier.clone(),
                conn.target_identifier.clone(),
                conn.connection_type.clone(),
            );
            if seen.insert(key) {
                out.connections.push(conn);
            }
        }
        debug!(
            rule = rule.name,
            added = out.connections.len() - before,
            "rule applied"
        );
    }

    out
}

/// The connection sequence alone.
pub fn infer_connections(components: &[Component]) -> Vec<Connection> {
    infer(components).connections
}

/// The rule table as text, one rule per line.
pub fn rules_text() -> String {
    RULES
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            let pairing = match rule.fan_out {
                FanOut::All => format!("every {} connects to every {}", rule.source, rule.target),
                FanOut::SoleTarget => format!(
                    "every {} connects to the {} when exactly one exists; several are flagged in notes",
                    rule.source, rule.target
                ),
            };
            format!(
                "{}. {} -> {} ({}): {}; rationale \"{}\"",
                i + 1,
                rule.source,
                rule.target,
                rule.connection_type,
                pairing,
                rule.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
