//! Differences between two versions of a design, e.g. two scans of the same
//! account taken a week apart.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::{ArchitectureDesign, Component, Connection};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignDiff {
    pub components_added: Vec<Component>,
    pub components_removed: Vec<Component>,
    /// Identifier plus a human-readable list of field changes
    pub components_changed: Vec<(String, Vec<String>)>,
    pub connections_added: Vec<Connection>,
    pub connections_removed: Vec<Connection>,
    pub notes_added: Vec<String>,
    pub notes_removed: Vec<String>,
}

impl DesignDiff {
    pub fn is_empty(&self) -> bool {
        self.components_added.is_empty()
            && self.components_removed.is_empty()
            && self.components_changed.is_empty()
            && self.connections_added.is_empty()
            && self.connections_removed.is_empty()
            && self.notes_added.is_empty()
            && self.notes_removed.is_empty()
    }
}

pub fn diff_designs(baseline: &ArchitectureDesign, current: &ArchitectureDesign) -> DesignDiff {
    let base_components: HashMap<&str, &Component> = baseline
        .components
        .iter()
        .map(|c| (c.identifier.as_str(), c))
        .collect();
    let curr_components: HashMap<&str, &Component> = current
        .components
        .iter()
        .map(|c| (c.identifier.as_str(), c))
        .collect();

    let mut diff = DesignDiff {
        components_added: current
            .components
            .iter()
            .filter(|c| !base_components.contains_key(c.identifier.as_str()))
            .cloned()
            .collect(),
        components_removed: baseline
            .components
            .iter()
            .filter(|c| !curr_components.contains_key(c.identifier.as_str()))
            .cloned()
            .collect(),
        ..Default::default()
    };

    // Walk in current order so the output is stable.
    for curr in &current.components {
        let Some(base) = base_components.get(curr.identifier.as_str()) else {
            continue;
        };
        let mut changes = Vec::new();
        if base.display_name != curr.display_name {
            changes.push(format!(
                "name \"{}\" -> \"{}\"",
                base.display_name, curr.display_name
            ));
        }
        if base.category != curr.category {
            changes.push(format!("category {} -> {}", base.category, curr.category));
        }
        if base.description != curr.description {
            changes.push("description changed".to_string());
        }
        if !changes.is_empty() {
            diff.components_changed
                .push((curr.identifier.clone(), changes));
        }
    }

    let base_edges: HashSet<_> = baseline.connections.iter().map(Connection::key).collect();
    let curr_edges: HashSet<_> = current.connections.iter().map(Connection::key).collect();
    diff.connections_added = current
        .connections
        .iter()
        .filter(|c| !base_edges.contains(&c.key()))
        .cloned()
        .collect();
    diff.connections_removed = baseline
        .connections
        .iter()
        .filter(|c| !curr_edges.contains(&c.key()))
        .cloned()
        .collect();

    let base_notes: HashSet<&str> = baseline.notes.iter().map(String::as_str).collect();
    let curr_notes: HashSet<&str> = current.notes.iter().map(String::as_str).collect();
    diff.notes_added = current
        .notes
        .iter()
        .filter(|n| !base_notes.contains(n.as_str()))
        .cloned()
        .collect();
    diff.notes_removed = baseline
        .notes
        .iter()
        .filter(|n| !curr_notes.contains(n.as_str()))
        .cloned()
        .collect();

    diff
}

fn edge_line(c: &Connection) -> String {
    format!(
        "  - {} -> {} ({})",
        c.source_identifier, c.target_identifier, c.connection_type
    )
}

impl fmt::Display for DesignDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("No changes.");
        }

        let mut sections: Vec<String> = Vec::new();

        if !self.components_added.is_empty() {
            let mut lines = vec![format!("Components added ({}):", self.components_added.len())];
            for c in &self.components_added {
                lines.push(format!(
                    "  - {} \"{}\" ({})",
                    c.identifier, c.display_name, c.category
                ));
            }
            sections.push(lines.join("\n"));
        }

        if !self.components_removed.is_empty() {
            let mut lines = vec![format!(
                "Components removed ({}):",
                self.components_removed.len()
            )];
            for c in &self.components_removed {
                lines.push(format!(
                    "  - {} \"{}\" ({})",
                    c.identifier, c.display_name, c.category
                ));
            }
            sections.push(lines.join("\n"));
        }

        if !self.components_changed.is_empty() {
            let mut lines = vec![format!(
                "Components modified ({}):",
                self.components_changed.len()
            )];
            for (id, changes) in &self.components_changed {
                lines.push(format!("  - {}: {}", id, changes.join(", ")));
            }
            sections.push(lines.join("\n"));
        }

        if !self.connections_added.is_empty() {
            let mut lines = vec![format!(
                "Connections added ({}):",
                self.connections_added.len()
            )];
            lines.extend(self.connections_added.iter().map(edge_line));
            sections.push(lines.join("\n"));
        }

        if !self.connections_removed.is_empty() {
            let mut lines = vec![format!(
                "Connections removed ({}):",
                self.connections_removed.len()
            )];
            lines.extend(self.connections_removed.iter().map(edge_line));
            sections.push(lines.join("\n"));
        }

        if !self.notes_added.is_empty() || !self.notes_removed.is_empty() {
            let mut lines = vec!["Notes:".to_string()];
            lines.extend(self.notes_added.iter().map(|n| format!("  + {}", n)));
            lines.extend(self.notes_removed.iter().map(|n| format!("  - {}", n)));
            sections.push(lines.join("\n"));
        }

        f.write_str(&sections.join("\n\n"))
    }
}
