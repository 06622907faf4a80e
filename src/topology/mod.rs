//! In-memory topology of the hub
//!
//! The topology is the single source of truth for nodes, their service
//! servers, domains and the assignments linking domains to servers.
//!
//! # Structure
//!
//! ```text
//! Topology
//!  ├── nodes:       ip   -> Node ── servers: port -> ServiceServer ─┐
//!  ├── domains:     key  -> Domain ───────────────────────────────┐ │
//!  └── assignments: id   -> AssignPriority  <── ids held by both ─┘─┘
//! ```
//!
//! Assignments live in an arena and are referenced by [`AssignId`] from both
//! their domain and their server. Every mutator in this module adds or removes
//! an id on both sides at once, so an assignment is never reachable from only
//! one of them.

mod liveness;
mod model;
mod view;

pub use liveness::{EscalationReport, LivenessThresholds};
pub use model::{
    AssignId, AssignPriority, Domain, Node, NodeStatus, Priority, ServerStatus, ServiceServer,
};
pub use view::{AssignmentView, DomainView, NodeView, ServerView, TopologyView};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Label used for a topology rebuilt from the crash-recovery snapshot
pub const AUTO_BACKUP_TEMPLATE: &str = "Auto backup";

/// A domain key must be non-empty and fit in one `>`-delimited template field
pub fn is_valid_domain_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['>', '\r', '\n'])
}

/// A display name may contain `>` but must stay on one template line
pub fn is_valid_display_name(name: &str) -> bool {
    !name.contains(['\r', '\n'])
}

/// Root of the hub state
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Label of the currently loaded template
    pub template: String,

    /// Uploaded asset name -> free-text description
    pub descriptions: BTreeMap<String, String>,

    nodes: BTreeMap<String, Node>,
    domains: BTreeMap<String, Domain>,
    assignments: BTreeMap<AssignId, AssignPriority>,
    next_assign_id: u64,
    class_seq: u64,
}

impl Topology {
    /// Create an empty topology labelled with `template`
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------------
    // Nodes and servers
    // ------------------------------------------------------------------------

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, ip: &str) -> Option<&Node> {
        self.nodes.get(ip)
    }

    pub fn node_mut(&mut self, ip: &str) -> Option<&mut Node> {
        self.nodes.get_mut(ip)
    }

    /// Get the node for `ip`, creating it (Stopped) if unseen
    pub fn upsert_node(&mut self, ip: &str, now: DateTime<Utc>) -> &mut Node {
        self.nodes
            .entry(ip.to_string())
            .or_insert_with(|| Node::new(ip, now))
    }

    pub fn server(&self, ip: &str, port: &str) -> Option<&ServiceServer> {
        self.nodes.get(ip)?.server(port)
    }

    pub fn server_mut(&mut self, ip: &str, port: &str) -> Option<&mut ServiceServer> {
        self.nodes.get_mut(ip)?.server_mut(port)
    }

    /// Get the server `port` under node `ip`, creating it (Stopped) if unseen.
    /// Returns `None` when the node itself is unknown.
    pub fn upsert_server(
        &mut self,
        ip: &str,
        port: &str,
        now: DateTime<Utc>,
    ) -> Option<&mut ServiceServer> {
        Some(self.nodes.get_mut(ip)?.upsert_server(port, now))
    }

    /// Set the display name of a server. Names spanning lines are rejected.
    pub fn rename_server(&mut self, ip: &str, port: &str, name: &str) -> bool {
        if !is_valid_display_name(name) {
            return false;
        }
        match self.server_mut(ip, port) {
            Some(server) => {
                server.name = name.to_string();
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Domains
    // ------------------------------------------------------------------------

    pub fn domains(&self) -> impl Iterator<Item = &Domain> {
        self.domains.values()
    }

    pub fn domain(&self, key: &str) -> Option<&Domain> {
        self.domains.get(key)
    }

    /// Create a domain with a freshly generated class tag.
    ///
    /// Returns `false` (and leaves the existing domain and its assignments
    /// untouched) when the key is already present or is not a valid key.
    pub fn add_domain(&mut self, key: &str) -> bool {
        if !is_valid_domain_key(key) || self.domains.contains_key(key) {
            return false;
        }
        let class = self.next_class();
        self.domains.insert(key.to_string(), Domain::new(key, class));
        true
    }

    /// Delete a domain and every assignment naming it
    pub fn remove_domain(&mut self, key: &str) -> bool {
        let Some(domain) = self.domains.get(key) else {
            return false;
        };
        for id in domain.assignments.clone() {
            self.detach(id);
        }
        self.domains.remove(key);
        true
    }

    fn next_class(&mut self) -> String {
        let class = format!(
            "d{}{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            self.class_seq
        );
        self.class_seq += 1;
        class
    }

    // ------------------------------------------------------------------------
    // Assignments
    // ------------------------------------------------------------------------

    pub fn assignment(&self, id: AssignId) -> Option<&AssignPriority> {
        self.assignments.get(&id)
    }

    pub fn assignments_of_domain(&self, key: &str) -> Vec<&AssignPriority> {
        self.domains
            .get(key)
            .map(|d| self.resolve_ids(&d.assignments))
            .unwrap_or_default()
    }

    pub fn assignments_of_server(&self, ip: &str, port: &str) -> Vec<&AssignPriority> {
        self.server(ip, port)
            .map(|s| self.resolve_ids(&s.assignments))
            .unwrap_or_default()
    }

    fn resolve_ids(&self, ids: &[AssignId]) -> Vec<&AssignPriority> {
        ids.iter().filter_map(|id| self.assignments.get(id)).collect()
    }

    /// Assign server `ip`/`port` to `domain` with `priority`.
    ///
    /// If the server already carries an assignment for the domain its
    /// priority is updated in place. Otherwise the domain must exist and a
    /// new record is attached to both the domain and the server. Returns the
    /// id of the affected record, or `None` when the node, server or domain is
    /// unknown.
    pub fn assign(
        &mut self,
        domain: &str,
        ip: &str,
        port: &str,
        priority: Priority,
    ) -> Option<AssignId> {
        let Self {
            nodes,
            domains,
            assignments,
            next_assign_id,
            ..
        } = self;

        let server = nodes.get_mut(ip)?.server_mut(port)?;

        let existing = server
            .assignments
            .iter()
            .copied()
            .find(|id| assignments.get(id).is_some_and(|a| a.domain == domain));
        if let Some(id) = existing {
            if let Some(record) = assignments.get_mut(&id) {
                record.priority = priority;
            }
            return Some(id);
        }

        let domain_entry = domains.get_mut(domain)?;
        let id = AssignId(*next_assign_id);
        *next_assign_id += 1;

        assignments.insert(
            id,
            AssignPriority {
                priority,
                domain: domain.to_string(),
                node_ip: ip.to_string(),
                port: port.to_string(),
            },
        );
        domain_entry.assignments.push(id);
        server.assignments.push(id);
        Some(id)
    }

    /// Remove assignments of `domain` for server `ip`/`port`.
    ///
    /// Two filters are applied and their union removed: the server's own
    /// assignments to the domain, and every assignment of the domain whose
    /// server listens on `port` on any node. Each removed record disappears
    /// from both sides. Returns the number of records removed.
    pub fn exclude(&mut self, domain: &str, ip: &str, port: &str) -> usize {
        let mut doomed: Vec<AssignId> = self
            .server(ip, port)
            .map(|server| {
                server
                    .assignments
                    .iter()
                    .copied()
                    .filter(|id| self.assignments.get(id).is_some_and(|a| a.domain == domain))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(entry) = self.domains.get(domain) {
            for id in &entry.assignments {
                let same_port = self.assignments.get(id).is_some_and(|a| a.port == port);
                if same_port && !doomed.contains(id) {
                    doomed.push(*id);
                }
            }
        }

        doomed
            .into_iter()
            .filter_map(|id| self.detach(id))
            .count()
    }

    /// Remove one assignment from the arena and from both owning lists
    fn detach(&mut self, id: AssignId) -> Option<AssignPriority> {
        let record = self.assignments.remove(&id)?;
        if let Some(domain) = self.domains.get_mut(&record.domain) {
            domain.assignments.retain(|other| *other != id);
        }
        if let Some(server) = self
            .nodes
            .get_mut(&record.node_ip)
            .and_then(|node| node.server_mut(&record.port))
        {
            server.assignments.retain(|other| *other != id);
        }
        Some(record)
    }

    // ------------------------------------------------------------------------
    // Summary
    // ------------------------------------------------------------------------

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn server_count(&self) -> usize {
        self.nodes.values().map(Node::server_count).sum()
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// True while any server waits for a requested state change
    pub fn any_synchronizing(&self) -> bool {
        self.nodes
            .values()
            .flat_map(Node::servers)
            .any(|s| s.status() == ServerStatus::Synchronizing)
    }
}
