//! Entities of the hub topology
//!
//! Nodes own their service servers; domains and servers refer to shared
//! assignment records by [`AssignId`] only. Status fields are private so that
//! protocol code can only move entities between Stopped, Active and
//! Synchronizing; Warning and Danger are reachable solely through
//! [`Topology::escalate`](super::Topology::escalate).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Status Codes
// ============================================================================

/// Liveness state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Node reported a stop, or was restored from a template
    #[default]
    Stopped,

    /// Heartbeat received recently
    Active,

    /// No heartbeat for longer than the warning threshold
    Warning,

    /// No heartbeat for longer than the danger threshold
    Danger,
}

impl NodeStatus {
    /// Numeric code shown to operators
    pub fn code(&self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Active => 1,
            Self::Warning => 8,
            Self::Danger => 9,
        }
    }

    /// Stopped and Danger entities are never recomputed by escalation
    pub fn is_escalation_exempt(&self) -> bool {
        matches!(self, Self::Stopped | Self::Danger)
    }
}

/// Lifecycle state of a service server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    #[default]
    Stopped,
    Active,
    /// A start, stop or module sync was requested and not yet confirmed
    Synchronizing,
    Warning,
    Danger,
}

impl ServerStatus {
    /// Numeric code shown to operators
    pub fn code(&self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Active => 1,
            Self::Synchronizing => 2,
            Self::Warning => 8,
            Self::Danger => 9,
        }
    }

    pub fn is_escalation_exempt(&self) -> bool {
        matches!(self, Self::Stopped | Self::Danger)
    }
}

/// Priority of a domain assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Primary,
    Secondary,
}

impl Priority {
    /// Wire/template code (1 or 2)
    pub fn code(&self) -> u8 {
        match self {
            Self::Primary => 1,
            Self::Secondary => 2,
        }
    }

    /// Parse the `1`/`2` representation used by templates and operator commands
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().parse::<u8>().ok()? {
            1 => Some(Self::Primary),
            2 => Some(Self::Secondary),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Assignment
// ============================================================================

/// Stable identifier of an assignment record in the topology arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssignId(pub(super) u64);

/// A (domain, server, priority) link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignPriority {
    pub priority: Priority,
    pub(super) domain: String,
    pub(super) node_ip: String,
    pub(super) port: String,
}

impl AssignPriority {
    /// Key of the assigned domain
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// IP of the node hosting the assigned server
    pub fn node_ip(&self) -> &str {
        &self.node_ip
    }

    /// Port of the assigned server
    pub fn port(&self) -> &str {
        &self.port
    }
}

// ============================================================================
// Domain
// ============================================================================

/// A named routing target
#[derive(Debug, Clone)]
pub struct Domain {
    key: String,

    /// Generated tag; not stable across restores
    pub class: String,

    pub(super) assignments: Vec<AssignId>,
}

impl Domain {
    pub(super) fn new(key: impl Into<String>, class: String) -> Self {
        Self {
            key: key.into(),
            class,
            assignments: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Ids of the assignments naming this domain, in insertion order
    pub fn assignment_ids(&self) -> &[AssignId] {
        &self.assignments
    }
}

// ============================================================================
// Service Server
// ============================================================================

/// A port-bound module instance on a node
#[derive(Debug, Clone)]
pub struct ServiceServer {
    port: String,
    node_ip: String,
    status: ServerStatus,

    /// Asset file the server runs; empty when unset
    pub module: String,

    /// Operator-assigned display alias
    pub name: String,

    /// Last heartbeat or operator-driven state change
    pub last_modified: DateTime<Utc>,

    pub(super) assignments: Vec<AssignId>,
}

impl ServiceServer {
    pub(super) fn new(node_ip: &str, port: &str, now: DateTime<Utc>) -> Self {
        Self {
            port: port.to_string(),
            node_ip: node_ip.to_string(),
            status: ServerStatus::Stopped,
            module: String::new(),
            name: String::new(),
            last_modified: now,
            assignments: Vec::new(),
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// IP of the owning node
    pub fn node_ip(&self) -> &str {
        &self.node_ip
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    pub fn has_module(&self) -> bool {
        !self.module.is_empty()
    }

    /// Ids of the assignments naming this server
    pub fn assignment_ids(&self) -> &[AssignId] {
        &self.assignments
    }

    /// Record a heartbeat: Active, timestamp refreshed
    pub fn heartbeat(&mut self, now: DateTime<Utc>) {
        self.status = ServerStatus::Active;
        self.last_modified = now;
    }

    pub fn mark_stopped(&mut self) {
        self.status = ServerStatus::Stopped;
    }

    pub fn mark_synchronizing(&mut self) {
        self.status = ServerStatus::Synchronizing;
    }

    pub(super) fn set_escalated(&mut self, status: ServerStatus) {
        self.status = status;
    }
}

// ============================================================================
// Node
// ============================================================================

/// A cluster machine identified by IP
#[derive(Debug, Clone)]
pub struct Node {
    ip: String,
    status: NodeStatus,

    /// Last heartbeat received from the node
    pub last_heartbeat: DateTime<Utc>,

    pub name: String,

    servers: BTreeMap<String, ServiceServer>,
}

impl Node {
    pub(super) fn new(ip: &str, now: DateTime<Utc>) -> Self {
        Self {
            ip: ip.to_string(),
            status: NodeStatus::Stopped,
            last_heartbeat: now,
            name: String::new(),
            servers: BTreeMap::new(),
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Record a heartbeat: Active, timestamp refreshed
    pub fn heartbeat(&mut self, now: DateTime<Utc>) {
        self.status = NodeStatus::Active;
        self.last_heartbeat = now;
    }

    /// Node reported a full stop: node and every server become Stopped
    pub fn stop_all(&mut self) {
        self.status = NodeStatus::Stopped;
        for server in self.servers.values_mut() {
            server.mark_stopped();
        }
    }

    pub fn servers(&self) -> impl Iterator<Item = &ServiceServer> {
        self.servers.values()
    }

    pub fn server(&self, port: &str) -> Option<&ServiceServer> {
        self.servers.get(port)
    }

    pub fn server_mut(&mut self, port: &str) -> Option<&mut ServiceServer> {
        self.servers.get_mut(port)
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub(super) fn servers_mut(&mut self) -> impl Iterator<Item = &mut ServiceServer> {
        self.servers.values_mut()
    }

    pub(super) fn upsert_server(&mut self, port: &str, now: DateTime<Utc>) -> &mut ServiceServer {
        let ip = self.ip.clone();
        self.servers
            .entry(port.to_string())
            .or_insert_with(|| ServiceServer::new(&ip, port, now))
    }

    pub(super) fn set_escalated(&mut self, status: NodeStatus) {
        self.status = status;
    }
}
