//! Serializable snapshot of the topology for the operator API

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::{NodeStatus, Priority, ServerStatus};
use super::Topology;

/// Assignment as seen from either side of the link
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentView {
    pub domain: String,
    pub ip: String,
    pub port: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerView {
    pub port: String,
    pub name: String,
    pub module: String,
    pub status: ServerStatus,
    pub status_code: u8,
    pub last_modified: DateTime<Utc>,
    pub assignments: Vec<AssignmentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub ip: String,
    pub name: String,
    pub status: NodeStatus,
    pub status_code: u8,
    pub last_heartbeat: DateTime<Utc>,
    pub servers: Vec<ServerView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainView {
    pub key: String,
    pub class: String,
    pub assignments: Vec<AssignmentView>,
}

/// Full operator view of the hub state
#[derive(Debug, Clone, Serialize)]
pub struct TopologyView {
    pub template: String,
    pub nodes: Vec<NodeView>,
    pub domains: Vec<DomainView>,

    /// Set while any server waits for a requested state change, so the
    /// dashboard knows to poll again
    pub synchronizing: bool,
}

impl From<&Topology> for TopologyView {
    fn from(topology: &Topology) -> Self {
        let to_view = |records: Vec<&super::AssignPriority>| -> Vec<AssignmentView> {
            records
                .into_iter()
                .map(|a| AssignmentView {
                    domain: a.domain().to_string(),
                    ip: a.node_ip().to_string(),
                    port: a.port().to_string(),
                    priority: a.priority,
                })
                .collect()
        };

        let nodes = topology
            .nodes()
            .map(|node| NodeView {
                ip: node.ip().to_string(),
                name: node.name.clone(),
                status: node.status(),
                status_code: node.status().code(),
                last_heartbeat: node.last_heartbeat,
                servers: node
                    .servers()
                    .map(|server| ServerView {
                        port: server.port().to_string(),
                        name: server.name.clone(),
                        module: server.module.clone(),
                        status: server.status(),
                        status_code: server.status().code(),
                        last_modified: server.last_modified,
                        assignments: to_view(
                            topology.assignments_of_server(node.ip(), server.port()),
                        ),
                    })
                    .collect(),
            })
            .collect();

        let domains = topology
            .domains()
            .map(|domain| DomainView {
                key: domain.key().to_string(),
                class: domain.class.clone(),
                assignments: to_view(topology.assignments_of_domain(domain.key())),
            })
            .collect();

        Self {
            template: topology.template.clone(),
            nodes,
            domains,
            synchronizing: topology.any_synchronizing(),
        }
    }
}
