//! Template codec: line-record backup and restore of the topology
//!
//! # Format
//!
//! One record per line, fields delimited by `>`:
//!
//! ```text
//! D>api.test                      domain
//! N>10.0.0.5                      node
//! S>10.0.0.5>:9000>app.jar        service server (module optional)
//! A>10.0.0.5>:9000>api.test>1     assignment (1 primary, 2 secondary)
//! [10.0.0.5>:9000]Billing API     display name (rest of line, may contain '>')
//! ```
//!
//! Restore is staged: domains and nodes first, then servers, then
//! assignments and names. Record order inside a template therefore does not
//! matter; records whose referents never appear are dropped.

use chrono::Utc;
use serde::Serialize;
use std::fmt;

use crate::storage::AssetStore;
use crate::topology::{Priority, Topology};

/// One line of a template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Record {
    Domain {
        key: String,
    },
    Node {
        ip: String,
    },
    Server {
        ip: String,
        port: String,
        module: Option<String>,
    },
    Assign {
        ip: String,
        port: String,
        domain: String,
        priority: Priority,
    },
    Name {
        ip: String,
        port: String,
        name: String,
    },
}

impl Record {
    /// Parse one template line. Malformed or unknown lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(rest) = line.strip_prefix('[') {
            let (key, name) = rest.split_once(']')?;
            let (ip, port) = key.split_once('>')?;
            return Some(Self::Name {
                ip: non_empty(ip)?,
                port: non_empty(port)?,
                name: name.to_string(),
            });
        }

        let (tag, rest) = line.split_once('>')?;
        let mut fields = rest.split('>');
        match tag {
            "D" => Some(Self::Domain {
                key: non_empty(fields.next()?)?,
            }),
            "N" => Some(Self::Node {
                ip: non_empty(fields.next()?)?,
            }),
            "S" => {
                let mut fields = rest.splitn(3, '>');
                Some(Self::Server {
                    ip: non_empty(fields.next()?)?,
                    port: non_empty(fields.next()?)?,
                    module: fields.next().and_then(non_empty),
                })
            }
            "A" => Some(Self::Assign {
                ip: non_empty(fields.next()?)?,
                port: non_empty(fields.next()?)?,
                domain: non_empty(fields.next()?)?,
                priority: Priority::parse(fields.next()?)?,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain { key } => write!(f, "D>{key}"),
            Self::Node { ip } => write!(f, "N>{ip}"),
            Self::Server {
                ip,
                port,
                module: Some(module),
            } => write!(f, "S>{ip}>{port}>{module}"),
            Self::Server { ip, port, module: None } => write!(f, "S>{ip}>{port}"),
            Self::Assign {
                ip,
                port,
                domain,
                priority,
            } => write!(f, "A>{ip}>{port}>{domain}>{priority}"),
            Self::Name { ip, port, name } => write!(f, "[{ip}>{port}]{name}"),
        }
    }
}

/// Entity counts of a topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateSummary {
    pub nodes: usize,
    pub servers: usize,
    pub domains: usize,
    pub assignments: usize,
}

impl TemplateSummary {
    pub fn of(topology: &Topology) -> Self {
        Self {
            nodes: topology.node_count(),
            servers: topology.server_count(),
            domains: topology.domain_count(),
            assignments: topology.assignment_count(),
        }
    }
}

fn non_empty(field: &str) -> Option<String> {
    (!field.is_empty()).then(|| field.to_string())
}

/// Records describing `topology`, in template order
pub fn records(topology: &Topology) -> Vec<Record> {
    let mut out: Vec<Record> = topology
        .domains()
        .map(|d| Record::Domain {
            key: d.key().to_string(),
        })
        .collect();

    for node in topology.nodes() {
        out.push(Record::Node {
            ip: node.ip().to_string(),
        });
        for server in node.servers() {
            out.push(Record::Server {
                ip: node.ip().to_string(),
                port: server.port().to_string(),
                module: server.has_module().then(|| server.module.clone()),
            });
            for assign in topology.assignments_of_server(node.ip(), server.port()) {
                out.push(Record::Assign {
                    ip: node.ip().to_string(),
                    port: server.port().to_string(),
                    domain: assign.domain().to_string(),
                    priority: assign.priority,
                });
            }
            if !server.name.is_empty() {
                out.push(Record::Name {
                    ip: node.ip().to_string(),
                    port: server.port().to_string(),
                    name: server.name.clone(),
                });
            }
        }
    }

    out
}

/// Encode `topology` as template text
pub fn backup(topology: &Topology) -> String {
    let mut text = String::new();
    for record in records(topology) {
        text.push_str(&record.to_string());
        text.push('\n');
    }
    text
}

/// Decode template `text` into a fresh topology labelled `template`.
///
/// Every restored node and server starts Stopped. A server module is kept
/// only if the asset exists in `assets`. Domains get new class tags.
pub fn restore(template: &str, text: &str, assets: &AssetStore) -> Topology {
    let now = Utc::now();
    let mut topology = Topology::new(template);

    let mut parsed = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match Record::parse(line) {
            Some(record) => parsed.push(record),
            None => tracing::debug!(line = index + 1, content = %line, "Skipping malformed template line"),
        }
    }

    for record in &parsed {
        match record {
            Record::Domain { key } => {
                topology.add_domain(key);
            }
            Record::Node { ip } => {
                topology.upsert_node(ip, now);
            }
            _ => {}
        }
    }

    for record in &parsed {
        if let Record::Server { ip, port, module } = record {
            let Some(server) = topology.upsert_server(ip, port, now) else {
                tracing::debug!(ip = %ip, port = %port, "Dropping server of unknown node");
                continue;
            };
            server.module = match module {
                Some(module) if assets.exists(module) => module.clone(),
                Some(module) => {
                    tracing::debug!(module = %module, "Module asset missing, restoring without it");
                    String::new()
                }
                None => String::new(),
            };
        }
    }

    for record in &parsed {
        match record {
            Record::Assign {
                ip,
                port,
                domain,
                priority,
            } => {
                if topology.assign(domain, ip, port, *priority).is_none() {
                    tracing::debug!(ip = %ip, port = %port, domain = %domain, "Dropping assignment with unknown referent");
                }
            }
            Record::Name { ip, port, name } => {
                topology.rename_server(ip, port, name);
            }
            _ => {}
        }
    }

    topology
}
