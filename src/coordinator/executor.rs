//! Operator commands
//!
//! Commands arrive as JSON objects tagged by `key`:
//!
//! ```json
//! { "key": "assign", "ip": "10.0.0.5", "port": ":9000", "domain": "api.test", "priority": "1" }
//! ```
//!
//! A command whose preconditions do not hold is a no-op. Node commands
//! produced by an execution are returned as [`Dispatch`]es for the caller to
//! send once the topology lock is released.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::control::{Dispatch, NodeCommand};
use crate::storage::{AssetStore, DescriptionStore};
use crate::topology::{Priority, ServerStatus, Topology};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "key", rename_all = "camelCase")]
pub enum OperatorCommand {
    RemoveFile { name: String },
    StopNode { ip: String },
    AddServer { ip: String },
    RenameServer { ip: String, port: String, name: String },
    StartServer { ip: String, port: String },
    StopServer { ip: String, port: String },
    SyncServer { ip: String, port: String },
    SetModule { ip: String, port: String, name: String },
    AddDomain { name: String },
    DelDomain { name: String },
    Assign {
        ip: String,
        port: String,
        domain: String,
        priority: String,
    },
    Exclude { ip: String, port: String, domain: String },
}

impl OperatorCommand {
    /// Decode a command object; unknown keys or bad fields yield `None`
    pub fn from_value(value: Value) -> Option<Self> {
        match serde_json::from_value(value) {
            Ok(command) => Some(command),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unrecognised operator command");
                None
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RemoveFile { .. } => "removeFile",
            Self::StopNode { .. } => "stopNode",
            Self::AddServer { .. } => "addServer",
            Self::RenameServer { .. } => "renameServer",
            Self::StartServer { .. } => "startServer",
            Self::StopServer { .. } => "stopServer",
            Self::SyncServer { .. } => "syncServer",
            Self::SetModule { .. } => "setModule",
            Self::AddDomain { .. } => "addDomain",
            Self::DelDomain { .. } => "delDomain",
            Self::Assign { .. } => "assign",
            Self::Exclude { .. } => "exclude",
        }
    }
}

/// Result of executing one command
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Whether the preconditions held and the command took effect
    pub applied: bool,
    pub dispatches: Vec<Dispatch>,
}

impl CommandOutcome {
    fn skipped() -> Self {
        Self::default()
    }

    fn local(applied: bool) -> Self {
        Self {
            applied,
            dispatches: Vec::new(),
        }
    }

    fn send(node_ip: &str, command: NodeCommand) -> Self {
        Self {
            applied: true,
            dispatches: vec![Dispatch::new(node_ip, command)],
        }
    }
}

/// Applies operator commands to a topology
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    assets: AssetStore,
    descriptions: DescriptionStore,
}

impl CommandExecutor {
    pub fn new(assets: AssetStore, descriptions: DescriptionStore) -> Self {
        Self {
            assets,
            descriptions,
        }
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn descriptions(&self) -> &DescriptionStore {
        &self.descriptions
    }

    /// Execute `command` against `topology`
    pub fn execute(
        &self,
        topology: &mut Topology,
        command: &OperatorCommand,
        now: DateTime<Utc>,
    ) -> CommandOutcome {
        let outcome = match command {
            OperatorCommand::RemoveFile { name } => self.remove_file(topology, name),

            OperatorCommand::StopNode { ip } => match topology.node(ip) {
                Some(_) => CommandOutcome::send(ip, NodeCommand::StopAll),
                None => CommandOutcome::skipped(),
            },

            OperatorCommand::AddServer { ip } => match topology.node(ip) {
                Some(_) => CommandOutcome::send(ip, NodeCommand::SpawnServer),
                None => CommandOutcome::skipped(),
            },

            OperatorCommand::RenameServer { ip, port, name } => {
                CommandOutcome::local(topology.rename_server(ip, port, name))
            }

            OperatorCommand::StartServer { ip, port } => match topology.server_mut(ip, port) {
                Some(server) if server.status() == ServerStatus::Stopped => {
                    server.mark_synchronizing();
                    server.last_modified = now;
                    CommandOutcome::send(ip, NodeCommand::StartServer { port: port.clone() })
                }
                _ => CommandOutcome::skipped(),
            },

            OperatorCommand::StopServer { ip, port } => match topology.server_mut(ip, port) {
                Some(server) if server.status() == ServerStatus::Active => {
                    server.mark_synchronizing();
                    CommandOutcome::send(ip, NodeCommand::StopServer { port: port.clone() })
                }
                _ => CommandOutcome::skipped(),
            },

            OperatorCommand::SyncServer { ip, port } => match topology.server_mut(ip, port) {
                Some(server)
                    if matches!(server.status(), ServerStatus::Active | ServerStatus::Warning)
                        && server.has_module()
                        && self.assets.exists(&server.module) =>
                {
                    server.mark_synchronizing();
                    CommandOutcome::send(
                        ip,
                        NodeCommand::SyncServer {
                            port: port.clone(),
                            module: server.module.clone(),
                        },
                    )
                }
                _ => CommandOutcome::skipped(),
            },

            OperatorCommand::SetModule { ip, port, name } => {
                if !self.assets.exists(name) {
                    CommandOutcome::skipped()
                } else {
                    match topology.server_mut(ip, port) {
                        Some(server)
                            if server.status() == ServerStatus::Active && server.module != *name =>
                        {
                            server.module = name.clone();
                            server.mark_synchronizing();
                            CommandOutcome::send(
                                ip,
                                NodeCommand::SyncServer {
                                    port: port.clone(),
                                    module: name.clone(),
                                },
                            )
                        }
                        _ => CommandOutcome::skipped(),
                    }
                }
            }

            OperatorCommand::AddDomain { name } => CommandOutcome::local(topology.add_domain(name)),

            OperatorCommand::DelDomain { name } => {
                CommandOutcome::local(topology.remove_domain(name))
            }

            OperatorCommand::Assign {
                ip,
                port,
                domain,
                priority,
            } => match Priority::parse(priority) {
                Some(priority) => {
                    CommandOutcome::local(topology.assign(domain, ip, port, priority).is_some())
                }
                None => CommandOutcome::skipped(),
            },

            OperatorCommand::Exclude { ip, port, domain } => {
                CommandOutcome::local(topology.exclude(domain, ip, port) > 0)
            }
        };

        if outcome.applied {
            tracing::info!(command = command.name(), "Operator command applied");
        } else {
            tracing::debug!(command = command.name(), detail = ?command, "Operator command skipped");
        }
        outcome
    }

    fn remove_file(&self, topology: &mut Topology, name: &str) -> CommandOutcome {
        let removed = match self.assets.remove(name) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Failed to remove asset");
                false
            }
        };
        let described = topology.descriptions.remove(name).is_some();

        if let Err(e) = self.descriptions.save(&topology.descriptions) {
            tracing::warn!(error = %e, "Failed to persist descriptions");
        }

        CommandOutcome {
            applied: removed || described,
            dispatches: Vec::new(),
        }
    }
}
