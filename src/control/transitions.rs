//! Topology transitions driven by node datagrams

use chrono::{DateTime, Utc};

use super::messenger::{Dispatch, NodeCommand};
use crate::storage::AssetStore;
use crate::topology::Topology;

/// Apply a heartbeat from node `ip`.
///
/// The node is created on first contact and marked Active. With a `port`
/// the server is created or refreshed as well. When the hub already holds a
/// module for the server and the node reports none or another one, the
/// server goes Synchronizing and the returned dispatch pushes the hub's
/// module back to the node. A server without a module adopts the reported
/// one if that asset has been uploaded.
pub fn heartbeat(
    topology: &mut Topology,
    assets: &AssetStore,
    ip: &str,
    port: Option<&str>,
    module: Option<&str>,
    now: DateTime<Utc>,
) -> Option<Dispatch> {
    topology.upsert_node(ip, now).heartbeat(now);

    let port = port?;
    let server = topology.upsert_server(ip, port, now)?;
    server.heartbeat(now);

    if server.has_module() {
        if module != Some(server.module.as_str()) {
            server.mark_synchronizing();
            tracing::info!(
                node = %ip,
                port = %port,
                reported = module.unwrap_or("-"),
                expected = %server.module,
                "Server module out of sync"
            );
            return Some(Dispatch::new(
                ip,
                NodeCommand::SyncServer {
                    port: port.to_string(),
                    module: server.module.clone(),
                },
            ));
        }
    } else if let Some(module) = module {
        if assets.exists(module) {
            server.module = module.to_string();
        } else {
            tracing::debug!(node = %ip, port = %port, module = %module, "Reported module not uploaded");
        }
    }

    None
}

/// Apply a stop notification from node `ip`.
///
/// Without a port every server of the node stops along with the node.
/// Returns `false` when the node or server is unknown.
pub fn stop(topology: &mut Topology, ip: &str, port: Option<&str>) -> bool {
    let Some(node) = topology.node_mut(ip) else {
        return false;
    };
    match port {
        None => {
            node.stop_all();
            true
        }
        Some(port) => match node.server_mut(port) {
            Some(server) => {
                server.mark_stopped();
                true
            }
            None => false,
        },
    }
}
