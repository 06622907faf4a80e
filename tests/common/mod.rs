//! Common test utilities

use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::UdpSocket;
use xhub::control::{ControlPlaneListener, NodeMessenger};
use xhub::coordinator::{AccessCoordinator, CommandExecutor, HubContext};
use xhub::resolver::ResolutionEngine;
use xhub::storage::{AssetStore, DescriptionStore, SnapshotStore};
use xhub::topology::{LivenessThresholds, Topology};

#[allow(dead_code)]
pub const DESCRIPTIONS_FILE: &str = "xhub_descriptions.json";

/// A hub context backed by a temp directory, with a local socket standing in
/// for the node command port
#[allow(dead_code)]
pub struct HubFixture {
    pub dir: TempDir,
    pub context: HubContext,
    pub node_socket: UdpSocket,
}

#[allow(dead_code)]
impl HubFixture {
    pub async fn new(assets: &[&str]) -> Self {
        Self::with_topology(assets, Topology::default()).await
    }

    pub async fn with_topology(assets: &[&str], topology: Topology) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("files");
        std::fs::create_dir_all(&files).unwrap();
        for asset in assets {
            std::fs::write(files.join(asset), b"module").unwrap();
        }

        let node_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let command_port = node_socket.local_addr().unwrap().port();

        let coordinator = AccessCoordinator::new(topology, LivenessThresholds::default())
            .with_snapshots(SnapshotStore::new(dir.path().join("xht_autobackup.txt")));
        let context = HubContext::new(
            Arc::new(coordinator),
            Arc::new(ResolutionEngine::with_seed(7)),
            NodeMessenger::new(command_port, Duration::from_secs(3)),
            CommandExecutor::new(
                AssetStore::new(&files, DESCRIPTIONS_FILE),
                DescriptionStore::new(files.join(DESCRIPTIONS_FILE)),
            ),
        );

        Self {
            dir,
            context,
            node_socket,
        }
    }

    /// Start a control-plane listener on an ephemeral loopback port
    pub async fn spawn_listener(&self) -> SocketAddr {
        let listener = ControlPlaneListener::bind("127.0.0.1:0".parse().unwrap(), self.context.clone())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { listener.run().await });
        addr
    }

    /// Next command the hub sent to the node, if one arrives within `wait`
    pub async fn next_command(&self, wait: Duration) -> Option<String> {
        let mut buf = [0u8; 1024];
        match tokio::time::timeout(wait, self.node_socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(String::from_utf8_lossy(&buf[..len]).into_owned()),
            _ => None,
        }
    }

    pub fn snapshot_path(&self) -> std::path::PathBuf {
        self.dir.path().join("xht_autobackup.txt")
    }
}

/// Register a node and server that have both just sent a heartbeat
#[allow(dead_code)]
pub fn live_server(topology: &mut Topology, ip: &str, port: &str, now: DateTime<Utc>) {
    topology.upsert_node(ip, now).heartbeat(now);
    topology
        .upsert_server(ip, port, now)
        .expect("node was just created")
        .heartbeat(now);
}

/// Send one datagram from a fresh loopback socket and return that socket
#[allow(dead_code)]
pub async fn send_datagram(hub: SocketAddr, payload: &str) -> UdpSocket {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(payload.as_bytes(), hub).await.unwrap();
    socket
}

/// Wait for a single reply on `socket`
#[allow(dead_code)]
pub async fn recv_reply(socket: &UdpSocket) -> String {
    let mut buf = [0u8; 1024];
    let (len, _) = tokio::time::timeout(Duration::from_secs(3), socket.recv_from(&mut buf))
        .await
        .expect("no reply within 3s")
        .unwrap();
    String::from_utf8_lossy(&buf[..len]).into_owned()
}
