//! Hub server bootstrap
//!
//! Prepares the stores, restores the last snapshot, and runs the UDP
//! control plane and the operator HTTP API side by side.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::access::AccessCoordinator;
use super::api::create_router;
use super::context::HubContext;
use super::executor::CommandExecutor;
use crate::codec;
use crate::config::{ConfigError, HubConfig};
use crate::control::{ControlPlaneListener, NodeMessenger};
use crate::resolver::ResolutionEngine;
use crate::storage::{AssetStore, DescriptionStore, SnapshotStore, StorageError};
use crate::topology::{Topology, AUTO_BACKUP_TEMPLATE};

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub hub: HubContext,

    /// Server start time
    pub start_time: Instant,
}

// ============================================================================
// Hub Server
// ============================================================================

/// Main hub server
pub struct HubServer {
    config: HubConfig,
    context: HubContext,
}

impl HubServer {
    /// Prepare stores and restore state. Nothing is bound yet.
    pub fn new(config: HubConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let assets = AssetStore::new(&config.files_dir, &config.descriptions_file);
        assets.ensure_dir()?;
        let descriptions = DescriptionStore::new(config.descriptions_path());
        let snapshots = SnapshotStore::new(&config.snapshot_path);

        let mut topology = match snapshots.load() {
            Ok(Some(text)) => {
                let topology = codec::restore(AUTO_BACKUP_TEMPLATE, &text, &assets);
                tracing::info!(
                    path = %snapshots.path().display(),
                    nodes = topology.node_count(),
                    domains = topology.domain_count(),
                    "Restored snapshot"
                );
                topology
            }
            Ok(None) => Topology::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read snapshot, starting empty");
                Topology::default()
            }
        };
        topology.descriptions = descriptions.load();

        let coordinator = Arc::new(
            AccessCoordinator::new(topology, config.thresholds()).with_snapshots(snapshots),
        );
        let context = HubContext::new(
            coordinator,
            Arc::new(ResolutionEngine::new()),
            NodeMessenger::new(config.node_command_port, config.send_timeout()),
            CommandExecutor::new(assets, descriptions),
        );

        Ok(Self { config, context })
    }

    pub fn context(&self) -> &HubContext {
        &self.context
    }

    /// Application state for the HTTP router
    pub fn state(&self) -> AppState {
        AppState {
            hub: self.context.clone(),
            start_time: Instant::now(),
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Bind both listeners and serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let control = ControlPlaneListener::bind(self.config.udp_bind, self.context.clone())
            .await
            .map_err(|source| ServerError::Bind {
                listener: "UDP",
                addr: self.config.udp_bind,
                source,
            })?;
        let http = TcpListener::bind(self.config.http_bind)
            .await
            .map_err(|source| ServerError::Bind {
                listener: "HTTP",
                addr: self.config.http_bind,
                source,
            })?;

        tracing::info!(
            http = %self.config.http_bind,
            udp = %self.config.udp_bind,
            "Hub started"
        );

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let control_task = tokio::spawn(control.run_until(async move {
            let _ = stop_rx.wait_for(|stopped| *stopped).await;
        }));

        let served = axum::serve(http, self.build_router())
            .with_graceful_shutdown(shutdown_signal)
            .await;

        let _ = stop_tx.send(true);
        if let Err(e) = control_task.await {
            tracing::warn!(error = %e, "Control plane task ended abnormally");
        }

        served.map_err(ServerError::Serve)?;
        tracing::info!("Hub shutdown complete");
        Ok(())
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            http_bind: self.config.http_bind,
            udp_bind: self.config.udp_bind,
            node_command_port: self.config.node_command_port,
            warning_after_secs: self.config.warning_after_secs,
            danger_after_secs: self.config.danger_after_secs,
            cors_enabled: self.config.enable_cors,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub http_bind: SocketAddr,
    pub udp_bind: SocketAddr,
    pub node_command_port: u16,
    pub warning_after_secs: u64,
    pub danger_after_secs: u64,
    pub cors_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "xhub\n\
             {:-<40}\n\
             HTTP API: {}\n\
             Control plane (UDP): {}\n\
             Node command port: {}\n\
             Liveness: warning after {}s, danger after {}s\n\
             CORS: {}",
            "",
            self.http_bind,
            self.udp_bind,
            self.node_command_port,
            self.warning_after_secs,
            self.danger_after_secs,
            if self.cors_enabled { "enabled" } else { "disabled" },
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Errors that stop the hub from starting or serving
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to bind {listener} listener on {addr}: {source}")]
    Bind {
        listener: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> HubConfig {
        HubConfig::builder()
            .files_dir(dir.join("files"))
            .snapshot_path(dir.join("xht_autobackup.txt"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_server_creation_prepares_files_dir() {
        let dir = tempfile::tempdir().unwrap();
        let server = HubServer::new(config_in(dir.path()));

        assert!(server.is_ok());
        assert!(dir.path().join("files").is_dir());
    }

    #[test]
    fn test_server_info() {
        let dir = tempfile::tempdir().unwrap();
        let server = HubServer::new(config_in(dir.path())).unwrap();
        let info = server.info();

        assert_eq!(info.node_command_port, 51710);
        assert!(!info.cors_enabled);
        assert!(info.display().contains("51701"));
    }

    #[tokio::test]
    async fn test_restores_snapshot_as_auto_backup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("xht_autobackup.txt"),
            "D>api.test\nN>10.0.0.1\nS>10.0.0.1>:9000\nA>10.0.0.1>:9000>api.test>1\n",
        )
        .unwrap();

        let server = HubServer::new(config_in(dir.path())).unwrap();
        let view = server.context().view().await;

        assert_eq!(view.template, AUTO_BACKUP_TEMPLATE);
        assert_eq!(view.nodes.len(), 1);
        assert_eq!(view.domains[0].assignments.len(), 1);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut config = config_in(dir.path());
        config.udp_bind = taken.local_addr().unwrap();

        let server = HubServer::new(config).unwrap();
        let result = server.start_with_shutdown(async {}).await;

        assert!(matches!(
            result,
            Err(ServerError::Bind { listener: "UDP", .. })
        ));
    }
}
