use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

use xhub::config::HubConfig;
use xhub::coordinator::HubServer;

/// Command-line inputs of `xhub serve`
#[derive(Debug, Clone)]
pub struct ServeParams {
    pub config: Option<PathBuf>,
    pub http: Option<SocketAddr>,
    pub udp: Option<SocketAddr>,
}

/// Resolve the effective configuration: file or environment, then flags
pub fn load_config(params: &ServeParams) -> Result<HubConfig> {
    let mut config = match &params.config {
        Some(path) => HubConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => HubConfig::from_env().context("Invalid XHUB_* environment configuration")?,
    };

    if let Some(http) = params.http {
        config.http_bind = http;
    }
    if let Some(udp) = params.udp {
        config.udp_bind = udp;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub async fn serve(config: HubConfig) -> Result<()> {
    let server = HubServer::new(config).context("Failed to create hub server")?;

    println!("{}", server.info().display());
    println!();
    println!("API Endpoints:");
    println!("  GET  /api/health    - Health check");
    println!("  GET  /api/topology  - Nodes, servers and domains");
    println!("  POST /api/execute   - Run an operator command");
    println!("  GET  /api/template  - Download the current template");
    println!("  POST /api/template  - Restore a template (?name=label)");
    println!("  GET  /api/files     - Uploaded module assets");
    println!();
    println!("Press Ctrl+C to stop.\n");

    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("Hub stopped.");
    Ok(())
}
