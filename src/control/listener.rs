//! UDP control-plane listener
//!
//! Datagrams are handled one at a time in arrival order. A bad packet or a
//! failed receive is logged and the loop carries on.

use chrono::Utc;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

use super::frame::{ControlFrame, FrameError};
use super::transitions;
use crate::coordinator::HubContext;
use crate::resolver::{reply_for, NOT_ASSIGNED_REPLY};

/// Receive buffer size; longer datagrams are truncated
pub const MAX_DATAGRAM_SIZE: usize = 1024;

pub struct ControlPlaneListener {
    socket: Arc<UdpSocket>,
    context: HubContext,
}

impl ControlPlaneListener {
    pub async fn bind(addr: SocketAddr, context: HubContext) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
            context,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve datagrams until `shutdown` resolves
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        tokio::select! {
            _ = self.run() => {}
            _ = &mut shutdown => {
                tracing::info!("Control plane listener stopped");
            }
        }
    }

    /// Serve datagrams forever
    pub async fn run(&self) {
        if let Ok(addr) = self.local_addr() {
            tracing::info!(addr = %addr, "Control plane listening");
        }

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, remote)) => self.handle_datagram(&buf[..len], remote).await,
                Err(e) => tracing::warn!(error = %e, "UDP receive failed"),
            }
        }
    }

    /// Decode and apply one datagram from `remote`
    pub async fn handle_datagram(&self, payload: &[u8], remote: SocketAddr) {
        let text = String::from_utf8_lossy(payload);
        tracing::trace!(remote = %remote, payload = %text, "Datagram received");

        let frame = match ControlFrame::parse(&text) {
            Ok(frame) => frame,
            Err(FrameError::UnknownTag(tag)) => {
                tracing::debug!(remote = %remote, tag = %tag, "Ignoring unknown frame");
                return;
            }
            Err(e) => {
                tracing::warn!(remote = %remote, error = %e, "Dropping malformed frame");
                if e.is_resolution() {
                    self.reply(NOT_ASSIGNED_REPLY, remote).await;
                }
                return;
            }
        };

        let ip = remote.ip().to_canonical().to_string();
        match frame {
            ControlFrame::Heartbeat { port, module } => {
                let assets = self.context.assets();
                let dispatch = self
                    .context
                    .coordinator
                    .with_exclusive_access(|t| {
                        transitions::heartbeat(
                            t,
                            assets,
                            &ip,
                            port.as_deref(),
                            module.as_deref(),
                            Utc::now(),
                        )
                    })
                    .await;
                self.context.messenger.dispatch_all(dispatch.into_iter().collect());
            }

            ControlFrame::Stop { port } => {
                let known = self
                    .context
                    .coordinator
                    .with_exclusive_access(|t| transitions::stop(t, &ip, port.as_deref()))
                    .await;
                if known {
                    tracing::info!(node = %ip, port = port.as_deref().unwrap_or("*"), "Node reported stop");
                } else {
                    tracing::debug!(node = %ip, "Stop from unknown node or server");
                }
            }

            ControlFrame::Resolve { domain } => {
                let resolver = &self.context.resolver;
                let outcome = self
                    .context
                    .coordinator
                    .with_exclusive_access(|t| resolver.resolve(t, &domain))
                    .await;
                match &outcome {
                    Ok(resolved) => tracing::debug!(
                        query = %domain,
                        domain = %resolved.domain,
                        target = %resolved.reply(),
                        "Domain resolved"
                    ),
                    Err(e) => tracing::info!(query = %domain, error = %e, "Resolution failed"),
                }
                self.reply(&reply_for(&outcome), remote).await;
            }

            ControlFrame::Echo { message } => {
                tracing::info!(node = %ip, message = %message, "Node message");
            }
        }
    }

    async fn reply(&self, payload: &str, remote: SocketAddr) {
        if let Err(e) = self.socket.send_to(payload.as_bytes(), remote).await {
            tracing::warn!(remote = %remote, error = %e, "Failed to send reply");
        }
    }
}
