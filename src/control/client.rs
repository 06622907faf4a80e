//! Client side of the control plane
//!
//! Used by the CLI and by node-side tooling to query the hub over UDP.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

use super::listener::MAX_DATAGRAM_SIZE;

/// Configuration for the resolver client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hub control-plane address
    pub hub_addr: SocketAddr,

    /// Time to wait for each reply
    pub timeout: Duration,

    /// Extra attempts after a timed-out query
    pub retry_count: u32,
}

impl ClientConfig {
    pub fn new(hub_addr: SocketAddr) -> Self {
        Self {
            hub_addr,
            timeout: Duration::from_secs(3),
            retry_count: 0,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }
}

/// Decoded resolution reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveReply {
    /// `D@<ip><port>`
    Address(String),
    /// `E@<reason>`
    Rejected(String),
}

impl ResolveReply {
    pub fn parse(payload: &str) -> Option<Self> {
        let payload = payload.trim_end_matches(['\r', '\n']);
        if let Some(addr) = payload.strip_prefix("D@") {
            Some(Self::Address(addr.to_string()))
        } else {
            payload
                .strip_prefix("E@")
                .map(|reason| Self::Rejected(reason.to_string()))
        }
    }
}

/// UDP client for hub resolution queries
pub struct ResolverClient {
    config: ClientConfig,
}

impl ResolverClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Ask the hub which server serves `domain`
    pub async fn resolve(&self, domain: &str) -> Result<ResolveReply, ClientError> {
        let socket = self.connect().await?;
        let query = format!("D@{domain}");
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                tracing::debug!(attempt, domain = %domain, "Retrying resolution");
            }
            socket
                .send(query.as_bytes())
                .await
                .map_err(|e| ClientError::NetworkError(e.to_string()))?;

            match tokio::time::timeout(self.config.timeout, socket.recv(&mut buf)).await {
                Ok(Ok(len)) => {
                    let reply = String::from_utf8_lossy(&buf[..len]);
                    return ResolveReply::parse(&reply)
                        .ok_or_else(|| ClientError::InvalidResponse(reply.into_owned()));
                }
                Ok(Err(e)) => return Err(ClientError::NetworkError(e.to_string())),
                Err(_) => continue,
            }
        }

        Err(ClientError::Timeout(self.config.timeout))
    }

    /// Send one raw control datagram without waiting for a reply
    pub async fn send_raw(&self, message: &str) -> Result<(), ClientError> {
        let socket = self.connect().await?;
        socket
            .send(message.as_bytes())
            .await
            .map_err(|e| ClientError::NetworkError(e.to_string()))?;
        Ok(())
    }

    async fn connect(&self) -> Result<UdpSocket, ClientError> {
        let local = match self.config.hub_addr {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| ClientError::InitError(e.to_string()))?;
        socket
            .connect(self.config.hub_addr)
            .await
            .map_err(|e| ClientError::InitError(e.to_string()))?;
        Ok(socket)
    }
}

/// Client errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Local socket setup failed
    InitError(String),

    /// Send or receive failed
    NetworkError(String),

    /// No reply within the timeout
    Timeout(Duration),

    /// Reply was not a `D@` or `E@` frame
    InvalidResponse(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitError(msg) => write!(f, "Initialization error: {msg}"),
            Self::NetworkError(msg) => write!(f, "Network error: {msg}"),
            Self::Timeout(timeout) => write!(f, "No reply from hub within {timeout:?}"),
            Self::InvalidResponse(msg) => write!(f, "Invalid response: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}
