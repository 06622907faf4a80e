//! Outbound commands to node agents
//!
//! Commands are single UDP datagrams sent to the node's command port. They
//! are collected while the topology is locked and sent only after the lock
//! is released; a failed or slow send is logged and never retried.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;

/// Command understood by a node agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// `C>` stop every server on the node
    StopAll,
    /// `C>port`
    StopServer { port: String },
    /// `S>` spawn a new server process
    SpawnServer,
    /// `S>port`
    StartServer { port: String },
    /// `S>port>module` restart the server with the given module
    SyncServer { port: String, module: String },
}

impl fmt::Display for NodeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopAll => write!(f, "C>"),
            Self::StopServer { port } => write!(f, "C>{port}"),
            Self::SpawnServer => write!(f, "S>"),
            Self::StartServer { port } => write!(f, "S>{port}"),
            Self::SyncServer { port, module } => write!(f, "S>{port}>{module}"),
        }
    }
}

/// A command addressed to one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub node_ip: String,
    pub command: NodeCommand,
}

impl Dispatch {
    pub fn new(node_ip: impl Into<String>, command: NodeCommand) -> Self {
        Self {
            node_ip: node_ip.into(),
            command,
        }
    }
}

#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("Invalid node address '{0}'")]
    InvalidAddress(String),

    #[error("Send to {target} failed: {source}")]
    Io {
        target: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Send to {target} timed out after {timeout:?}")]
    Timeout { target: SocketAddr, timeout: Duration },
}

/// Sends [`Dispatch`]es to node command ports
#[derive(Debug, Clone)]
pub struct NodeMessenger {
    command_port: u16,
    timeout: Duration,
}

impl NodeMessenger {
    pub fn new(command_port: u16, timeout: Duration) -> Self {
        Self {
            command_port,
            timeout,
        }
    }

    pub fn command_port(&self) -> u16 {
        self.command_port
    }

    /// Command socket address of node `ip`
    pub fn target(&self, ip: &str) -> Result<SocketAddr, MessengerError> {
        let ip: IpAddr = ip
            .parse()
            .map_err(|_| MessengerError::InvalidAddress(ip.to_string()))?;
        Ok(SocketAddr::new(ip, self.command_port))
    }

    /// Send one command and wait for the datagram to leave
    pub async fn send(&self, dispatch: &Dispatch) -> Result<(), MessengerError> {
        let target = self.target(&dispatch.node_ip)?;
        let payload = dispatch.command.to_string();

        let local = match target {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let io_err = |source| MessengerError::Io { target, source };

        let send = async {
            let socket = UdpSocket::bind(local).await?;
            socket.send_to(payload.as_bytes(), target).await
        };
        match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(_)) => {
                tracing::debug!(target = %target, command = %payload, "Node command sent");
                Ok(())
            }
            Ok(Err(e)) => Err(io_err(e)),
            Err(_) => Err(MessengerError::Timeout {
                target,
                timeout: self.timeout,
            }),
        }
    }

    /// Fire off `dispatches` in the background. Failures are logged.
    pub fn dispatch_all(&self, dispatches: Vec<Dispatch>) {
        for dispatch in dispatches {
            let messenger = self.clone();
            tokio::spawn(async move {
                if let Err(e) = messenger.send(&dispatch).await {
                    tracing::warn!(
                        node = %dispatch.node_ip,
                        command = %dispatch.command,
                        error = %e,
                        "Failed to deliver node command"
                    );
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_encoding() {
        assert_eq!(NodeCommand::StopAll.to_string(), "C>");
        assert_eq!(
            NodeCommand::StopServer { port: ":9000".into() }.to_string(),
            "C>:9000"
        );
        assert_eq!(NodeCommand::SpawnServer.to_string(), "S>");
        assert_eq!(
            NodeCommand::StartServer { port: ":9000".into() }.to_string(),
            "S>:9000"
        );
        assert_eq!(
            NodeCommand::SyncServer {
                port: ":9000".into(),
                module: "app.jar".into()
            }
            .to_string(),
            "S>:9000>app.jar"
        );
    }

    #[test]
    fn test_target_address() {
        let messenger = NodeMessenger::new(51710, Duration::from_secs(3));
        assert_eq!(
            messenger.target("10.0.0.5").unwrap(),
            "10.0.0.5:51710".parse::<SocketAddr>().unwrap()
        );
        assert!(matches!(
            messenger.target("not-an-ip"),
            Err(MessengerError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_send_reaches_command_port() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let messenger = NodeMessenger::new(port, Duration::from_secs(3));

        messenger
            .send(&Dispatch::new("127.0.0.1", NodeCommand::StartServer { port: ":9000".into() }))
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"S>:9000");
    }
}
