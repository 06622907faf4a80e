//! xhub - fleet coordination hub
//!
//! Node agents report liveness over UDP, the hub tracks their service
//! servers, maps domains onto servers with primary/secondary priority, and
//! answers domain resolution queries with failover.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`topology`] - Nodes, servers, domains and assignments, plus liveness escalation
//! - [`resolver`] - Domain resolution with primary/secondary failover
//! - [`codec`] - Line-record template backup and restore
//! - [`storage`] - Assets, descriptions and the crash-recovery snapshot
//! - [`control`] - UDP control plane: frames, listener, node commands, client
//! - [`coordinator`] - Exclusive access, operator commands, HTTP API and server
//! - [`config`] - Configuration management and settings
//!
//! # Example
//!
//! ```no_run
//! use xhub::config::HubConfig;
//! use xhub::coordinator::HubServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HubConfig::from_env()?;
//!     let server = HubServer::new(config)?;
//!     server
//!         .start_with_shutdown(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod error;
pub mod resolver;
pub mod storage;
pub mod topology;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::HubConfig;
    pub use crate::control::{ControlFrame, NodeCommand, ResolverClient};
    pub use crate::coordinator::{AccessCoordinator, HubServer, OperatorCommand};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::resolver::ResolutionEngine;
    pub use crate::topology::{Priority, Topology, TopologyView};
}

pub use topology::{NodeStatus, Priority, ServerStatus, Topology};
