//! Hub coordination: exclusive topology access, operator commands, and the
//! server that ties the control plane and the operator API together.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │                 Hub Server               │
//! │                                          │
//! │  ┌────────────────────────────────────┐  │
//! │  │        AccessCoordinator           │  │
//! │  │  - one lock around the topology    │  │
//! │  │  - liveness escalation per access  │  │
//! │  │  - snapshot after every access     │  │
//! │  └────────────────────────────────────┘  │
//! │        ▲                      ▲          │
//! │  ┌─────┴──────────┐   ┌───────┴───────┐  │
//! │  │ Control plane  │   │   REST API    │  │
//! │  │ UDP heartbeats │   │ GET  topology │  │
//! │  │ resolution     │   │ POST execute  │  │
//! │  └────────────────┘   │ GET/POST tmpl │  │
//! │                       │ GET/POST files│  │
//! │                       └───────────────┘  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use xhub::config::HubConfig;
//! use xhub::coordinator::HubServer;
//!
//! let server = HubServer::new(HubConfig::default())?;
//! server.start_with_shutdown(shutdown_signal()).await?;
//! ```

pub mod access;
pub mod api;
pub mod context;
pub mod executor;
pub mod server;

pub use access::AccessCoordinator;
pub use context::{FileView, HubContext, UploadOutcome};
pub use executor::{CommandExecutor, CommandOutcome, OperatorCommand};
pub use server::{AppState, HubServer, ServerError, ServerInfo};
