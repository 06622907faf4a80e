//! UDP control plane between the hub and node agents
//!
//! # Architecture
//!
//! ```text
//!   node agents                     hub
//!  ─────────────                ─────────────────────────────────
//!  N / C / D / E  ──UDP:51701──▶ ControlPlaneListener
//!                                   │  frame::ControlFrame::parse
//!                                   │  transitions (heartbeat, stop)
//!                                   │  ResolutionEngine (D@)
//!                 ◀──reply────────  │
//!                                   ▼
//!  command port   ◀──UDP:51710──  NodeMessenger (C> / S>)
//! ```

pub mod client;
pub mod frame;
pub mod listener;
pub mod messenger;
pub mod transitions;

pub use client::{ClientConfig, ClientError, ResolveReply, ResolverClient};
pub use frame::{ControlFrame, FrameError};
pub use listener::{ControlPlaneListener, MAX_DATAGRAM_SIZE};
pub use messenger::{Dispatch, MessengerError, NodeCommand, NodeMessenger};
