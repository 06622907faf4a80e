//! Exclusive access to the topology
//!
//! Every read or write of the topology goes through
//! [`AccessCoordinator::with_exclusive_access`]. Each access:
//!
//! 1. takes the lock,
//! 2. escalates stale nodes and servers,
//! 3. runs the operation,
//! 4. encodes a snapshot and bumps the generation while still locked,
//! 5. releases the lock and then writes the snapshot.
//!
//! A panicking operation still releases the lock and is re-raised to the
//! caller afterwards.

use chrono::Utc;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::Mutex;

use crate::codec;
use crate::storage::SnapshotStore;
use crate::topology::{LivenessThresholds, Topology};

struct Guarded {
    topology: Topology,
    generation: u64,
}

/// Serializes access to the hub topology
pub struct AccessCoordinator {
    state: Mutex<Guarded>,
    thresholds: LivenessThresholds,
    snapshots: Option<SnapshotStore>,
}

impl AccessCoordinator {
    pub fn new(topology: Topology, thresholds: LivenessThresholds) -> Self {
        Self {
            state: Mutex::new(Guarded {
                topology,
                generation: 0,
            }),
            thresholds,
            snapshots: None,
        }
    }

    /// Persist a snapshot to `store` after every access
    pub fn with_snapshots(mut self, store: SnapshotStore) -> Self {
        self.snapshots = Some(store);
        self
    }

    pub fn thresholds(&self) -> &LivenessThresholds {
        &self.thresholds
    }

    /// Run `operation` with exclusive access to the topology
    pub async fn with_exclusive_access<F, R>(&self, operation: F) -> R
    where
        F: FnOnce(&mut Topology) -> R,
    {
        let (outcome, generation, snapshot) = {
            let mut guard = self.state.lock().await;

            let report = guard.topology.escalate(Utc::now(), &self.thresholds);
            if !report.is_empty() {
                tracing::debug!(
                    nodes_warned = report.nodes_warned,
                    nodes_endangered = report.nodes_endangered,
                    servers_warned = report.servers_warned,
                    servers_endangered = report.servers_endangered,
                    "Liveness escalated"
                );
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| operation(&mut guard.topology)));

            guard.generation += 1;
            let snapshot = self
                .snapshots
                .as_ref()
                .map(|_| codec::backup(&guard.topology));
            (outcome, guard.generation, snapshot)
        };

        if let (Some(store), Some(text)) = (&self.snapshots, snapshot) {
            if let Err(e) = store.write(generation, &text).await {
                tracing::warn!(error = %e, "Failed to write snapshot");
            }
        }

        match outcome {
            Ok(value) => value,
            Err(payload) => {
                tracing::error!("Topology operation panicked");
                panic::resume_unwind(payload)
            }
        }
    }

    /// Swap in `topology`, keeping the current asset descriptions
    pub async fn replace_topology(&self, topology: Topology) {
        self.with_exclusive_access(move |current| {
            let descriptions = std::mem::take(&mut current.descriptions);
            *current = topology;
            current.descriptions = descriptions;
        })
        .await
    }
}
