//! Time-based liveness escalation
//!
//! This is the only code path that assigns Warning or Danger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{NodeStatus, ServerStatus};
use super::Topology;

/// Staleness thresholds, in whole seconds since the last heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessThresholds {
    /// Elapsed seconds above which an entity becomes Warning
    pub warning_after_secs: i64,

    /// Elapsed seconds above which an entity becomes Danger
    pub danger_after_secs: i64,
}

impl Default for LivenessThresholds {
    fn default() -> Self {
        Self {
            warning_after_secs: 15,
            danger_after_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Warning,
    Danger,
}

impl LivenessThresholds {
    fn level(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> Option<Level> {
        let elapsed = (now - since).num_seconds();
        if elapsed > self.danger_after_secs {
            Some(Level::Danger)
        } else if elapsed > self.warning_after_secs {
            Some(Level::Warning)
        } else {
            None
        }
    }
}

/// Counts of entities whose status changed during one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscalationReport {
    pub nodes_warned: usize,
    pub nodes_endangered: usize,
    pub servers_warned: usize,
    pub servers_endangered: usize,
}

impl EscalationReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Topology {
    /// Escalate stale nodes and servers to Warning or Danger.
    ///
    /// Entities that are Stopped or already Danger are skipped. Fresh
    /// entities keep their status; escalation never lowers a status.
    pub fn escalate(&mut self, now: DateTime<Utc>, thresholds: &LivenessThresholds) -> EscalationReport {
        let mut report = EscalationReport::default();

        for node in self.nodes.values_mut() {
            if !node.status().is_escalation_exempt() {
                match thresholds.level(node.last_heartbeat, now) {
                    Some(Level::Danger) => {
                        node.set_escalated(NodeStatus::Danger);
                        report.nodes_endangered += 1;
                    }
                    Some(Level::Warning) if node.status() != NodeStatus::Warning => {
                        node.set_escalated(NodeStatus::Warning);
                        report.nodes_warned += 1;
                    }
                    _ => {}
                }
            }

            for server in node.servers_mut() {
                if server.status().is_escalation_exempt() {
                    continue;
                }
                match thresholds.level(server.last_modified, now) {
                    Some(Level::Danger) => {
                        server.set_escalated(ServerStatus::Danger);
                        report.servers_endangered += 1;
                    }
                    Some(Level::Warning) if server.status() != ServerStatus::Warning => {
                        server.set_escalated(ServerStatus::Warning);
                        report.servers_warned += 1;
                    }
                    _ => {}
                }
            }
        }

        report
    }
}
