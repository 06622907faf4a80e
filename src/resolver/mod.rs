//! Domain resolution with priority failover
//!
//! A query names a domain; the engine picks one live server assigned to it.
//!
//! 1. The domain is matched exactly, or else by the longest domain key that
//!    is a prefix of the query. Two distinct keys of equal length cannot both
//!    prefix the same query, so the longest match is unique.
//! 2. Assignments whose server and node are both Active are eligible.
//! 3. A primary is chosen uniformly at random when any is eligible, otherwise
//!    a secondary; otherwise resolution fails.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Mutex;
use thiserror::Error;

use crate::topology::{Domain, NodeStatus, Priority, ServerStatus, Topology};

/// Reply payload sent for any failed resolution
pub const NOT_ASSIGNED_REPLY: &str = "E@NotAssignDomain";

/// Resolution failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No domain key equals or prefixes the query
    #[error("No domain matches '{0}'")]
    UnknownDomain(String),

    /// The domain exists but none of its servers is live
    #[error("Domain '{0}' has no eligible server")]
    NoEligibleServer(String),
}

/// Address of the chosen server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Key of the domain that matched the query
    pub domain: String,
    pub ip: String,
    /// Port string including its leading delimiter, e.g. `:9000`
    pub port: String,
    pub priority: Priority,
}

impl Resolved {
    /// `D@<ip><port>` reply payload
    pub fn reply(&self) -> String {
        format!("D@{}{}", self.ip, self.port)
    }
}

/// Reply payload for a resolution outcome
pub fn reply_for(outcome: &Result<Resolved, ResolveError>) -> String {
    match outcome {
        Ok(resolved) => resolved.reply(),
        Err(_) => NOT_ASSIGNED_REPLY.to_string(),
    }
}

/// Picks one eligible server for a domain query
pub struct ResolutionEngine {
    rng: Mutex<ChaCha8Rng>,
}

impl Default for ResolutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionEngine {
    /// Engine seeded once from OS entropy
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Engine with a fixed seed, for reproducible selection
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Resolve `query` against `topology`
    pub fn resolve(&self, topology: &Topology, query: &str) -> Result<Resolved, ResolveError> {
        let domain = match_domain(topology, query)
            .ok_or_else(|| ResolveError::UnknownDomain(query.to_string()))?;

        let mut primaries = Vec::new();
        let mut secondaries = Vec::new();
        for assign in topology.assignments_of_domain(domain.key()) {
            let live = topology
                .node(assign.node_ip())
                .filter(|node| node.status() == NodeStatus::Active)
                .and_then(|node| node.server(assign.port()))
                .is_some_and(|server| server.status() == ServerStatus::Active);
            if !live {
                continue;
            }
            match assign.priority {
                Priority::Primary => primaries.push(assign),
                Priority::Secondary => secondaries.push(assign),
            }
        }

        let pool = if primaries.is_empty() {
            &secondaries
        } else {
            &primaries
        };

        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let chosen = pool
            .choose(&mut *rng)
            .ok_or_else(|| ResolveError::NoEligibleServer(domain.key().to_string()))?;

        Ok(Resolved {
            domain: domain.key().to_string(),
            ip: chosen.node_ip().to_string(),
            port: chosen.port().to_string(),
            priority: chosen.priority,
        })
    }
}

/// Exact match, else longest key that prefixes `query`
fn match_domain<'a>(topology: &'a Topology, query: &str) -> Option<&'a Domain> {
    topology.domain(query).or_else(|| {
        let key = longest_prefix(topology.domains().map(Domain::key), query)?;
        topology.domain(key)
    })
}

/// Longest non-empty key that is a prefix of `query`
fn longest_prefix<'a>(keys: impl Iterator<Item = &'a str>, query: &str) -> Option<&'a str> {
    keys.filter(|key| !key.is_empty() && query.starts_with(key))
        .max_by_key(|key| key.len())
}
