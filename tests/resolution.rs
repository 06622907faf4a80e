//! Resolution failover scenarios

mod common;

use chrono::{Duration, Utc};
use common::live_server;
use xhub::coordinator::AccessCoordinator;
use xhub::resolver::{reply_for, ResolutionEngine, ResolveError};
use xhub::topology::{LivenessThresholds, NodeStatus, Priority, Topology};

const QUERIES: usize = 1000;

/// Domain `api.test` with primary A (10.0.0.1) and secondary B (10.0.0.2)
fn primary_and_secondary() -> Topology {
    let now = Utc::now();
    let mut topology = Topology::default();
    live_server(&mut topology, "10.0.0.1", ":9000", now);
    live_server(&mut topology, "10.0.0.2", ":9000", now);
    topology.add_domain("api.test");
    topology.assign("api.test", "10.0.0.1", ":9000", Priority::Primary);
    topology.assign("api.test", "10.0.0.2", ":9000", Priority::Secondary);
    topology
}

async fn resolve_many(coordinator: &AccessCoordinator, engine: &ResolutionEngine) -> Vec<String> {
    let mut replies = Vec::with_capacity(QUERIES);
    for _ in 0..QUERIES {
        let outcome = coordinator
            .with_exclusive_access(|t| engine.resolve(t, "api.test"))
            .await;
        replies.push(reply_for(&outcome));
    }
    replies
}

#[tokio::test]
async fn test_primary_always_preferred() {
    let coordinator =
        AccessCoordinator::new(primary_and_secondary(), LivenessThresholds::default());
    let engine = ResolutionEngine::new();

    let replies = resolve_many(&coordinator, &engine).await;

    assert!(replies.iter().all(|r| r == "D@10.0.0.1:9000"));
}

#[tokio::test]
async fn test_failover_to_secondary_when_primary_node_in_danger() {
    let mut topology = primary_and_secondary();
    topology.node_mut("10.0.0.1").unwrap().last_heartbeat = Utc::now() - Duration::seconds(45);
    let coordinator = AccessCoordinator::new(topology, LivenessThresholds::default());
    let engine = ResolutionEngine::new();

    let status = coordinator
        .with_exclusive_access(|t| t.node("10.0.0.1").unwrap().status())
        .await;
    assert_eq!(status, NodeStatus::Danger);

    let replies = resolve_many(&coordinator, &engine).await;

    assert!(replies.iter().all(|r| r == "D@10.0.0.2:9000"));
}

#[tokio::test]
async fn test_no_eligible_server() {
    let mut topology = primary_and_secondary();
    topology.server_mut("10.0.0.1", ":9000").unwrap().mark_stopped();
    topology.node_mut("10.0.0.2").unwrap().stop_all();
    let coordinator = AccessCoordinator::new(topology, LivenessThresholds::default());
    let engine = ResolutionEngine::with_seed(1);

    let outcome = coordinator
        .with_exclusive_access(|t| engine.resolve(t, "api.test"))
        .await;

    assert_eq!(
        outcome,
        Err(ResolveError::NoEligibleServer("api.test".to_string()))
    );
    assert_eq!(reply_for(&outcome), "E@NotAssignDomain");
}

#[test]
fn test_longest_prefix_domain_wins() {
    let now = Utc::now();
    let mut topology = Topology::default();
    live_server(&mut topology, "10.0.0.1", ":1", now);
    live_server(&mut topology, "10.0.0.2", ":2", now);
    topology.add_domain("a");
    topology.add_domain("a.b");
    topology.assign("a", "10.0.0.1", ":1", Priority::Primary);
    topology.assign("a.b", "10.0.0.2", ":2", Priority::Primary);
    let engine = ResolutionEngine::with_seed(11);

    let resolved = engine.resolve(&topology, "a.b.c").unwrap();
    assert_eq!(resolved.domain, "a.b");
    assert_eq!(resolved.reply(), "D@10.0.0.2:2");

    let resolved = engine.resolve(&topology, "a.x").unwrap();
    assert_eq!(resolved.domain, "a");
}

#[test]
fn test_seeded_engines_agree() {
    let now = Utc::now();
    let mut topology = Topology::default();
    topology.add_domain("pool");
    for i in 1..=5 {
        let ip = format!("10.0.1.{i}");
        live_server(&mut topology, &ip, ":80", now);
        topology.assign("pool", &ip, ":80", Priority::Primary);
    }

    let first = ResolutionEngine::with_seed(99);
    let second = ResolutionEngine::with_seed(99);
    let a: Vec<_> = (0..50).map(|_| first.resolve(&topology, "pool").unwrap().ip).collect();
    let b: Vec<_> = (0..50).map(|_| second.resolve(&topology, "pool").unwrap().ip).collect();

    assert_eq!(a, b);
}
