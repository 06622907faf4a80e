//! Operator commands through the shared hub context

mod common;

use chrono::Utc;
use common::{live_server, HubFixture};
use serde_json::json;
use std::time::Duration;
use xhub::coordinator::OperatorCommand;
use xhub::topology::{Priority, ServerStatus, Topology};

fn command(value: serde_json::Value) -> OperatorCommand {
    OperatorCommand::from_value(value).expect("valid command")
}

fn two_nodes() -> Topology {
    let now = Utc::now();
    let mut topology = Topology::default();
    live_server(&mut topology, "127.0.0.1", ":9000", now);
    live_server(&mut topology, "127.0.0.1", ":9001", now);
    live_server(&mut topology, "10.0.0.2", ":9000", now);
    topology
}

/// Every assignment is reachable from its domain and from its server
fn assert_links_consistent(topology: &Topology) {
    let mut from_domains = 0;
    for domain in topology.domains() {
        for record in topology.assignments_of_domain(domain.key()) {
            let on_server = topology.assignments_of_server(record.node_ip(), record.port());
            assert!(on_server.iter().any(|a| a.domain() == domain.key()));
            from_domains += 1;
        }
    }
    let mut from_servers = 0;
    for node in topology.nodes() {
        for server in node.servers() {
            for record in topology.assignments_of_server(node.ip(), server.port()) {
                assert!(topology.domain(record.domain()).is_some());
                from_servers += 1;
            }
        }
    }
    assert_eq!(from_domains, from_servers);
    assert_eq!(from_domains, topology.assignment_count());
}

#[tokio::test]
async fn test_assign_twice_keeps_single_record() {
    let fixture = HubFixture::with_topology(&[], two_nodes()).await;
    let hub = &fixture.context;

    hub.execute(command(json!({"key": "addDomain", "name": "api.test"}))).await;
    for priority in ["1", "2"] {
        hub.execute(command(json!({
            "key": "assign", "ip": "10.0.0.2", "port": ":9000",
            "domain": "api.test", "priority": priority
        })))
        .await;
    }

    let view = hub.view().await;
    let domain = view.domains.iter().find(|d| d.key == "api.test").unwrap();
    assert_eq!(domain.assignments.len(), 1);
    assert_eq!(domain.assignments[0].priority, Priority::Secondary);
}

#[tokio::test]
async fn test_exclude_and_del_domain_keep_links_consistent() {
    let fixture = HubFixture::with_topology(&[], two_nodes()).await;
    let hub = &fixture.context;

    for name in ["api.test", "web.test"] {
        hub.execute(command(json!({"key": "addDomain", "name": name}))).await;
    }
    for (ip, port, domain) in [
        ("127.0.0.1", ":9000", "api.test"),
        ("127.0.0.1", ":9001", "api.test"),
        ("10.0.0.2", ":9000", "api.test"),
        ("10.0.0.2", ":9000", "web.test"),
    ] {
        hub.execute(command(json!({
            "key": "assign", "ip": ip, "port": port, "domain": domain, "priority": "1"
        })))
        .await;
    }

    hub.execute(command(json!({
        "key": "exclude", "ip": "127.0.0.1", "port": ":9000", "domain": "api.test"
    })))
    .await;
    let remaining = hub
        .coordinator
        .with_exclusive_access(|t| {
            assert_links_consistent(t);
            t.assignments_of_domain("api.test")
                .iter()
                .map(|a| format!("{}{}", a.node_ip(), a.port()))
                .collect::<Vec<_>>()
        })
        .await;
    assert_eq!(remaining, vec!["127.0.0.1:9001".to_string()]);

    hub.execute(command(json!({"key": "delDomain", "name": "api.test"}))).await;
    hub.coordinator
        .with_exclusive_access(|t| {
            assert_links_consistent(t);
            assert!(t.domain("api.test").is_none());
            assert_eq!(t.assignment_count(), 1);
        })
        .await;
}

#[tokio::test]
async fn test_stop_server_sends_command_to_node() {
    let fixture = HubFixture::with_topology(&[], two_nodes()).await;
    let hub = &fixture.context;

    let outcome = hub
        .execute(command(json!({"key": "stopServer", "ip": "127.0.0.1", "port": ":9001"})))
        .await;
    assert!(outcome.applied);

    assert_eq!(
        fixture.next_command(Duration::from_secs(3)).await.as_deref(),
        Some("C>:9001")
    );
    let status = hub
        .coordinator
        .with_exclusive_access(|t| t.server("127.0.0.1", ":9001").unwrap().status())
        .await;
    assert_eq!(status, ServerStatus::Synchronizing);
}

#[tokio::test]
async fn test_set_module_pushes_new_module() {
    let fixture = HubFixture::with_topology(&["next.jar"], two_nodes()).await;
    let hub = &fixture.context;

    hub.execute(command(json!({
        "key": "setModule", "ip": "127.0.0.1", "port": ":9000", "name": "next.jar"
    })))
    .await;

    assert_eq!(
        fixture.next_command(Duration::from_secs(3)).await.as_deref(),
        Some("S>:9000>next.jar")
    );
}

#[tokio::test]
async fn test_skipped_commands_send_nothing() {
    let fixture = HubFixture::with_topology(&[], two_nodes()).await;
    let hub = &fixture.context;

    let outcomes = [
        hub.execute(command(json!({"key": "startServer", "ip": "127.0.0.1", "port": ":9000"})))
            .await,
        hub.execute(command(json!({"key": "stopNode", "ip": "10.9.9.9"}))).await,
        hub.execute(command(json!({"key": "syncServer", "ip": "127.0.0.1", "port": ":9000"})))
            .await,
    ];

    assert!(outcomes.iter().all(|o| !o.applied && o.dispatches.is_empty()));
    assert_eq!(fixture.next_command(Duration::from_millis(200)).await, None);
}

#[tokio::test]
async fn test_remove_file_updates_descriptions_store() {
    let fixture = HubFixture::new(&["app.jar"]).await;
    let hub = &fixture.context;
    hub.coordinator
        .with_exclusive_access(|t| {
            t.descriptions
                .insert("app.jar".to_string(), "main service".to_string());
        })
        .await;

    hub.execute(command(json!({"key": "removeFile", "name": "app.jar"}))).await;

    assert!(!hub.assets().exists("app.jar"));
    assert!(hub.files().await.unwrap().is_empty());
    assert!(hub.executor.descriptions().load().is_empty());
}
