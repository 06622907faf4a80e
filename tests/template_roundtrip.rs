//! Template backup/restore round trip

use chrono::Utc;
use proptest::prelude::*;
use xhub::codec;
use xhub::storage::AssetStore;
use xhub::topology::{Priority, Topology};

const MODULES: &[&str] = &["app.jar", "web.jar"];

#[derive(Debug, Clone)]
struct ServerSpec {
    port: String,
    module: Option<usize>,
    name: String,
}

#[derive(Debug, Clone)]
struct Spec {
    domains: Vec<String>,
    nodes: Vec<(String, Vec<ServerSpec>)>,
    assignments: Vec<(usize, usize, usize, bool)>,
}

fn server_spec() -> impl Strategy<Value = ServerSpec> {
    (
        ":[0-9]{2,4}",
        proptest::option::of(0..MODULES.len()),
        "[A-Za-z0-9 >\\]\n\r-]{0,12}",
    )
        .prop_map(|(port, module, name)| ServerSpec { port, module, name })
}

fn spec() -> impl Strategy<Value = Spec> {
    (
        proptest::collection::vec("[a-z>\n]{0,6}(\\.[a-z]{1,4})?", 0..5),
        proptest::collection::vec(
            ("10\\.0\\.[0-9]\\.[1-9]", proptest::collection::vec(server_spec(), 0..4)),
            0..4,
        ),
        proptest::collection::vec((0usize..16, 0usize..16, 0usize..16, any::<bool>()), 0..10),
    )
        .prop_map(|(domains, nodes, assignments)| Spec {
            domains,
            nodes,
            assignments,
        })
}

fn build(spec: &Spec) -> Topology {
    let now = Utc::now();
    let mut topology = Topology::new("generated");
    for domain in &spec.domains {
        topology.add_domain(domain);
    }
    for (ip, servers) in &spec.nodes {
        topology.upsert_node(ip, now);
        for server in servers {
            let entry = topology
                .upsert_server(ip, &server.port, now)
                .expect("node was just created");
            entry.module = server.module.map(|i| MODULES[i].to_string()).unwrap_or_default();
            topology.rename_server(ip, &server.port, &server.name);
        }
    }

    let servers: Vec<(String, String)> = topology
        .nodes()
        .flat_map(|n| n.servers().map(|s| (n.ip().to_string(), s.port().to_string())))
        .collect();
    let domains: Vec<String> = topology.domains().map(|d| d.key().to_string()).collect();
    if !servers.is_empty() && !domains.is_empty() {
        for (server, domain, _, primary) in &spec.assignments {
            let (ip, port) = &servers[server % servers.len()];
            let priority = if *primary {
                Priority::Primary
            } else {
                Priority::Secondary
            };
            topology.assign(&domains[domain % domains.len()], ip, port, priority);
        }
    }
    topology
}

fn sorted_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    lines.sort();
    lines
}

fn asset_dir() -> (tempfile::TempDir, AssetStore) {
    let dir = tempfile::tempdir().unwrap();
    for module in MODULES {
        std::fs::write(dir.path().join(module), b"module").unwrap();
    }
    let store = AssetStore::new(dir.path(), "xhub_descriptions.json");
    (dir, store)
}

proptest! {
    #[test]
    fn test_backup_restore_backup_is_stable(spec in spec()) {
        let (_dir, assets) = asset_dir();
        let original = build(&spec);
        let text = codec::backup(&original);

        let restored = codec::restore("roundtrip", &text, &assets);

        prop_assert_eq!(sorted_lines(&codec::backup(&restored)), sorted_lines(&text));
        prop_assert_eq!(restored.assignment_count(), original.assignment_count());
    }
}

#[test]
fn test_restore_without_assets_drops_modules_only() {
    let dir = tempfile::tempdir().unwrap();
    let assets = AssetStore::new(dir.path(), "xhub_descriptions.json");
    let text = "D>api\nN>10.0.0.1\nS>10.0.0.1>:9000>app.jar\nA>10.0.0.1>:9000>api>1\n";

    let restored = codec::restore("t", text, &assets);

    assert_eq!(
        codec::backup(&restored),
        "D>api\nN>10.0.0.1\nS>10.0.0.1>:9000\nA>10.0.0.1>:9000>api>1\n"
    );
}

#[test]
fn test_restore_assigns_fresh_classes() {
    let (_dir, assets) = asset_dir();
    let restored = codec::restore("t", "D>a\nD>b\n", &assets);

    let classes: Vec<_> = restored.domains().map(|d| d.class.clone()).collect();
    assert_eq!(classes.len(), 2);
    assert_ne!(classes[0], classes[1]);
}

#[test]
fn test_multiline_name_cannot_inject_records() {
    let (_dir, assets) = asset_dir();
    let now = Utc::now();
    let mut topology = Topology::new("t");
    topology.upsert_node("10.0.0.1", now);
    topology.upsert_server("10.0.0.1", ":9000", now);

    assert!(!topology.rename_server("10.0.0.1", ":9000", "x\nD>injected"));
    let restored = codec::restore("t", &codec::backup(&topology), &assets);

    assert_eq!(restored.domain_count(), 0);
    assert_eq!(restored.server("10.0.0.1", ":9000").unwrap().name, "");
}

#[test]
fn test_unencodable_domain_keys_are_never_exported() {
    let (_dir, assets) = asset_dir();
    let now = Utc::now();
    let mut topology = Topology::new("t");
    topology.upsert_node("10.0.0.1", now);
    topology.upsert_server("10.0.0.1", ":9000", now);
    for key in ["", "a>b"] {
        topology.add_domain(key);
        topology.assign(key, "10.0.0.1", ":9000", Priority::Primary);
    }

    let text = codec::backup(&topology);
    assert_eq!(text, "N>10.0.0.1\nS>10.0.0.1>:9000\n");
    let restored = codec::restore("t", &text, &assets);
    assert_eq!(codec::backup(&restored), text);
}
