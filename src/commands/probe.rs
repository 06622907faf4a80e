use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

use xhub::control::{ClientConfig, ResolveReply, ResolverClient};

pub async fn resolve(domain: String, hub: SocketAddr, timeout_secs: u64) -> Result<()> {
    let client =
        ResolverClient::new(ClientConfig::new(hub).with_timeout(Duration::from_secs(timeout_secs)));

    match client
        .resolve(&domain)
        .await
        .with_context(|| format!("Resolution of '{domain}' via {hub} failed"))?
    {
        ResolveReply::Address(addr) => println!("{domain} -> {addr}"),
        ResolveReply::Rejected(reason) => println!("{domain}: {reason}"),
    }
    Ok(())
}

pub async fn send(message: String, hub: SocketAddr) -> Result<()> {
    ResolverClient::new(ClientConfig::new(hub))
        .send_raw(&message)
        .await
        .with_context(|| format!("Failed to send datagram to {hub}"))?;
    println!("Sent {message:?} to {hub}");
    Ok(())
}
