/// Causal KV node binary.
///
/// Usage: `causal-kv-node <node-id> <listen-port> <peer-list>`, where
/// `peer-list` is a comma-separated `node_id@host:port` list including
/// this node's own entry.
use anyhow::{Context, Result};
use causal_kv::{init_logging, Node, NodeConfig};
use clap::Parser;
use tokio::signal;

/// A causally-consistent replicated key-value store node.
#[derive(Parser)]
#[command(name = "causal-kv-node")]
#[command(version, about, long_about = None)]
struct Cli {
    /// This node's identifier, e.g. "n0". Must appear in `peer_list`.
    node_id: String,

    /// Port to listen on for both client requests and peer replication.
    listen_port: u16,

    /// Comma-separated peer list: "n0@127.0.0.1:5000,n1@127.0.0.1:5001,...".
    /// Includes this node's own entry.
    peer_list: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = NodeConfig::parse(cli.node_id, cli.listen_port, &cli.peer_list)
        .context("invalid startup configuration")?;

    tracing::info!(
        node_id = %config.node_id,
        peers = config.peers.len(),
        "starting node"
    );

    let node = Node::new(&config);
    let bind_addr = config.bind_addr();

    node.run(bind_addr, async {
        signal::ctrl_c().await.ok();
        tracing::info!("shutdown signal received");
    })
    .await
    .context("node run loop failed")?;

    Ok(())
}
