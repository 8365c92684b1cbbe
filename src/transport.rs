/// Peer transport
///
/// Point-to-point, best-effort fan-out of a replication message to every
/// other peer. Delivery is per-peer independent: a slow or unreachable
/// peer never blocks another, and a failed send is logged and dropped —
/// there is no retry queue at this layer.
use crate::config::PeerEntry;
use crate::message::ReplicationMessage;
use std::time::Duration;

/// Per-send timeout.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends replication messages to a fixed set of peers.
pub struct PeerTransport {
    client: reqwest::Client,
    peers: Vec<PeerEntry>,
}

impl PeerTransport {
    /// Build a transport over the given remote peers (the caller is
    /// expected to have already excluded this node's own entry by
    /// identity — see [`crate::config::NodeConfig::remote_peers`]).
    pub fn new(peers: Vec<PeerEntry>) -> Self {
        Self {
            client: reqwest::Client::new(),
            peers,
        }
    }

    /// Fan out `msg` to every configured peer concurrently. Each send is
    /// an independent unit of work with its own timeout; errors never
    /// propagate to the caller, whose PUT has already completed locally.
    pub fn fan_out(&self, msg: ReplicationMessage) {
        for peer in &self.peers {
            let client = self.client.clone();
            let addr = peer.addr;
            let peer_id = peer.node_id.clone();
            let msg = msg.clone();

            tokio::spawn(async move {
                let url = format!("http://{addr}/replicate");
                let result = client
                    .post(&url)
                    .timeout(SEND_TIMEOUT)
                    .json(&msg)
                    .send()
                    .await;

                match result {
                    Ok(resp) if resp.status().is_success() => {
                        tracing::debug!(peer = %peer_id, key = %msg.key, "replicated");
                    }
                    Ok(resp) => {
                        tracing::warn!(peer = %peer_id, status = %resp.status(), "peer rejected replication");
                    }
                    Err(e) => {
                        tracing::warn!(peer = %peer_id, error = %e, "failed to replicate to peer");
                    }
                }
            });
        }
    }
}
