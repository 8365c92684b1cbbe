/// Startup configuration
///
/// Three positional CLI arguments are parsed into a [`NodeConfig`]: this
/// node's identifier, its listen port, and the peer list.
///
/// # Peer list format
///
/// Each entry is `node_id@host:port`, comma-separated, and the list
/// includes this node's own entry — the engine filters self-addressed
/// sends by identity, not by host:port. Carrying the identifier alongside
/// the address is what makes that possible: a bare `host:port` list
/// cannot support identity-based self-skip or identity-based discard of
/// self-echoed replication, so the wire format is extended to carry
/// identity explicitly. See DESIGN.md.
///
/// A malformed peer entry is logged and skipped rather than aborting
/// startup, since the rest of the cluster may still be reachable; a
/// missing self entry is logged and synthesized, since peers may come up
/// later and the vector clock still needs a dense entry for every node.
/// Duplicate node ids are the one condition rejected outright: the dense,
/// fixed-cardinality clock isn't well-defined if two entries share an id.
use crate::error::{ReplicaError, ReplicaResult};
use crate::ids::NodeId;
use std::collections::HashSet;
use std::net::SocketAddr;

/// A single entry in the configured peer set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    pub node_id: NodeId,
    pub addr: SocketAddr,
}

/// Fully-parsed, validated startup configuration for one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub listen_port: u16,
    /// The full, fixed peer set, including this node's own entry.
    pub peers: Vec<PeerEntry>,
}

impl NodeConfig {
    /// Parse and validate the three positional arguments.
    pub fn parse(node_id: impl Into<String>, listen_port: u16, peer_list: &str) -> ReplicaResult<Self> {
        let node_id = NodeId::new(node_id.into());
        let mut peers = parse_peer_list(peer_list);

        let mut seen = HashSet::new();
        for peer in &peers {
            if !seen.insert(peer.node_id.clone()) {
                return Err(ReplicaError::ConfigError(format!(
                    "duplicate node id '{}' in peer list",
                    peer.node_id
                )));
            }
        }

        if !peers.iter().any(|p| p.node_id == node_id) {
            tracing::warn!(
                %node_id,
                "this node's id does not appear in its own peer list; adding it so the vector clock stays dense"
            );
            peers.push(PeerEntry {
                node_id: node_id.clone(),
                addr: SocketAddr::from(([127, 0, 0, 1], listen_port)),
            });
        }

        Ok(Self {
            node_id,
            listen_port,
            peers,
        })
    }

    /// All node identifiers in the fixed cluster, in peer-list order.
    pub fn all_node_ids(&self) -> Vec<NodeId> {
        self.peers.iter().map(|p| p.node_id.clone()).collect()
    }

    /// The peer entries excluding this node's own, by identity.
    pub fn remote_peers(&self) -> Vec<&PeerEntry> {
        self.peers.iter().filter(|p| p.node_id != self.node_id).collect()
    }

    /// The bind address for this node's own HTTP listener.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.listen_port))
    }
}

/// Parse every entry, warning on and skipping any that are malformed rather
/// than aborting the whole node — a single bad peer entry shouldn't keep
/// the rest of the cluster from starting.
fn parse_peer_list(peer_list: &str) -> Vec<PeerEntry> {
    peer_list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| match parse_peer_entry(entry) {
            Ok(peer) => Some(peer),
            Err(e) => {
                tracing::warn!(entry, error = %e, "skipping malformed peer list entry");
                None
            }
        })
        .collect()
}

fn parse_peer_entry(entry: &str) -> ReplicaResult<PeerEntry> {
    let (id, addr) = entry.split_once('@').ok_or_else(|| {
        ReplicaError::ConfigError(format!(
            "peer entry '{entry}' is not in 'node_id@host:port' form"
        ))
    })?;

    if id.is_empty() {
        return Err(ReplicaError::ConfigError(format!(
            "peer entry '{entry}' has an empty node id"
        )));
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| ReplicaError::ConfigError(format!("invalid peer address '{addr}': {e}")))?;

    Ok(PeerEntry {
        node_id: NodeId::new(id),
        addr,
    })
}
