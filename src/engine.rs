/// The replication engine
///
/// Owns the vector clock, the KV store, and the delivery buffer, and
/// serialises every mutation to them behind a single coordination lock.
/// The lock is held only for local bookkeeping — clock arithmetic, map
/// update, buffer scan — never across network I/O.
use crate::buffer::DeliveryBuffer;
use crate::clock::VectorClock;
use crate::config::NodeConfig;
use crate::error::{ReplicaError, ReplicaResult};
use crate::ids::NodeId;
use crate::message::ReplicationMessage;
use crate::store::{KvStore, StoredEntry};
use crate::transport::PeerTransport;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use tokio::sync::{Mutex, Notify};

/// The clock, store, and buffer, mutated together under one lock.
struct EngineState {
    clock: VectorClock,
    store: KvStore,
    buffer: DeliveryBuffer,
}

/// A point-in-time view of engine state, for the `/health` and `/status`
/// request-surface endpoints.
pub struct EngineStatus {
    pub node_id: NodeId,
    pub vector_clock: VectorClock,
    pub kv_store_size: usize,
    pub kv_store: HashMap<String, StoredEntry>,
    pub buffer_size: usize,
}

/// Orchestrates local-write stamping, outbound fan-out, inbound
/// deliverability checks, and buffer integration.
pub struct ReplicationEngine {
    local_id: NodeId,
    known_nodes: HashSet<NodeId>,
    state: Mutex<EngineState>,
    transport: PeerTransport,
    /// Wakes the buffer-drain background worker whenever the clock may
    /// have advanced (new local write, new applied message) or a new
    /// message was enqueued.
    pub(crate) notify: Notify,
}

impl ReplicationEngine {
    /// Build a fresh engine for the given startup configuration. The
    /// clock starts all-zero over the full, fixed node set.
    pub fn new(config: &NodeConfig) -> Self {
        let nodes = config.all_node_ids();
        let remote_peers = config.remote_peers().into_iter().cloned().collect();
        let known_nodes = nodes.iter().cloned().collect();

        Self {
            local_id: config.node_id.clone(),
            known_nodes,
            state: Mutex::new(EngineState {
                clock: VectorClock::zero(&nodes),
                store: KvStore::new(),
                buffer: DeliveryBuffer::new(),
            }),
            transport: PeerTransport::new(remote_peers),
            notify: Notify::new(),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.local_id
    }

    /// Local write: stamp, install, and fan out.
    ///
    /// Steps 1-5 (increment, install, release lock) happen under the
    /// engine lock; step 6 (fan-out) is dispatched only after the lock
    /// is released, since it must never block on network I/O.
    pub async fn put(&self, key: String, value: JsonValue) -> VectorClock {
        let (snapshot, outbound) = {
            let mut state = self.state.lock().await;
            state.clock.increment(&self.local_id);
            let snapshot = state.clock.snapshot();
            state.store.put(key.clone(), value.clone(), snapshot.clone());
            let outbound = ReplicationMessage::new(key, value, snapshot.clone(), self.local_id.clone());
            (snapshot, outbound)
        };

        self.notify.notify_one();
        self.transport.fan_out(outbound);
        snapshot
    }

    /// Read the current value for `key`, or `ReplicaError::KeyNotFound`.
    pub async fn get(&self, key: &str) -> ReplicaResult<StoredEntry> {
        let state = self.state.lock().await;
        state
            .store
            .get(key)
            .cloned()
            .ok_or_else(|| ReplicaError::KeyNotFound { key: key.to_string() })
    }

    /// Inbound replication. Rejects messages referencing a node outside the
    /// configured peer set, discards self-echoed messages, applies
    /// immediately if deliverable, otherwise buffers. Applying may in
    /// turn make previously-buffered messages deliverable, so every
    /// apply is followed by an opportunistic drain to fixed point.
    pub async fn receive(&self, msg: ReplicationMessage) -> ReplicaResult<()> {
        if msg.sender_id == self.local_id {
            tracing::debug!(sender = %msg.sender_id, "discarding self-echoed replication");
            return Ok(());
        }

        self.reject_unknown_nodes(&msg)?;

        {
            let mut state = self.state.lock().await;
            if state.clock.can_deliver(&msg.vector_clock, &msg.sender_id) {
                apply_locked(&mut state, &self.local_id, msg);
                drain_locked(&mut state, &self.local_id);
            } else {
                tracing::debug!(sender = %msg.sender_id, key = %msg.key, "buffering undeliverable message");
                state.buffer.enqueue(msg);
            }
        }

        self.notify.notify_one();
        Ok(())
    }

    /// Every node id a message touches — its sender and every entry in its
    /// vector clock — must belong to this node's configured peer set.
    fn reject_unknown_nodes(&self, msg: &ReplicationMessage) -> ReplicaResult<()> {
        if !self.known_nodes.contains(&msg.sender_id) {
            return Err(ReplicaError::UnknownPeer {
                node_id: msg.sender_id.to_string(),
            });
        }
        for node in msg.vector_clock.node_ids() {
            if !self.known_nodes.contains(node) {
                return Err(ReplicaError::UnknownPeer {
                    node_id: node.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Drain the buffer to a fixed point under the engine lock. Returns
    /// the number of messages applied. Called by the background worker
    /// on every wake (enqueue, apply, or the periodic safety-net tick).
    pub async fn drain_to_fixed_point(&self) -> usize {
        let mut state = self.state.lock().await;
        drain_locked(&mut state, &self.local_id)
    }

    /// A consistent snapshot of clock, store, and buffer size, taken
    /// under the engine lock, for `/health` and `/status`.
    pub async fn status(&self) -> EngineStatus {
        let state = self.state.lock().await;
        EngineStatus {
            node_id: self.local_id.clone(),
            vector_clock: state.clock.snapshot(),
            kv_store_size: state.store.len(),
            kv_store: state.store.snapshot(),
            buffer_size: state.buffer.size(),
        }
    }
}

fn apply_locked(state: &mut EngineState, local_id: &NodeId, msg: ReplicationMessage) {
    state.clock.merge_and_bump(&msg.vector_clock, local_id);
    let stamp = state.clock.snapshot();
    state.store.put(msg.key, msg.value, stamp);
}

fn drain_locked(state: &mut EngineState, local_id: &NodeId) -> usize {
    let mut applied = 0;
    while let Some(msg) = state.buffer.take_deliverable(&state.clock) {
        apply_locked(state, local_id, msg);
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn three_node_config(id: &str) -> NodeConfig {
        NodeConfig::parse(
            id,
            0,
            "n0@127.0.0.1:1,n1@127.0.0.1:2,n2@127.0.0.1:3",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn solo_write_stamps_only_own_entry() {
        let engine = ReplicationEngine::new(&three_node_config("n0"));
        let clock = engine.put("k".into(), json!("hello")).await;

        assert_eq!(clock.get(&NodeId::new("n0")), 1);
        assert_eq!(clock.get(&NodeId::new("n1")), 0);
        assert_eq!(clock.get(&NodeId::new("n2")), 0);

        let entry = engine.get("k").await.unwrap();
        assert_eq!(entry.value, json!("hello"));
    }

    #[tokio::test]
    async fn get_missing_key_is_key_not_found() {
        let engine = ReplicationEngine::new(&three_node_config("n0"));
        let err = engine.get("nope").await.unwrap_err();
        assert!(matches!(err, ReplicaError::KeyNotFound { .. }));
    }

    #[tokio::test]
    async fn receive_from_unconfigured_sender_is_rejected() {
        let engine = ReplicationEngine::new(&three_node_config("n0"));
        let stranger = NodeId::new("n9");
        let mut clock = VectorClock::zero(&[stranger.clone()]);
        clock.increment(&stranger);

        let err = engine
            .receive(ReplicationMessage::new("k", json!("x"), clock, stranger))
            .await
            .unwrap_err();
        assert!(matches!(err, ReplicaError::UnknownPeer { .. }));
        assert!(engine.get("k").await.is_err());
    }

    #[tokio::test]
    async fn receive_with_clock_entry_for_unconfigured_node_is_rejected() {
        let engine = ReplicationEngine::new(&three_node_config("n2"));
        let mut nodes = engine_nodes();
        nodes.push(NodeId::new("n9"));
        let mut clock = VectorClock::zero(&nodes);
        clock.increment(&NodeId::new("n1"));
        clock.increment(&NodeId::new("n9"));

        let err = engine
            .receive(ReplicationMessage::new("k", json!("x"), clock, NodeId::new("n1")))
            .await
            .unwrap_err();
        assert!(matches!(err, ReplicaError::UnknownPeer { .. }));
    }

    #[tokio::test]
    async fn receive_applies_immediately_when_deliverable() {
        let engine = ReplicationEngine::new(&three_node_config("n0"));
        let mut sender_clock = VectorClock::zero(&engine_nodes());
        sender_clock.increment(&NodeId::new("n1"));

        engine
            .receive(ReplicationMessage::new(
                "k",
                json!("from-n1"),
                sender_clock,
                NodeId::new("n1"),
            ))
            .await
            .unwrap();

        let entry = engine.get("k").await.unwrap();
        assert_eq!(entry.value, json!("from-n1"));
        let status = engine.status().await;
        assert_eq!(status.buffer_size, 0);
    }

    #[tokio::test]
    async fn receive_buffers_then_drains_out_of_order_arrival() {
        let engine = ReplicationEngine::new(&three_node_config("n2"));

        // n1's second event depends on its first, which hasn't arrived yet.
        let mut second = VectorClock::zero(&engine_nodes());
        second.increment(&NodeId::new("n1"));
        second.increment(&NodeId::new("n1"));
        engine
            .receive(ReplicationMessage::new("k", json!("B"), second, NodeId::new("n1")))
            .await
            .unwrap();

        assert_eq!(engine.status().await.buffer_size, 1);
        // Buffered message hasn't been applied.
        assert!(engine.get("k").await.is_err());

        let mut first = VectorClock::zero(&engine_nodes());
        first.increment(&NodeId::new("n1"));
        engine
            .receive(ReplicationMessage::new("k", json!("A"), first, NodeId::new("n1")))
            .await
            .unwrap();

        // Releasing the predecessor drains the buffered successor too.
        assert_eq!(engine.status().await.buffer_size, 0);
        let entry = engine.get("k").await.unwrap();
        assert_eq!(entry.value, json!("B"));
    }

    #[tokio::test]
    async fn self_echo_is_discarded() {
        let engine = ReplicationEngine::new(&three_node_config("n0"));
        let mut clock = VectorClock::zero(&engine_nodes());
        clock.increment(&NodeId::new("n0"));

        engine
            .receive(ReplicationMessage::new("k", json!("echo"), clock, NodeId::new("n0")))
            .await
            .unwrap();

        assert!(engine.get("k").await.is_err());
        assert_eq!(engine.status().await.buffer_size, 0);
    }

    fn engine_nodes() -> Vec<NodeId> {
        vec![NodeId::new("n0"), NodeId::new("n1"), NodeId::new("n2")]
    }
}
