/// Wire and in-memory representation of a replication event.
use crate::clock::VectorClock;
use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single replicated write: `(key, value, sender_clock, sender_id)`.
///
/// This is both the buffered-message shape and the `/replicate` request
/// body — the wire format and the in-memory quadruple are the same
/// named-field record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationMessage {
    pub key: String,
    pub value: JsonValue,
    pub vector_clock: VectorClock,
    pub sender_id: NodeId,
}

impl ReplicationMessage {
    pub fn new(key: impl Into<String>, value: JsonValue, vector_clock: VectorClock, sender_id: NodeId) -> Self {
        Self {
            key: key.into(),
            value,
            vector_clock,
            sender_id,
        }
    }
}
