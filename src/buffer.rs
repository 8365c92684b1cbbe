/// The per-node causal-delivery buffer
///
/// Holds inbound replication messages that are not yet causally
/// deliverable. Re-evaluated on every clock advance by the replication
/// engine; see [`crate::engine`] for the draining integration.
use crate::clock::VectorClock;
use crate::message::ReplicationMessage;

/// Holding area for undeliverable inbound replication messages.
///
/// Messages are kept in insertion order so that repeated scans are
/// deterministic: tie-breaks among concurrently-deliverable messages
/// don't affect correctness but should be reproducible for testing.
#[derive(Debug, Default)]
pub struct DeliveryBuffer {
    pending: Vec<ReplicationMessage>,
}

impl DeliveryBuffer {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    /// Append a message that was not deliverable at call time.
    pub fn enqueue(&mut self, msg: ReplicationMessage) {
        self.pending.push(msg);
    }

    /// Number of buffered messages, for observability.
    pub fn size(&self) -> usize {
        self.pending.len()
    }

    /// Pop the first currently-deliverable message under `clock`, in
    /// insertion order, or `None` if no buffered message is deliverable yet.
    ///
    /// Applying a single message at a time (rather than scanning the whole
    /// buffer in one pass) lets the caller re-check deliverability after
    /// each apply, since applying one message can advance the clock enough
    /// to make the next one deliverable.
    pub fn take_deliverable(&mut self, clock: &VectorClock) -> Option<ReplicationMessage> {
        let idx = self
            .pending
            .iter()
            .position(|m| clock.can_deliver(&m.vector_clock, &m.sender_id))?;
        Some(self.pending.remove(idx))
    }
}
