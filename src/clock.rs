/// Vector clock algebra for causal ordering
///
/// A vector clock is a total mapping from every node identifier in the
/// configured peer set to a non-negative logical timestamp. All entries
/// always exist — the representation is dense even though a freshly
/// started clock's entries are semantically zero.
use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A dense, fixed-shape vector clock. Serializes transparently as the
/// object mapping node id to count the wire protocol specifies — never
/// wrapped in its field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    entries: HashMap<NodeId, u64>,
}

impl VectorClock {
    /// Create the all-zero clock for the given node set.
    pub fn zero(nodes: &[NodeId]) -> Self {
        Self {
            entries: nodes.iter().cloned().map(|n| (n, 0)).collect(),
        }
    }

    /// Read this clock's entry for `node`. Absent entries read as zero,
    /// though the dense representation should never actually be missing one.
    pub fn get(&self, node: &NodeId) -> u64 {
        self.entries.get(node).copied().unwrap_or(0)
    }

    /// Every node id this clock carries an entry for.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.entries.keys()
    }

    /// Advance the local node's own entry by one.
    ///
    /// Called on every local write; the local node's own component is
    /// strictly increasing across local writes and applied inbound messages.
    pub fn increment(&mut self, node: &NodeId) {
        let entry = self.entries.entry(node.clone()).or_insert(0);
        *entry += 1;
    }

    /// Merge another clock into this one by taking the per-entry max, then
    /// advance the local node's own entry by one.
    ///
    /// This is the standard causal-broadcast delivery rule: the stamp
    /// installed into the store after this call dominates every causally
    /// preceding event, so subsequent outbound messages from this node
    /// carry a clock that reflects everything it has observed so far.
    pub fn merge_and_bump(&mut self, other: &VectorClock, local: &NodeId) {
        for (node, &value) in &other.entries {
            let entry = self.entries.entry(node.clone()).or_insert(0);
            *entry = (*entry).max(value);
        }
        self.increment(local);
    }

    /// An immutable copy suitable for embedding in a replication message or
    /// a stored entry's stamp.
    pub fn snapshot(&self) -> VectorClock {
        self.clone()
    }

    /// Compare two clocks.
    ///
    /// Returns `-1` if `self < other`, `+1` if `self > other`, and `0` if
    /// equal **or** concurrent — the core algorithms never need to
    /// distinguish the latter two cases, so the conflation is intentional.
    pub fn compare(&self, other: &VectorClock) -> i8 {
        match self.partial_cmp_causal(other) {
            Some(Ordering::Less) => -1,
            Some(Ordering::Greater) => 1,
            _ => 0,
        }
    }

    /// The full causal ordering: `Some(Less)`/`Some(Greater)`/`Some(Equal)`
    /// for comparable clocks, `None` for concurrent ones.
    fn partial_cmp_causal(&self, other: &VectorClock) -> Option<Ordering> {
        let nodes = self.entries.keys().chain(other.entries.keys());
        let mut less = false;
        let mut greater = false;

        for node in nodes {
            match self.get(node).cmp(&other.get(node)) {
                Ordering::Less => less = true,
                Ordering::Greater => greater = true,
                Ordering::Equal => {}
            }
        }

        match (less, greater) {
            (true, true) => None,
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => Some(Ordering::Equal),
        }
    }

    /// `self <= other`.
    pub fn le(&self, other: &VectorClock) -> bool {
        !matches!(self.partial_cmp_causal(other), Some(Ordering::Greater) | None)
    }

    /// The deliverability predicate of the causal-delivery protocol.
    ///
    /// `self` is the receiver's current clock. `sender_clock` is the
    /// message's stamp, sent by `sender`. The message is deliverable when,
    /// for every node `j`: if `j == sender`, `sender_clock[j] == self[j] + 1`
    /// (the message is the sender's immediate next event from this
    /// receiver's point of view); otherwise `sender_clock[j] <= self[j]`
    /// (every causal predecessor from other senders has already been
    /// applied here).
    ///
    /// This is the textbook two-clause causal-broadcast rule. It is
    /// strictly stronger than a naive `sender_clock <= self` test, which
    /// cannot distinguish the sender's genuine next event from a stale
    /// duplicate.
    pub fn can_deliver(&self, sender_clock: &VectorClock, sender: &NodeId) -> bool {
        let nodes = self.entries.keys().chain(sender_clock.entries.keys());
        for node in nodes {
            let theirs = sender_clock.get(node);
            let mine = self.get(node);
            if node == sender {
                if theirs != mine + 1 {
                    return false;
                }
            } else if theirs > mine {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn nodes(k: usize) -> Vec<NodeId> {
        (0..k).map(|i| NodeId::new(format!("n{i}"))).collect()
    }

    #[test]
    fn zero_clock_has_all_entries_zero() {
        let ns = nodes(3);
        let clock = VectorClock::zero(&ns);
        for n in &ns {
            assert_eq!(clock.get(n), 0);
        }
    }

    #[test]
    fn increment_only_advances_own_entry() {
        let ns = nodes(3);
        let mut clock = VectorClock::zero(&ns);
        clock.increment(&ns[0]);
        assert_eq!(clock.get(&ns[0]), 1);
        assert_eq!(clock.get(&ns[1]), 0);
        assert_eq!(clock.get(&ns[2]), 0);
    }

    #[test]
    fn compare_equal_is_zero() {
        let ns = nodes(2);
        let a = VectorClock::zero(&ns);
        let b = VectorClock::zero(&ns);
        assert_eq!(a.compare(&b), 0);
    }

    #[test]
    fn compare_strictly_less_and_greater() {
        let ns = nodes(2);
        let mut a = VectorClock::zero(&ns);
        let b = a.clone();
        a.increment(&ns[0]);
        assert_eq!(a.compare(&b), 1);
        assert_eq!(b.compare(&a), -1);
    }

    #[test]
    fn concurrent_clocks_compare_as_zero() {
        let ns = nodes(2);
        let mut a = VectorClock::zero(&ns);
        let mut b = VectorClock::zero(&ns);
        a.increment(&ns[0]);
        b.increment(&ns[1]);
        assert_eq!(a.compare(&b), 0);
        assert_eq!(b.compare(&a), 0);
    }

    #[test]
    fn merge_and_bump_takes_max_then_increments_self() {
        let ns = nodes(3);
        let mut local = VectorClock::zero(&ns);
        local.increment(&ns[0]); // local: [1,0,0]

        let mut remote = VectorClock::zero(&ns);
        remote.increment(&ns[1]);
        remote.increment(&ns[1]); // remote: [0,2,0]

        local.merge_and_bump(&remote, &ns[0]);
        assert_eq!(local.get(&ns[0]), 2); // max(1,0) then +1
        assert_eq!(local.get(&ns[1]), 2); // max(0,2)
        assert_eq!(local.get(&ns[2]), 0);
    }

    #[test]
    fn can_deliver_requires_immediate_next_event_from_sender() {
        let ns = nodes(2);
        let receiver = VectorClock::zero(&ns);

        // Sender's first event: sender[sender] == receiver[sender] + 1 == 1.
        let mut first = VectorClock::zero(&ns);
        first.increment(&ns[1]);
        assert!(receiver.can_deliver(&first, &ns[1]));

        // A stale duplicate of an already-delivered event is not deliverable
        // again once the receiver's clock has advanced past it.
        let mut advanced = receiver.clone();
        advanced.merge_and_bump(&first, &ns[0]);
        assert!(!advanced.can_deliver(&first, &ns[1]));
    }

    #[test]
    fn can_deliver_blocks_on_missing_third_party_predecessor() {
        let ns = nodes(3);
        let receiver = VectorClock::zero(&ns);

        // A message from n1 whose clock also depends on an event at n2 that
        // the receiver has not yet seen must not be deliverable.
        let mut msg = VectorClock::zero(&ns);
        msg.increment(&ns[1]);
        msg.increment(&ns[2]);

        assert!(!receiver.can_deliver(&msg, &ns[1]));
    }

    proptest! {
        #[test]
        fn increment_is_monotonic(steps in 1u32..50) {
            let ns = nodes(2);
            let mut clock = VectorClock::zero(&ns);
            let mut prev = 0u64;
            for _ in 0..steps {
                clock.increment(&ns[0]);
                let cur = clock.get(&ns[0]);
                prop_assert!(cur > prev);
                prev = cur;
            }
        }

        #[test]
        fn compare_is_antisymmetric(a_steps in 0u32..10, b_steps in 0u32..10) {
            let ns = nodes(2);
            let mut a = VectorClock::zero(&ns);
            let mut b = VectorClock::zero(&ns);
            for _ in 0..a_steps { a.increment(&ns[0]); }
            for _ in 0..b_steps { b.increment(&ns[1]); }
            prop_assert_eq!(a.compare(&b), -b.compare(&a));
        }
    }
}
