//! A causally-consistent replicated key-value store over a fixed peer set.
//!
//! The core is the replication engine: vector-clock algebra, a per-node
//! causal-delivery buffer, and the write/replicate state machine. See
//! [`engine::ReplicationEngine`] for the entry point.

pub mod buffer;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod ids;
pub mod message;
pub mod node;
pub mod store;
pub mod transport;

pub use clock::VectorClock;
pub use config::{NodeConfig, PeerEntry};
pub use engine::{EngineStatus, ReplicationEngine};
pub use error::{ReplicaError, ReplicaResult};
pub use ids::NodeId;
pub use message::ReplicationMessage;
pub use node::Node;
pub use store::{KvStore, StoredEntry};

/// Initialize `tracing` from the `CAUSAL_KV_LOG` environment variable,
/// defaulting to `info`.
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("CAUSAL_KV_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
