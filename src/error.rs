/// Error types for the replication engine and its surrounding services.
///
/// All fallible operations in this crate return `Result<T, ReplicaError>`.
use thiserror::Error;

/// The crate-wide error type.
#[derive(Error, Debug)]
pub enum ReplicaError {
    /// Key not present in the local store.
    #[error("key '{key}' not found")]
    KeyNotFound {
        /// The key that was queried.
        key: String,
    },

    /// A required field was missing or null on a request body.
    #[error("missing required field '{field}'")]
    MissingField {
        /// The field that was missing.
        field: String,
    },

    /// A replication message referenced a node outside the configured peer set.
    #[error("replication message from unknown node '{node_id}'")]
    UnknownPeer {
        /// The offending sender id.
        node_id: String,
    },

    /// An internal invariant was violated. Fatal for the current request.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Startup configuration was invalid.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// An outbound send to a peer failed. Never surfaced to the client that
    /// triggered the write; logged and dropped at the transport layer.
    #[error("transport error: {0}")]
    TransportError(String),
}

/// Convenience alias used throughout the crate.
pub type ReplicaResult<T> = Result<T, ReplicaError>;
