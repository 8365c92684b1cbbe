/// Node lifecycle: wires the replication engine to the HTTP surface and
/// runs the buffer-drain background worker.
///
/// A `broadcast::Sender<()>` shutdown channel is subscribed to by every
/// background task, each running its own `tokio::select!` loop.
use crate::config::NodeConfig;
use crate::engine::ReplicationEngine;
use crate::error::{ReplicaError, ReplicaResult};
use crate::http;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;

/// Safety-net tick bounding stall from a missed `Notify` wake.
const DRAIN_TICK: Duration = Duration::from_millis(100);

/// A running node: the engine plus its background drain worker and HTTP
/// listener, torn down together on `stop`.
pub struct Node {
    pub engine: Arc<ReplicationEngine>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Node {
    /// Build the engine for `config` without starting any background
    /// task or listener yet.
    pub fn new(config: &NodeConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            engine: Arc::new(ReplicationEngine::new(config)),
            shutdown_tx,
        }
    }

    /// Start the buffer-drain worker and the HTTP listener, and run
    /// until `shutdown` resolves (typically `tokio::signal::ctrl_c`).
    pub async fn run(&self, bind_addr: std::net::SocketAddr, shutdown: impl std::future::Future<Output = ()>) -> ReplicaResult<()> {
        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .map_err(|e| ReplicaError::ConfigError(format!("failed to bind {bind_addr}: {e}")))?;

        self.serve(listener, shutdown).await
    }

    /// Like [`Node::run`], but serves an already-bound listener. Lets a
    /// caller resolve an ephemeral port (`:0`) before the full peer set
    /// is fixed, which the three-argument startup configuration requires
    /// up front — see `tests/` for the pattern.
    pub async fn serve(&self, listener: tokio::net::TcpListener, shutdown: impl std::future::Future<Output = ()>) -> ReplicaResult<()> {
        self.spawn_drain_worker();

        let addr = listener.local_addr().ok();
        tracing::info!(addr = ?addr, node_id = %self.engine.node_id(), "listening");

        let app = http::router(Arc::clone(&self.engine));
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
            })
            .await
            .map_err(|e| ReplicaError::InvariantViolation(format!("server error: {e}")))?;

        let _ = self.shutdown_tx.send(());
        Ok(())
    }

    /// Signal background tasks to stop. The HTTP listener's own
    /// graceful-shutdown future is driven separately by the caller of
    /// [`Node::run`].
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    fn spawn_drain_worker(&self) {
        let engine = Arc::clone(&self.engine);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(DRAIN_TICK);
            loop {
                tokio::select! {
                    _ = engine.notify.notified() => {
                        let applied = engine.drain_to_fixed_point().await;
                        if applied > 0 {
                            tracing::debug!(applied, "drained buffered messages");
                        }
                    }
                    _ = ticker.tick() => {
                        engine.drain_to_fixed_point().await;
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });
    }
}
