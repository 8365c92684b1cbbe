/// HTTP request surface
///
/// Thin JSON-over-HTTP glue in front of the replication engine: `GET
/// /health`, `GET /get/:key`, `POST /put`, `POST /replicate`, `GET
/// /status`. Validation failures and not-found map to 4xx; the engine
/// itself never returns an error for a well-formed request.
use crate::clock::VectorClock;
use crate::engine::ReplicationEngine;
use crate::error::ReplicaError;
use crate::ids::NodeId;
use crate::message::ReplicationMessage;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Build the axum router over a shared engine handle.
pub fn router(engine: Arc<ReplicationEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/get/:key", get(get_key))
        .route("/put", post(put_key))
        .route("/replicate", post(replicate))
        .route("/status", get(status))
        .with_state(engine)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    node_id: NodeId,
    vector_clock: VectorClock,
    kv_store_size: usize,
}

async fn health(State(engine): State<Arc<ReplicationEngine>>) -> Json<HealthResponse> {
    let status = engine.status().await;
    Json(HealthResponse {
        status: "ok",
        node_id: status.node_id,
        vector_clock: status.vector_clock,
        kv_store_size: status.kv_store_size,
    })
}

#[derive(Debug, Serialize)]
struct GetResponse {
    key: String,
    value: JsonValue,
    vector_clock: VectorClock,
    node_id: NodeId,
}

async fn get_key(
    State(engine): State<Arc<ReplicationEngine>>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>, ReplicaError> {
    let entry = engine.get(&key).await?;

    Ok(Json(GetResponse {
        key,
        value: entry.value,
        vector_clock: entry.stamp,
        node_id: engine.node_id().clone(),
    }))
}

#[derive(Debug, Deserialize)]
struct PutRequest {
    key: Option<String>,
    value: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
struct PutResponse {
    key: String,
    value: JsonValue,
    vector_clock: VectorClock,
    node_id: NodeId,
}

async fn put_key(
    State(engine): State<Arc<ReplicationEngine>>,
    Json(request): Json<PutRequest>,
) -> Result<Json<PutResponse>, ReplicaError> {
    let key = request.key.ok_or_else(|| ReplicaError::MissingField { field: "key".into() })?;
    let value = request
        .value
        .ok_or_else(|| ReplicaError::MissingField { field: "value".into() })?;

    let vector_clock = engine.put(key.clone(), value.clone()).await;
    Ok(Json(PutResponse {
        key,
        value,
        vector_clock,
        node_id: engine.node_id().clone(),
    }))
}

#[derive(Debug, Deserialize)]
struct ReplicateRequest {
    key: Option<String>,
    value: Option<JsonValue>,
    vector_clock: Option<VectorClock>,
    sender_id: Option<NodeId>,
}

#[derive(Debug, Serialize)]
struct ReplicateResponse {
    status: &'static str,
}

async fn replicate(
    State(engine): State<Arc<ReplicationEngine>>,
    Json(request): Json<ReplicateRequest>,
) -> Result<Json<ReplicateResponse>, ReplicaError> {
    let key = request.key.ok_or_else(|| ReplicaError::MissingField { field: "key".into() })?;
    let value = request
        .value
        .ok_or_else(|| ReplicaError::MissingField { field: "value".into() })?;
    let vector_clock = request
        .vector_clock
        .ok_or_else(|| ReplicaError::MissingField { field: "vector_clock".into() })?;
    let sender_id = request
        .sender_id
        .ok_or_else(|| ReplicaError::MissingField { field: "sender_id".into() })?;

    engine
        .receive(ReplicationMessage::new(key, value, vector_clock, sender_id))
        .await?;

    Ok(Json(ReplicateResponse { status: "received" }))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    node_id: NodeId,
    vector_clock: VectorClock,
    kv_store: HashMap<String, JsonValue>,
    buffer_size: usize,
}

async fn status(State(engine): State<Arc<ReplicationEngine>>) -> Json<StatusResponse> {
    let status = engine.status().await;
    let kv_store = status
        .kv_store
        .into_iter()
        .map(|(key, entry)| (key, entry.value))
        .collect();

    Json(StatusResponse {
        node_id: status.node_id,
        vector_clock: status.vector_clock,
        kv_store,
        buffer_size: status.buffer_size,
    })
}

impl IntoResponse for ReplicaError {
    fn into_response(self) -> Response {
        let status = match &self {
            ReplicaError::KeyNotFound { .. } => StatusCode::NOT_FOUND,
            ReplicaError::MissingField { .. } | ReplicaError::UnknownPeer { .. } => StatusCode::BAD_REQUEST,
            ReplicaError::InvariantViolation(_)
            | ReplicaError::ConfigError(_)
            | ReplicaError::TransportError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::debug!(error = %self, %status, "request-surface error");
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}
