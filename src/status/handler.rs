use crate::ingest::queue::IntakeQueue;
use crate::pipeline::metrics::SharedMetrics;
use crate::storage::writer::EventStore;
use crate::types::{HealthResponse, StatsResponse};
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

pub struct StatusState {
    pub store: Arc<dyn EventStore>,
    pub queue: IntakeQueue,
    pub metrics: SharedMetrics,
}

/// GET /health - Database reachability and queue depth.
pub async fn health(State(state): State<Arc<StatusState>>) -> Json<HealthResponse> {
    let db_ok = state.store.ping().await;

    Json(HealthResponse {
        status: if db_ok {
            "ok".into()
        } else {
            "degraded".into()
        },
        db_ok,
        queue_depth: state.queue.len(),
        queue_capacity: state.queue.capacity(),
    })
}

/// GET /v1/stats - Pipeline counters since process start.
pub async fn stats(State(state): State<Arc<StatusState>>) -> Json<StatsResponse> {
    let snap = state.metrics.snapshot();

    Json(StatsResponse {
        accepted: snap.accepted,
        rejected: snap.rejected,
        queue_full: snap.queue_full,
        parse_failures: snap.parse_failures,
        writes_ok: snap.writes_ok,
        write_failures: snap.write_failures,
        queue_depth: state.queue.len(),
    })
}
