use crate::config::IngestConfig;
use crate::ingest::handler::{self, IngestState};
use crate::ingest::queue::IntakeQueue;
use crate::pipeline::metrics::SharedMetrics;
use crate::status::handler::{self as status_handler, StatusState};
use crate::storage::writer::EventStore;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Assemble the HTTP surface: the ingestion endpoint plus health and stats.
pub fn build_router(
    config: IngestConfig,
    queue: IntakeQueue,
    store: Arc<dyn EventStore>,
    metrics: SharedMetrics,
) -> Router {
    let ingest_state = Arc::new(IngestState {
        config,
        queue: queue.clone(),
        metrics: metrics.clone(),
    });

    let status_state = Arc::new(StatusState {
        store,
        queue,
        metrics,
    });

    let ingest_routes = Router::new()
        .route("/analytics", post(handler::ingest_event))
        .with_state(ingest_state);

    let status_routes = Router::new()
        .route("/health", get(status_handler::health))
        .route("/v1/stats", get(status_handler::stats))
        .with_state(status_state);

    ingest_routes
        .merge(status_routes)
        .layer(TraceLayer::new_for_http())
}
