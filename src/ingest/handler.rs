use crate::config::IngestConfig;
use crate::error::{AppError, AppResult};
use crate::ingest::queue::{EnqueueError, IntakeQueue};
use crate::pipeline::metrics::SharedMetrics;
use crate::types::{EventBody, RawIntakeItem};
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::Json;
use std::sync::Arc;

pub struct IngestState {
    pub config: IngestConfig,
    pub queue: IntakeQueue,
    pub metrics: SharedMetrics,
}

/// Non-empty, UTF-8 value of a header, or `None`.
fn required_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Validate the request and freeze it into an intake item.
///
/// Checks run in order (user id header, user agent header, body read, body
/// parse) and stop at the first failure.
async fn accept(state: &IngestState, request: Request) -> AppResult<RawIntakeItem> {
    let (parts, body) = request.into_parts();

    let user_id = required_header(&parts.headers, &state.config.user_id_header)
        .ok_or(AppError::MissingHeader("No user ID in the request header"))?;
    let user_agent = required_header(&parts.headers, &state.config.user_agent_header)
        .ok_or(AppError::MissingHeader("No user Agent in the request header"))?;

    let bytes = axum::body::to_bytes(body, state.config.max_payload_bytes)
        .await
        .map_err(|e| AppError::BodyRead(e.to_string()))?;

    EventBody::parse(&bytes).map_err(|e| AppError::Validation(e.to_string()))?;

    Ok(RawIntakeItem {
        body: bytes,
        user_id,
        user_agent,
        received_at: chrono::Utc::now(),
    })
}

/// POST /analytics - Accept a single analytics event.
///
/// Responds as soon as the event is on the queue; persistence happens later.
/// A full queue is answered with 503 rather than holding the request open.
pub async fn ingest_event(
    State(state): State<Arc<IngestState>>,
    request: Request,
) -> AppResult<Json<serde_json::Value>> {
    let item = match accept(&state, request).await {
        Ok(item) => item,
        Err(e) => {
            state.metrics.record_rejected();
            tracing::debug!(error = %e, "analytics request rejected");
            return Err(e);
        }
    };

    let user_id = item.user_id.clone();
    match state.queue.try_enqueue(item) {
        Ok(()) => {
            state.metrics.record_accepted();
            tracing::debug!(user_id = %user_id, depth = state.queue.len(), "event queued");
            Ok(Json(serde_json::json!({ "status": "ok" })))
        }
        Err(EnqueueError::Full(_)) => {
            state.metrics.record_queue_full();
            tracing::warn!(
                user_id = %user_id,
                capacity = state.queue.capacity(),
                "intake queue full, event rejected"
            );
            Err(AppError::QueueFull)
        }
        Err(EnqueueError::Closed(_)) => {
            state.metrics.record_rejected();
            tracing::warn!(user_id = %user_id, "intake queue closed, event rejected");
            Err(AppError::ShuttingDown)
        }
    }
}
