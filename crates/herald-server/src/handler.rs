use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::debug;

use herald_core::{Event, Notification, PollService, ServiceStatus};

use crate::api::{
    HealthResponse, PollOutcome, PollQuery, PollResponse, RecentQuery, DEFAULT_RECENT_LIMIT,
};
use crate::error::{ServerError, ServerResult};

/// Shared state handed to every handler.
pub type AppState = PollService<Notification>;

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Newest retained events, oldest first.
pub async fn recent_handler(
    State(service): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<Event<Notification>>> {
    Json(service.recent(query.limit.unwrap_or(DEFAULT_RECENT_LIMIT)))
}

/// Publish a notification.
///
/// An empty body publishes a random sample notification.
pub async fn publish_handler(
    State(service): State<AppState>,
    body: Bytes,
) -> ServerResult<(StatusCode, Json<Event<Notification>>)> {
    let event = if body.iter().all(u8::is_ascii_whitespace) {
        let sample = Notification::sample(&mut rand::thread_rng());
        service.publish_with(|id| {
            Notification::new(sample.level, format!("{} #{id}", sample.message))
        })
    } else {
        let notification: Notification =
            serde_json::from_slice(&body).map_err(|e| ServerError::BadRequest(e.to_string()))?;
        service.publish(notification)
    };
    Ok((StatusCode::CREATED, Json(event)))
}

/// Long-poll for events past the client's cursor.
///
/// If the client disconnects, axum drops this future and the waiter is
/// deregistered with it.
pub async fn poll_handler(
    State(service): State<AppState>,
    Query(query): Query<PollQuery>,
) -> Response {
    let cursor = query.cursor();
    let timeout = query
        .timeout_ms
        .map_or_else(|| service.config().default_timeout(), Duration::from_millis);

    let result = service.await_since(cursor, timeout).await;
    let response = PollResponse::from_result(cursor, result);
    debug!(
        %cursor,
        outcome = ?response.outcome,
        delivered = response.events.len(),
        "poll answered"
    );

    let status = match response.outcome {
        PollOutcome::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        PollOutcome::Delivered | PollOutcome::TimedOut => StatusCode::OK,
    };
    (status, Json(response)).into_response()
}

/// Service status summary.
pub async fn status_handler(State(service): State<AppState>) -> Json<ServiceStatus<Notification>> {
    Json(service.status())
}
