use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::handler::{self, AppState};

/// Build the axum router with all Herald endpoints.
pub fn build_router(service: AppState) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(
            endpoints::EVENTS,
            get(handler::recent_handler).post(handler::publish_handler),
        )
        .route(endpoints::POLL, get(handler::poll_handler))
        .route(endpoints::STATUS, get(handler::status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
