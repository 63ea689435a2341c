//! REST API router

use super::events::stream_events;
use super::handlers::{self, AppState};
use axum::{
    routing::{get, post},
    Router,
};

/// Build the `/v1` API router over the shared application
pub fn build_router(app: AppState) -> Router {
    Router::new()
        .route("/v1/status", get(handlers::status))
        .route("/v1/services", get(handlers::list_services))
        .route("/v1/services/:name", get(handlers::get_service))
        .route("/v1/services/:name/start", post(handlers::start_service))
        .route("/v1/services/:name/stop", post(handlers::stop_service))
        .route("/v1/services/:name/restart", post(handlers::restart_service))
        .route(
            "/v1/watchlist",
            get(handlers::list_watchlist).post(handlers::add_watch),
        )
        .route(
            "/v1/watchlist/:name",
            get(handlers::get_watch)
                .put(handlers::update_watch)
                .delete(handlers::remove_watch),
        )
        .route("/v1/events", get(stream_events))
        .with_state(app)
}
