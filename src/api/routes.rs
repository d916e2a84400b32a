//! API route definitions

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use super::handlers;
use super::middleware::log_request;
use super::server::AppState;
use super::websocket;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        // Channels
        .route("/channel", post(handlers::channel::create_channel))
        .route(
            "/channel/:id",
            get(handlers::channel::get_channel).delete(handlers::channel::delete_channel),
        )
        .route("/channel/:id/user", post(handlers::channel::add_member))
        .route("/channel/:id/users", get(handlers::channel::list_members))
        // Queue
        .route(
            "/channel/:id/queue",
            get(handlers::queue::list_queue).post(handlers::queue::enqueue),
        )
        .route("/channel/:id/queue/:index", delete(handlers::queue::skip))
        // Metadata search
        .route("/channel/:id/search", get(handlers::search::search))
        // Realtime stream
        .route("/stream/:id", get(websocket::stream::stream_ws))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
