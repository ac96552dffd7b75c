pub mod rest;
pub mod state;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub use rest::{health_handler, trigger_notifications_handler, ApiDoc};
pub use state::AppState;

/// Builds the HTTP routes of the service.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/notifications/send",
            post(trigger_notifications_handler).get(trigger_notifications_handler),
        )
        .layer(cors)
        .with_state(state)
}
