//! API module for all HTTP handlers

pub mod config;
pub mod deliveries;
pub mod handlers;
pub mod stream;
pub mod webhook;

use axum::{Router, routing};

use crate::SharedState;

// Re-export handlers
pub use config::{get_hook_payload, reload_config_endpoint};
pub use deliveries::{get_deliveries, get_delivery};
pub use handlers::{root, status};
pub use stream::stream_deliveries;
pub use webhook::handle_webhook;

/// Builds the gateway router
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/status", routing::get(status))
        .route("/webhook/{name}", routing::post(handle_webhook))
        .route("/api/deliveries", routing::get(get_deliveries))
        .route("/api/deliveries/{id}", routing::get(get_delivery))
        .route("/api/stream/deliveries", routing::get(stream_deliveries))
        .route("/api/endpoints/{name}/hook", routing::get(get_hook_payload))
        .route("/api/reload", routing::post(reload_config_endpoint))
        .with_state(state)
}
