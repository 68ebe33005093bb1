//! Health and status endpoints

use axum::{
    Json,
    extract::{Query, State as AxumState},
    response::IntoResponse,
};
use serde_json::json;
use std::collections::HashMap;

use crate::SharedState;

/// Root health check endpoint
/// Supports ?format=json for detailed JSON response
pub async fn root(
    AxumState(state): AxumState<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if params.get("format").map(String::as_str) == Some("json") {
        let total_endpoints = state.config().endpoint.len();
        Json(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": state.start_time.elapsed().as_secs(),
            "total_endpoints": total_endpoints,
            "status": "healthy"
        }))
        .into_response()
    } else {
        "vcs_webhook_gateway - healthy".into_response()
    }
}

/// Returns server information, configured endpoints and delivery counters
pub async fn status(AxumState(state): AxumState<SharedState>) -> impl IntoResponse {
    let endpoints: Vec<_> = {
        let config = state.config();
        config
            .endpoint
            .iter()
            .map(|endpoint| {
                json!({
                    "name": endpoint.name,
                    "provider": endpoint.provider,
                    "has_secret": endpoint.has_valid_secret(),
                })
            })
            .collect()
    };

    let deliveries = state.deliveries.lock().await;

    Json(json!({
        "server": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "started_at": state.started_at,
            "uptime_seconds": state.start_time.elapsed().as_secs(),
        },
        "endpoints": endpoints,
        "deliveries": {
            "stored": deliveries.len(),
            "counts": deliveries.counts(),
        }
    }))
}
