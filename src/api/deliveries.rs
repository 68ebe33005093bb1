//! Delivery log API endpoints

use axum::{
    Json,
    extract::{Path, Query, State as AxumState},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::SharedState;

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct DeliveriesQuery {
    pub endpoint: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/deliveries - Recent deliveries, newest first
/// Supports ?endpoint=name&limit=10
pub async fn get_deliveries(
    AxumState(state): AxumState<SharedState>,
    Query(query): Query<DeliveriesQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let store = state.deliveries.lock().await;
    let deliveries = match &query.endpoint {
        Some(endpoint) => store.recent_for_endpoint(endpoint, limit),
        None => store.recent(limit),
    };

    Json(json!({
        "deliveries": deliveries,
        "count": deliveries.len(),
    }))
}

/// GET /api/deliveries/{id} - A single delivery
pub async fn get_delivery(
    AxumState(state): AxumState<SharedState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.deliveries.lock().await;
    match store.get(&id) {
        Some(delivery) => Json(delivery.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Delivery not found"})),
        )
            .into_response(),
    }
}
