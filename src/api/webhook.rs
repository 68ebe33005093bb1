//! Webhook handler for every configured endpoint

use axum::{
    Json,
    extract::{Path, Request, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

use crate::SharedState;
use crate::deliveries::{Delivery, DeliveryOutcome};
use crate::parser::parse_webhook_with_limit;
use crate::utils::find_endpoint_owned;

/// Handles a webhook POST request for the named endpoint.
///
/// 200 with the canonical event, 204 when the event is ignored, 401/400 when
/// the delivery is rejected.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    Path(name): Path<String>,
    request: Request,
) -> Response {
    let (endpoint, body_limit) = {
        let config = state.config();
        (
            find_endpoint_owned(&config, &name),
            config.server.max_body_bytes,
        )
    };

    let Some(endpoint) = endpoint else {
        warn!("Delivery for unknown endpoint '{}'", name);
        return StatusCode::NOT_FOUND.into_response();
    };

    let event_type = request
        .headers()
        .get(endpoint.provider.event_header())
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let result = parse_webhook_with_limit(
        endpoint.provider,
        request,
        endpoint.secret_bytes(),
        body_limit,
    )
    .await;

    let outcome = DeliveryOutcome::from_result(&result);
    state
        .record_delivery(Delivery::new(
            endpoint.name.clone(),
            endpoint.provider,
            event_type.clone(),
            outcome,
        ))
        .await;

    match result {
        Ok(Some(event)) => {
            info!(
                "Endpoint '{}' accepted {:?} for {} (branch {:?})",
                endpoint.name, event.kind, event.target_repository, event.target_branch
            );
            (StatusCode::OK, Json(event)).into_response()
        }
        Ok(None) => {
            info!(
                "Endpoint '{}' ignored {:?} event",
                endpoint.name, event_type
            );
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            error!("Endpoint '{}' rejected delivery: {}", endpoint.name, e);
            e.status_code().into_response()
        }
    }
}
