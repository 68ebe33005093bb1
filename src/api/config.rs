//! Config and hook registration API endpoints

use axum::{
    Json,
    extract::{Path, Query, State as AxumState},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::error::GatewayError;
use crate::hooks::{HookSpec, build_hook_payload, parse_event_list};
use crate::utils::find_endpoint_owned;
use crate::webhook::EventKind;
use crate::{SharedState, reload_config};

#[derive(Debug, Deserialize)]
pub struct HookQuery {
    /// Comma separated event kinds, all kinds when absent
    pub events: Option<String>,
}

/// POST /api/reload - Reload configuration from disk
pub async fn reload_config_endpoint(AxumState(state): AxumState<SharedState>) -> impl IntoResponse {
    match reload_config(&state.config_path).await {
        Ok(new_config) => {
            state.replace_config(new_config).await;
            info!(
                "Configuration reloaded successfully from {:?}",
                state.config_path
            );
            Json(json!({
                "status": "success",
                "message": "Configuration reloaded successfully"
            }))
            .into_response()
        }
        Err(e) => {
            error!("Failed to reload config: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": e.to_string()
                })),
            )
                .into_response()
        }
    }
}

/// GET /api/endpoints/{name}/hook - Body a provider client would send to
/// register this endpoint as a webhook
pub async fn get_hook_payload(
    AxumState(state): AxumState<SharedState>,
    Path(name): Path<String>,
    Query(query): Query<HookQuery>,
) -> impl IntoResponse {
    let (endpoint, public_url) = {
        let config = state.config();
        (
            find_endpoint_owned(&config, &name),
            config.server.public_url.clone(),
        )
    };

    let result = endpoint
        .ok_or_else(|| GatewayError::UnknownEndpoint(name.clone()))
        .and_then(|endpoint| {
            let public_url = public_url.ok_or_else(|| {
                GatewayError::ConfigError("server.public_url is not configured".to_string())
            })?;
            let events = match query.events.as_deref() {
                Some(list) => parse_event_list(list)?,
                None => EventKind::ALL.to_vec(),
            };
            let payload_url = endpoint.payload_url(&public_url)?;
            build_hook_payload(
                endpoint.provider,
                &HookSpec {
                    name: &endpoint.name,
                    payload_url: &payload_url,
                    token: endpoint.webhook_secret.as_deref().unwrap_or_default(),
                    events: &events,
                },
            )
        });

    match result {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => {
            let status = match e {
                GatewayError::UnknownEndpoint(_) => StatusCode::NOT_FOUND,
                GatewayError::HookPayload(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({"error": e.to_string()}))).into_response()
        }
    }
}
