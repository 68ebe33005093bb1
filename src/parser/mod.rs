//! Webhook ingestion pipeline.
//!
//! Every delivery goes through the same stages:
//!
//! 1. The request is authenticated against the endpoint secret
//!    ([`validator`]). Token schemes never read the body on failure.
//! 2. The provider's event header picks the event kind. Unknown event types
//!    return `Ok(None)` without decoding the body.
//! 3. The body is decoded into the provider shape for that kind.
//! 4. The shape is mapped into a [`CanonicalEvent`].
//!
//! The pipeline keeps no state between calls and never retries.

pub mod bitbucket_cloud;
pub mod bitbucket_server;
pub mod github;
pub mod gitlab;
pub mod timestamp;
pub mod validator;

use axum::{extract::Request, http::HeaderMap};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use tracing::debug;

use crate::error::WebhookError;
use crate::webhook::{CanonicalEvent, Provider};
use validator::AuthScheme;

/// Default cap on the size of a webhook body (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

impl Provider {
    /// Header naming the event type of a delivery.
    pub fn event_header(&self) -> &'static str {
        match self {
            Provider::BitbucketCloud => bitbucket_cloud::EVENT_HEADER,
            Provider::BitbucketServer => bitbucket_server::EVENT_HEADER,
            Provider::GitHub => github::EVENT_HEADER,
            Provider::GitLab => gitlab::EVENT_HEADER,
        }
    }

    pub fn auth_scheme(&self) -> AuthScheme {
        match self {
            Provider::BitbucketCloud => AuthScheme::QueryToken,
            Provider::BitbucketServer => AuthScheme::Signature(bitbucket_server::SIGNATURE_HEADER),
            Provider::GitHub => AuthScheme::Signature(github::SIGNATURE_HEADER),
            Provider::GitLab => AuthScheme::HeaderToken(gitlab::TOKEN_HEADER),
        }
    }
}

/// Validates, classifies and normalizes one inbound webhook request.
///
/// # Returns
///
/// * `Ok(Some(event))` - a recognized event
/// * `Ok(None)` - an ignorable or unrecognized event (pings, unhandled types)
/// * `Err(e)` - authentication failure, unreadable body or malformed payload
pub async fn parse_webhook(
    provider: Provider,
    request: Request,
    expected_token: &[u8],
) -> Result<Option<CanonicalEvent>, WebhookError> {
    parse_webhook_with_limit(provider, request, expected_token, DEFAULT_BODY_LIMIT).await
}

/// Same as [`parse_webhook`] with an explicit body size limit.
pub async fn parse_webhook_with_limit(
    provider: Provider,
    request: Request,
    expected_token: &[u8],
    body_limit: usize,
) -> Result<Option<CanonicalEvent>, WebhookError> {
    let (parts, body) = request.into_parts();
    let payload = validator::validate_payload(
        provider.auth_scheme(),
        &parts,
        body,
        expected_token,
        body_limit,
    )
    .await?;

    let Some(event_type) = header_value(&parts.headers, provider.event_header()) else {
        debug!("{} delivery without {} header, ignoring", provider, provider.event_header());
        return Ok(None);
    };

    let event = parse_payload(provider, event_type, &payload)?;
    match &event {
        Some(event) => debug!(
            "Parsed {} '{}' event into {:?} for {}",
            provider,
            event_type,
            event.kind,
            event.target_repository
        ),
        None => debug!("Ignoring {} '{}' event", provider, event_type),
    }
    Ok(event)
}

/// Classifies and decodes an already validated payload.
pub fn parse_payload(
    provider: Provider,
    event_type: &str,
    payload: &[u8],
) -> Result<Option<CanonicalEvent>, WebhookError> {
    match provider {
        Provider::BitbucketCloud => bitbucket_cloud::parse(event_type, payload),
        Provider::BitbucketServer => bitbucket_server::parse(event_type, payload),
        Provider::GitHub => github::parse(event_type, payload),
        Provider::GitLab => gitlab::parse(event_type, payload),
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Decodes a provider payload shape. Any JSON error is a malformed payload.
fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, WebhookError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Reads an explicit `null` the same way as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
