//! Bitbucket Cloud webhook decoder.
//!
//! Payload reference: <https://support.atlassian.com/bitbucket-cloud/docs/event-payloads/>

use serde::Deserialize;

use super::{decode, null_as_default, timestamp};
use crate::error::WebhookError;
use crate::webhook::{CanonicalEvent, EventKind, PullRequestSide, RepositoryIdentity};

pub const EVENT_HEADER: &str = "X-Event-Key";

/// Event-key vocabulary, shared with the hook payload builder.
pub const PUSH: &str = "repo:push";
pub const PR_CREATED: &str = "pullrequest:created";
pub const PR_UPDATED: &str = "pullrequest:updated";
pub const PR_FULFILLED: &str = "pullrequest:fulfilled";
pub const PR_REJECTED: &str = "pullrequest:rejected";

pub fn event_key(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Push => PUSH,
        EventKind::PrOpened => PR_CREATED,
        EventKind::PrEdited => PR_UPDATED,
        EventKind::PrMerged => PR_FULFILLED,
        EventKind::PrRejected => PR_REJECTED,
    }
}

pub fn classify(event_key: &str) -> Option<EventKind> {
    match event_key {
        PUSH => Some(EventKind::Push),
        PR_CREATED => Some(EventKind::PrOpened),
        PR_UPDATED => Some(EventKind::PrEdited),
        PR_FULFILLED => Some(EventKind::PrMerged),
        PR_REJECTED => Some(EventKind::PrRejected),
        _ => None,
    }
}

pub fn parse(event_key: &str, payload: &[u8]) -> Result<Option<CanonicalEvent>, WebhookError> {
    let event = match classify(event_key) {
        None => return Ok(None),
        Some(EventKind::Push) => build_push(decode(payload)?)?,
        Some(kind) => build_pull_request(decode(payload)?, kind)?,
    };
    Ok(Some(event))
}

// Raw payload structures. Absent or null fields decode to their defaults.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRepository {
    /// The workspace and repository slugs joined with a '/'
    #[serde(deserialize_with = "null_as_default")]
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    push: RawPush,
    #[serde(default, deserialize_with = "null_as_default")]
    repository: RawRepository,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPush {
    #[serde(deserialize_with = "null_as_default")]
    changes: Vec<RawChange>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawChange {
    /// `null` when the branch was deleted
    new: Option<RawRefState>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRefState {
    #[serde(deserialize_with = "null_as_default")]
    name: String,
    #[serde(deserialize_with = "null_as_default")]
    target: RawTarget,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTarget {
    #[serde(deserialize_with = "timestamp::deserialize_optional")]
    date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    #[serde(default, rename = "pullrequest", deserialize_with = "null_as_default")]
    pull_request: RawPullRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPullRequest {
    #[serde(deserialize_with = "null_as_default")]
    id: u64,
    #[serde(deserialize_with = "null_as_default")]
    source: RawEndpoint,
    #[serde(deserialize_with = "null_as_default")]
    destination: RawEndpoint,
    #[serde(deserialize_with = "timestamp::deserialize_optional")]
    updated_on: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEndpoint {
    #[serde(deserialize_with = "null_as_default")]
    repository: RawRepository,
    #[serde(deserialize_with = "null_as_default")]
    branch: RawBranch,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBranch {
    #[serde(deserialize_with = "null_as_default")]
    name: String,
}

fn build_push(payload: PushPayload) -> Result<CanonicalEvent, WebhookError> {
    let repository = RepositoryIdentity::from_full_name(&payload.repository.full_name)?;
    // A push may update several refs at once; the first change is reported.
    let change = payload
        .push
        .changes
        .into_iter()
        .next()
        .ok_or_else(|| WebhookError::MalformedPayload("push event has no changes".into()))?;
    let new = change.new.unwrap_or_default();
    Ok(CanonicalEvent::push(
        repository,
        new.name,
        new.target.date.unwrap_or_default(),
    ))
}

fn build_pull_request(
    payload: PullRequestPayload,
    kind: EventKind,
) -> Result<CanonicalEvent, WebhookError> {
    let pr = payload.pull_request;
    Ok(CanonicalEvent::pull_request(
        kind,
        pr.id,
        side(pr.source)?,
        side(pr.destination)?,
        pr.updated_on.unwrap_or_default(),
    ))
}

fn side(endpoint: RawEndpoint) -> Result<PullRequestSide, WebhookError> {
    Ok(PullRequestSide {
        repository: RepositoryIdentity::from_full_name(&endpoint.repository.full_name)?,
        branch: endpoint.branch.name,
    })
}
