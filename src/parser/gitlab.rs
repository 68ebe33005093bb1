//! GitLab (gitlab.com and self-managed) webhook decoder.

use serde::Deserialize;

use super::{decode, null_as_default, timestamp};
use crate::error::WebhookError;
use crate::webhook::{CanonicalEvent, EventKind, PullRequestSide, RepositoryIdentity};

pub const EVENT_HEADER: &str = "X-Gitlab-Event";
pub const TOKEN_HEADER: &str = "X-Gitlab-Token";

pub const PUSH_HOOK: &str = "Push Hook";
pub const MERGE_REQUEST_HOOK: &str = "Merge Request Hook";

const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Maps a merge request `object_attributes.action` to an event kind.
pub fn classify_action(action: &str) -> Option<EventKind> {
    match action {
        "open" | "reopen" => Some(EventKind::PrOpened),
        "update" => Some(EventKind::PrEdited),
        "merge" => Some(EventKind::PrMerged),
        "close" => Some(EventKind::PrRejected),
        _ => None,
    }
}

pub fn parse(event_type: &str, payload: &[u8]) -> Result<Option<CanonicalEvent>, WebhookError> {
    match event_type {
        PUSH_HOOK => build_push(decode(payload)?).map(Some),
        MERGE_REQUEST_HOOK => build_merge_request(decode(payload)?),
        _ => Ok(None),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProject {
    #[serde(deserialize_with = "null_as_default")]
    path_with_namespace: String,
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(default, rename = "ref", deserialize_with = "null_as_default")]
    git_ref: String,
    #[serde(default)]
    checkout_sha: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    project: RawProject,
    #[serde(default, deserialize_with = "null_as_default")]
    commits: Vec<RawCommit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCommit {
    #[serde(deserialize_with = "null_as_default")]
    id: String,
    #[serde(deserialize_with = "timestamp::deserialize_optional")]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MergeRequestPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    object_attributes: RawMergeRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMergeRequest {
    #[serde(deserialize_with = "null_as_default")]
    iid: u64,
    action: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    source_branch: String,
    #[serde(deserialize_with = "null_as_default")]
    target_branch: String,
    #[serde(deserialize_with = "null_as_default")]
    source: RawProject,
    #[serde(deserialize_with = "null_as_default")]
    target: RawProject,
    #[serde(deserialize_with = "timestamp::deserialize_optional")]
    updated_at: Option<i64>,
}

fn build_push(payload: PushPayload) -> Result<CanonicalEvent, WebhookError> {
    let repository = RepositoryIdentity::from_namespaced_path(&payload.project.path_with_namespace)?;
    let branch = payload
        .git_ref
        .strip_prefix(BRANCH_REF_PREFIX)
        .unwrap_or(payload.git_ref.as_str())
        .to_string();
    // Prefer the commit the branch now points at; otherwise the first listed.
    let head = payload
        .commits
        .iter()
        .find(|commit| Some(&commit.id) == payload.checkout_sha.as_ref())
        .or_else(|| payload.commits.first());
    let occurred_at = head.and_then(|commit| commit.timestamp).unwrap_or_default();
    Ok(CanonicalEvent::push(repository, branch, occurred_at))
}

fn build_merge_request(
    payload: MergeRequestPayload,
) -> Result<Option<CanonicalEvent>, WebhookError> {
    let mr = payload.object_attributes;
    let Some(kind) = mr.action.as_deref().and_then(classify_action) else {
        return Ok(None);
    };
    let source = PullRequestSide {
        repository: RepositoryIdentity::from_namespaced_path(&mr.source.path_with_namespace)?,
        branch: mr.source_branch,
    };
    let target = PullRequestSide {
        repository: RepositoryIdentity::from_namespaced_path(&mr.target.path_with_namespace)?,
        branch: mr.target_branch,
    };
    Ok(Some(CanonicalEvent::pull_request(
        kind,
        mr.iid,
        source,
        target,
        mr.updated_at.unwrap_or_default(),
    )))
}
