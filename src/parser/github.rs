//! GitHub webhook decoder.
//!
//! GitHub sends every pull request transition under the single
//! `pull_request` event type; the payload `action` picks the kind.

use serde::Deserialize;

use super::{decode, null_as_default, timestamp};
use crate::error::WebhookError;
use crate::webhook::{CanonicalEvent, EventKind, PullRequestSide, RepositoryIdentity};

pub const EVENT_HEADER: &str = "X-GitHub-Event";
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

pub const PUSH: &str = "push";
pub const PULL_REQUEST: &str = "pull_request";

const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// GitHub event type a hook must subscribe to for the given kind.
pub fn event_name(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Push => PUSH,
        _ => PULL_REQUEST,
    }
}

/// Maps a pull request `action` to an event kind.
pub fn classify_action(action: &str, merged: bool) -> Option<EventKind> {
    match action {
        "opened" | "reopened" => Some(EventKind::PrOpened),
        "edited" | "synchronize" => Some(EventKind::PrEdited),
        "closed" if merged => Some(EventKind::PrMerged),
        "closed" => Some(EventKind::PrRejected),
        _ => None,
    }
}

pub fn parse(event_type: &str, payload: &[u8]) -> Result<Option<CanonicalEvent>, WebhookError> {
    match event_type {
        PUSH => build_push(decode(payload)?),
        PULL_REQUEST => build_pull_request(decode(payload)?),
        // ping, issues, check runs, ...
        _ => Ok(None),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRepository {
    #[serde(deserialize_with = "null_as_default")]
    full_name: String,
    /// Epoch seconds on push payloads
    pushed_at: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(default, rename = "ref", deserialize_with = "null_as_default")]
    git_ref: String,
    #[serde(default, deserialize_with = "null_as_default")]
    repository: RawRepository,
    /// `null` when the push deleted the branch
    #[serde(default)]
    head_commit: Option<RawCommit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCommit {
    #[serde(deserialize_with = "timestamp::deserialize_optional")]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    action: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pull_request: RawPullRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPullRequest {
    #[serde(deserialize_with = "null_as_default")]
    number: u64,
    merged: Option<bool>,
    #[serde(deserialize_with = "timestamp::deserialize_optional")]
    updated_at: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    head: RawRef,
    #[serde(deserialize_with = "null_as_default")]
    base: RawRef,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRef {
    #[serde(rename = "ref", deserialize_with = "null_as_default")]
    git_ref: String,
    /// `null` when the fork behind the head ref was deleted. Such a pull
    /// request has no source identity and is rejected as malformed.
    repo: Option<RawRepository>,
}

fn build_push(payload: PushPayload) -> Result<Option<CanonicalEvent>, WebhookError> {
    let Some(branch) = payload.git_ref.strip_prefix(BRANCH_REF_PREFIX) else {
        // Tag pushes
        return Ok(None);
    };
    let repository = RepositoryIdentity::from_full_name(&payload.repository.full_name)?;
    let occurred_at = payload
        .head_commit
        .and_then(|commit| commit.timestamp)
        .or_else(|| payload.repository.pushed_at.as_ref().and_then(pushed_at_seconds))
        .unwrap_or_default();
    Ok(Some(CanonicalEvent::push(
        repository,
        branch.to_string(),
        occurred_at,
    )))
}

/// `repository.pushed_at` is epoch seconds on push events but an ISO string
/// on other payloads.
fn pushed_at_seconds(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => timestamp::parse_epoch_seconds(s),
        _ => None,
    }
}

fn build_pull_request(payload: PullRequestPayload) -> Result<Option<CanonicalEvent>, WebhookError> {
    let pr = payload.pull_request;
    let Some(kind) = classify_action(&payload.action, pr.merged.unwrap_or(false)) else {
        return Ok(None);
    };
    Ok(Some(CanonicalEvent::pull_request(
        kind,
        pr.number,
        side(pr.head)?,
        side(pr.base)?,
        pr.updated_at.unwrap_or_default(),
    )))
}

fn side(pr_ref: RawRef) -> Result<PullRequestSide, WebhookError> {
    let full_name = pr_ref.repo.map(|repo| repo.full_name).unwrap_or_default();
    Ok(PullRequestSide {
        repository: RepositoryIdentity::from_full_name(&full_name)?,
        branch: pr_ref.git_ref,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUSH_PAYLOAD: &str = r#"{
        "ref": "refs/heads/main",
        "before": "0000000000000000000000000000000000000000",
        "after": "abcdef1234567890abcdef1234567890abcdef12",
        "repository": {
            "id": 1,
            "name": "widgets",
            "full_name": "acme/widgets",
            "owner": { "login": "acme" },
            "pushed_at": 1704067300
        },
        "head_commit": {
            "id": "abcdef1234567890abcdef1234567890abcdef12",
            "message": "Initial commit",
            "timestamp": "2024-01-01T01:00:00+01:00"
        }
    }"#;

    fn pr_payload(action: &str, merged: bool) -> String {
        format!(
            r#"{{
                "action": "{action}",
                "number": 42,
                "pull_request": {{
                    "number": 42,
                    "state": "open",
                    "merged": {merged},
                    "updated_at": "2024-02-02T12:00:00Z",
                    "head": {{
                        "ref": "feature",
                        "sha": "abc",
                        "repo": {{ "full_name": "jane/widgets-fork" }}
                    }},
                    "base": {{
                        "ref": "main",
                        "sha": "def",
                        "repo": {{ "full_name": "acme/widgets" }}
                    }}
                }},
                "repository": {{ "full_name": "acme/widgets" }}
            }}"#
        )
    }

    #[test]
    fn push_to_branch() {
        let event = parse("push", PUSH_PAYLOAD.as_bytes()).unwrap().expect("should parse");
        assert_eq!(event.kind, EventKind::Push);
        assert_eq!(event.target_repository.to_string(), "acme/widgets");
        assert_eq!(event.target_branch.as_deref(), Some("main"));
        assert_eq!(event.occurred_at, 1704067200);
    }

    #[test]
    fn branch_deletion_falls_back_to_pushed_at() {
        let payload = r#"{
            "ref": "refs/heads/old",
            "deleted": true,
            "repository": { "full_name": "acme/widgets", "pushed_at": 1704067300 },
            "head_commit": null
        }"#;
        let event = parse("push", payload.as_bytes()).unwrap().unwrap();
        assert_eq!(event.target_branch.as_deref(), Some("old"));
        assert_eq!(event.occurred_at, 1704067300);
    }

    #[test]
    fn tag_push_is_ignored() {
        let payload = PUSH_PAYLOAD.replace("refs/heads/main", "refs/tags/v1.0.0");
        assert!(parse("push", payload.as_bytes()).unwrap().is_none());
    }

    #[test]
    fn pull_request_actions() {
        for (action, merged, kind) in [
            ("opened", false, EventKind::PrOpened),
            ("reopened", false, EventKind::PrOpened),
            ("synchronize", false, EventKind::PrEdited),
            ("edited", false, EventKind::PrEdited),
            ("closed", true, EventKind::PrMerged),
            ("closed", false, EventKind::PrRejected),
        ] {
            let payload = pr_payload(action, merged);
            let event = parse("pull_request", payload.as_bytes()).unwrap().unwrap();
            assert_eq!(event.kind, kind, "action {}", action);
            assert_eq!(event.pull_request_id, Some(42));
            assert_eq!(event.target_repository.to_string(), "acme/widgets");
            assert_eq!(event.target_branch.as_deref(), Some("main"));
            assert_eq!(
                event.source_repository.as_ref().map(|r| r.owner.as_str()),
                Some("jane")
            );
            assert_eq!(event.source_branch.as_deref(), Some("feature"));
            assert_eq!(event.occurred_at, 1706875200);
        }
    }

    #[test]
    fn other_pull_request_actions_are_ignored() {
        let payload = pr_payload("labeled", false);
        assert!(parse("pull_request", payload.as_bytes()).unwrap().is_none());
    }

    #[test]
    fn deleted_fork_is_malformed() {
        let payload = pr_payload("opened", false)
            .replace(r#"{ "full_name": "jane/widgets-fork" }"#, "null");
        assert!(matches!(
            parse("pull_request", payload.as_bytes()),
            Err(WebhookError::MalformedPayload(_))
        ));
    }

    #[test]
    fn null_fields_read_as_absent() {
        let payload = r#"{
            "ref": "refs/heads/main",
            "repository": { "full_name": "acme/widgets", "pushed_at": null },
            "head_commit": { "timestamp": null }
        }"#;
        let event = parse("push", payload.as_bytes()).unwrap().unwrap();
        assert_eq!(event.target_branch.as_deref(), Some("main"));
        assert_eq!(event.occurred_at, 0);

        let payload = pr_payload("opened", false).replace(r#""ref": "feature""#, r#""ref": null"#);
        let event = parse("pull_request", payload.as_bytes()).unwrap().unwrap();
        assert!(event.source_branch.is_none());
        assert_eq!(event.target_branch.as_deref(), Some("main"));
    }

    #[test]
    fn ping_is_ignored() {
        let payload = r#"{ "zen": "Keep it logically awesome.", "hook_id": 1 }"#;
        assert!(parse("ping", payload.as_bytes()).unwrap().is_none());
    }

    #[test]
    fn every_kind_maps_to_a_parsed_event_name() {
        for kind in EventKind::ALL {
            assert!(matches!(event_name(kind), PUSH | PULL_REQUEST));
        }
    }
}
