//! Bitbucket Server / Data Center webhook decoder.
//!
//! Repositories are identified by project key and slug, delivered as separate
//! fields rather than a composite name.

use serde::Deserialize;

use super::{decode, null_as_default, timestamp};
use crate::error::WebhookError;
use crate::webhook::{CanonicalEvent, EventKind, PullRequestSide, RepositoryIdentity};

pub const EVENT_HEADER: &str = "X-Event-Key";
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

pub const REFS_CHANGED: &str = "repo:refs_changed";
pub const PR_OPENED: &str = "pr:opened";
pub const PR_FROM_REF_UPDATED: &str = "pr:from_ref_updated";
pub const PR_MERGED: &str = "pr:merged";
pub const PR_DECLINED: &str = "pr:declined";

pub fn event_key(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Push => REFS_CHANGED,
        EventKind::PrOpened => PR_OPENED,
        EventKind::PrEdited => PR_FROM_REF_UPDATED,
        EventKind::PrMerged => PR_MERGED,
        EventKind::PrRejected => PR_DECLINED,
    }
}

/// `diagnostics:ping` (sent by "Test connection") and every other key fall
/// through to `None`.
pub fn classify(event_key: &str) -> Option<EventKind> {
    match event_key {
        REFS_CHANGED => Some(EventKind::Push),
        PR_OPENED => Some(EventKind::PrOpened),
        PR_FROM_REF_UPDATED => Some(EventKind::PrEdited),
        PR_MERGED => Some(EventKind::PrMerged),
        PR_DECLINED => Some(EventKind::PrRejected),
        _ => None,
    }
}

pub fn parse(event_key: &str, payload: &[u8]) -> Result<Option<CanonicalEvent>, WebhookError> {
    match classify(event_key) {
        None => Ok(None),
        Some(EventKind::Push) => build_push(decode(payload)?),
        Some(kind) => build_pull_request(decode(payload)?, kind).map(Some),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRepository {
    #[serde(deserialize_with = "null_as_default")]
    slug: String,
    #[serde(deserialize_with = "null_as_default")]
    project: RawProject,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProject {
    #[serde(deserialize_with = "null_as_default")]
    key: String,
}

impl RawRepository {
    fn identity(&self) -> Result<RepositoryIdentity, WebhookError> {
        RepositoryIdentity::from_parts(&self.project.key, &self.slug)
    }
}

#[derive(Debug, Deserialize)]
struct RefsChangedPayload {
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    date: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    repository: RawRepository,
    #[serde(default, deserialize_with = "null_as_default")]
    changes: Vec<RawChange>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawChange {
    #[serde(rename = "ref", deserialize_with = "null_as_default")]
    git_ref: RawRef,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRef {
    #[serde(deserialize_with = "null_as_default")]
    display_id: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    ref_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestPayload {
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    date: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pull_request: RawPullRequest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawPullRequest {
    #[serde(deserialize_with = "null_as_default")]
    id: u64,
    /// Epoch milliseconds
    updated_date: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    from_ref: RawPrRef,
    #[serde(deserialize_with = "null_as_default")]
    to_ref: RawPrRef,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawPrRef {
    #[serde(deserialize_with = "null_as_default")]
    display_id: String,
    #[serde(deserialize_with = "null_as_default")]
    repository: RawRepository,
}

fn build_push(payload: RefsChangedPayload) -> Result<Option<CanonicalEvent>, WebhookError> {
    let repository = payload.repository.identity()?;
    let change = payload
        .changes
        .into_iter()
        .next()
        .ok_or_else(|| WebhookError::MalformedPayload("refs_changed event has no changes".into()))?;
    if change.git_ref.ref_type == "TAG" {
        return Ok(None);
    }
    Ok(Some(CanonicalEvent::push(
        repository,
        change.git_ref.display_id,
        payload.date.unwrap_or_default(),
    )))
}

fn build_pull_request(
    payload: PullRequestPayload,
    kind: EventKind,
) -> Result<CanonicalEvent, WebhookError> {
    let pr = payload.pull_request;
    let occurred_at = pr
        .updated_date
        .map(timestamp::millis_to_seconds)
        .or(payload.date)
        .unwrap_or_default();
    Ok(CanonicalEvent::pull_request(
        kind,
        pr.id,
        side(pr.from_ref)?,
        side(pr.to_ref)?,
        occurred_at,
    ))
}

fn side(pr_ref: RawPrRef) -> Result<PullRequestSide, WebhookError> {
    Ok(PullRequestSide {
        repository: pr_ref.repository.identity()?,
        branch: pr_ref.display_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFS_CHANGED_PAYLOAD: &str = r#"{
        "eventKey": "repo:refs_changed",
        "date": "2024-01-01T10:00:00+1000",
        "actor": { "name": "admin", "id": 1 },
        "repository": {
            "slug": "widgets",
            "id": 84,
            "name": "Widgets",
            "project": { "key": "ACME", "id": 84, "name": "Acme" }
        },
        "changes": [
            {
                "ref": { "id": "refs/heads/main", "displayId": "main", "type": "BRANCH" },
                "refId": "refs/heads/main",
                "fromHash": "ecddabb624f6f5ba43816f5926e580a5f680a932",
                "toHash": "178864a7d521b6f5e720b386b2c2b0ef8563e0dc",
                "type": "UPDATE"
            },
            {
                "ref": { "id": "refs/heads/other", "displayId": "other", "type": "BRANCH" },
                "type": "ADD"
            }
        ]
    }"#;

    const PR_PAYLOAD: &str = r#"{
        "eventKey": "pr:opened",
        "date": "2024-02-02T22:00:00+1000",
        "pullRequest": {
            "id": 42,
            "version": 0,
            "title": "Add feature",
            "state": "OPEN",
            "createdDate": 1706860800000,
            "updatedDate": 1706875200500,
            "fromRef": {
                "id": "refs/heads/feature",
                "displayId": "feature",
                "latestCommit": "ef8755f06ee4b28c96a847a95cb8ec8ed6ddd1ca",
                "repository": { "slug": "widgets-fork", "project": { "key": "~JANE" } }
            },
            "toRef": {
                "id": "refs/heads/main",
                "displayId": "main",
                "repository": { "slug": "widgets", "project": { "key": "ACME" } }
            }
        }
    }"#;

    #[test]
    fn refs_changed_reports_first_change() {
        let event = parse("repo:refs_changed", REFS_CHANGED_PAYLOAD.as_bytes())
            .unwrap()
            .expect("should parse");
        assert_eq!(event.kind, EventKind::Push);
        assert_eq!(event.target_repository.owner, "ACME");
        assert_eq!(event.target_repository.name, "widgets");
        assert_eq!(event.target_branch.as_deref(), Some("main"));
        assert_eq!(event.occurred_at, 1704067200);
    }

    #[test]
    fn tag_push_is_ignored() {
        let payload = REFS_CHANGED_PAYLOAD.replacen("\"BRANCH\"", "\"TAG\"", 1);
        assert!(parse("repo:refs_changed", payload.as_bytes()).unwrap().is_none());
    }

    #[test]
    fn refs_changed_without_changes_is_malformed() {
        let payload = r#"{ "repository": { "slug": "widgets", "project": { "key": "ACME" } }, "changes": [] }"#;
        assert!(matches!(
            parse("repo:refs_changed", payload.as_bytes()),
            Err(WebhookError::MalformedPayload(_))
        ));
    }

    #[test]
    fn missing_project_key_is_malformed() {
        let payload = r#"{ "repository": { "slug": "widgets" }, "changes": [ { "ref": { "displayId": "main" } } ] }"#;
        assert!(matches!(
            parse("repo:refs_changed", payload.as_bytes()),
            Err(WebhookError::MalformedPayload(_))
        ));
    }

    #[test]
    fn pull_request_opened() {
        let event = parse("pr:opened", PR_PAYLOAD.as_bytes()).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::PrOpened);
        assert_eq!(event.pull_request_id, Some(42));
        assert_eq!(event.target_repository.to_string(), "ACME/widgets");
        assert_eq!(event.target_branch.as_deref(), Some("main"));
        assert_eq!(
            event.source_repository.map(|r| r.to_string()),
            Some("~JANE/widgets-fork".to_string())
        );
        assert_eq!(event.source_branch.as_deref(), Some("feature"));
        // updatedDate is milliseconds, floored to seconds
        assert_eq!(event.occurred_at, 1706875200);
    }

    #[test]
    fn pull_request_falls_back_to_event_date() {
        let payload = PR_PAYLOAD.replace("\"updatedDate\": 1706875200500,", "");
        let event = parse("pr:merged", payload.as_bytes()).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::PrMerged);
        assert_eq!(event.occurred_at, 1706875200);
    }

    #[test]
    fn null_fields_read_as_absent() {
        let payload = REFS_CHANGED_PAYLOAD.replacen(r#""type": "BRANCH""#, r#""type": null"#, 1);
        let event = parse("repo:refs_changed", payload.as_bytes()).unwrap().unwrap();
        assert_eq!(event.target_branch.as_deref(), Some("main"));

        let payload = PR_PAYLOAD.replace(r#""displayId": "feature""#, r#""displayId": null"#);
        let event = parse("pr:opened", payload.as_bytes()).unwrap().unwrap();
        assert!(event.source_branch.is_none());
        assert_eq!(event.target_branch.as_deref(), Some("main"));
    }

    #[test]
    fn ping_is_ignored() {
        assert!(parse("diagnostics:ping", b"{\"test\": true}").unwrap().is_none());
    }

    #[test]
    fn event_keys_classify_back() {
        for kind in EventKind::ALL {
            assert_eq!(classify(event_key(kind)), Some(kind));
        }
    }
}
