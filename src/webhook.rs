//! Vendor-neutral webhook structures

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WebhookError;

/// Hosting provider a webhook endpoint receives deliveries from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    BitbucketCloud,
    BitbucketServer,
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "gitlab")]
    GitLab,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::BitbucketCloud => "bitbucket-cloud",
            Provider::BitbucketServer => "bitbucket-server",
            Provider::GitHub => "github",
            Provider::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic kind of a normalized webhook event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PrOpened,
    PrEdited,
    PrMerged,
    PrRejected,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Push,
        EventKind::PrOpened,
        EventKind::PrEdited,
        EventKind::PrMerged,
        EventKind::PrRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PrOpened => "pr_opened",
            EventKind::PrEdited => "pr_edited",
            EventKind::PrMerged => "pr_merged",
            EventKind::PrRejected => "pr_rejected",
        }
    }

    pub fn is_pull_request(&self) -> bool {
        !matches!(self, EventKind::Push)
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event kind '{}'", s))
    }
}

/// Owner and name of a hosted repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryIdentity {
    pub owner: String,
    pub name: String,
}

impl RepositoryIdentity {
    /// Builds an identity from separately delivered owner and name fields.
    /// Both must be non-empty.
    pub fn from_parts(owner: &str, name: &str) -> Result<Self, WebhookError> {
        if owner.is_empty() || name.is_empty() {
            return Err(WebhookError::MalformedPayload(format!(
                "incomplete repository identity (owner: '{}', name: '{}')",
                owner, name
            )));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Splits a `owner/name` full name. Exactly two non-empty parts are
    /// accepted.
    pub fn from_full_name(full_name: &str) -> Result<Self, WebhookError> {
        let parts: Vec<&str> = full_name.split('/').collect();
        match parts.as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Self::from_parts(owner, name),
            _ => Err(WebhookError::MalformedPayload(format!(
                "repository full name '{}' is not of the form owner/name",
                full_name
            ))),
        }
    }

    /// Splits a `namespace/name` path at its last separator, so nested
    /// namespaces (`group/subgroup/name`) keep their full owner path.
    pub fn from_namespaced_path(path: &str) -> Result<Self, WebhookError> {
        match path.rsplit_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                Self::from_parts(owner, name)
            }
            _ => Err(WebhookError::MalformedPayload(format!(
                "repository path '{}' is not of the form namespace/name",
                path
            ))),
        }
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The single vendor-neutral record produced for a recognized webhook.
///
/// Push events only carry the target side. Pull request events carry both
/// sides and the pull request id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalEvent {
    pub kind: EventKind,
    pub pull_request_id: Option<u64>,
    pub target_repository: RepositoryIdentity,
    pub target_branch: Option<String>,
    pub source_repository: Option<RepositoryIdentity>,
    pub source_branch: Option<String>,
    /// UTC epoch seconds
    pub occurred_at: i64,
}

/// One side (source or destination) of a pull request.
#[derive(Debug, Clone)]
pub struct PullRequestSide {
    pub repository: RepositoryIdentity,
    pub branch: String,
}

impl CanonicalEvent {
    pub fn push(repository: RepositoryIdentity, branch: String, occurred_at: i64) -> Self {
        Self {
            kind: EventKind::Push,
            pull_request_id: None,
            target_repository: repository,
            target_branch: non_empty(branch),
            source_repository: None,
            source_branch: None,
            occurred_at,
        }
    }

    pub fn pull_request(
        kind: EventKind,
        id: u64,
        source: PullRequestSide,
        target: PullRequestSide,
        occurred_at: i64,
    ) -> Self {
        debug_assert!(kind.is_pull_request());
        Self {
            kind,
            pull_request_id: Some(id),
            target_repository: target.repository,
            target_branch: non_empty(target.branch),
            source_repository: Some(source.repository),
            source_branch: non_empty(source.branch),
            occurred_at,
        }
    }
}

fn non_empty(branch: String) -> Option<String> {
    if branch.is_empty() { None } else { Some(branch) }
}
