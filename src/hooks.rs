//! Webhook registration payloads.
//!
//! Builds the JSON body a provider client sends to register a hook that
//! delivers the requested event kinds to this gateway. No request is sent
//! from here.

use serde_json::{Value, json};
use url::Url;

use crate::error::GatewayError;
use crate::parser::{bitbucket_cloud, bitbucket_server, github};
use crate::webhook::{EventKind, Provider};

/// What a registered hook should look like.
#[derive(Debug, Clone)]
pub struct HookSpec<'a> {
    pub name: &'a str,
    pub payload_url: &'a Url,
    pub token: &'a str,
    pub events: &'a [EventKind],
}

pub fn build_hook_payload(provider: Provider, hook: &HookSpec<'_>) -> Result<Value, GatewayError> {
    if hook.events.is_empty() {
        return Err(GatewayError::HookPayload(
            "at least one event kind is required".to_string(),
        ));
    }

    let payload = match provider {
        Provider::BitbucketCloud => {
            // Bitbucket Cloud has no hook secret; the token rides along in the URL.
            let mut url = hook.payload_url.clone();
            if !hook.token.is_empty() {
                url.query_pairs_mut().append_pair("token", hook.token);
            }
            json!({
                "description": hook.name,
                "url": url.as_str(),
                "active": true,
                "events": event_names(hook.events, bitbucket_cloud::event_key),
            })
        }
        Provider::BitbucketServer => json!({
            "name": hook.name,
            "url": hook.payload_url.as_str(),
            "active": true,
            "events": event_names(hook.events, bitbucket_server::event_key),
            "configuration": { "secret": hook.token },
        }),
        Provider::GitHub => json!({
            "name": "web",
            "active": true,
            "events": event_names(hook.events, github::event_name),
            "config": {
                "url": hook.payload_url.as_str(),
                "content_type": "json",
                "insecure_ssl": "0",
                "secret": hook.token,
            },
        }),
        Provider::GitLab => json!({
            "url": hook.payload_url.as_str(),
            "token": hook.token,
            "push_events": hook.events.contains(&EventKind::Push),
            "merge_requests_events": hook.events.iter().any(EventKind::is_pull_request),
            "enable_ssl_verification": true,
        }),
    };
    Ok(payload)
}

/// Parses a comma separated list such as `push,pr_opened`.
pub fn parse_event_list(list: &str) -> Result<Vec<EventKind>, GatewayError> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.parse::<EventKind>().map_err(GatewayError::HookPayload))
        .collect()
}

/// Provider event names for the given kinds, first occurrence order, no
/// duplicates.
fn event_names(events: &[EventKind], name: fn(EventKind) -> &'static str) -> Vec<&'static str> {
    let mut names: Vec<&'static str> = Vec::with_capacity(events.len());
    for kind in events {
        let event_name = name(*kind);
        if !names.contains(&event_name) {
            names.push(event_name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook_spec<'a>(url: &'a Url, token: &'a str, events: &'a [EventKind]) -> HookSpec<'a> {
        HookSpec {
            name: "ci-gateway",
            payload_url: url,
            token,
            events,
        }
    }

    #[test]
    fn bitbucket_cloud_carries_token_in_url() {
        let url = Url::parse("https://ci.example.com/webhook/acme").unwrap();
        let payload = build_hook_payload(
            Provider::BitbucketCloud,
            &hook_spec(&url, "s3cr&t", &[EventKind::Push, EventKind::PrMerged]),
        )
        .unwrap();

        assert_eq!(
            payload["url"],
            "https://ci.example.com/webhook/acme?token=s3cr%26t"
        );
        assert_eq!(payload["events"], json!(["repo:push", "pullrequest:fulfilled"]));
    }

    #[test]
    fn bitbucket_cloud_without_token_keeps_url() {
        let url = Url::parse("https://ci.example.com/webhook/acme").unwrap();
        let payload =
            build_hook_payload(Provider::BitbucketCloud, &hook_spec(&url, "", &[EventKind::Push]))
                .unwrap();
        assert_eq!(payload["url"], "https://ci.example.com/webhook/acme");
    }

    #[test]
    fn bitbucket_server_events_classify_back() {
        let url = Url::parse("https://ci.example.com/webhook/dc").unwrap();
        let payload = build_hook_payload(
            Provider::BitbucketServer,
            &hook_spec(&url, "s3cret", &EventKind::ALL),
        )
        .unwrap();

        assert_eq!(payload["configuration"]["secret"], "s3cret");
        let events: Vec<EventKind> = payload["events"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|name| bitbucket_server::classify(name.as_str().unwrap()))
            .collect();
        assert_eq!(events, EventKind::ALL.to_vec());
    }

    #[test]
    fn github_events_are_deduplicated() {
        let url = Url::parse("https://ci.example.com/webhook/gh").unwrap();
        let payload =
            build_hook_payload(Provider::GitHub, &hook_spec(&url, "s3cret", &EventKind::ALL)).unwrap();
        assert_eq!(payload["events"], json!(["push", "pull_request"]));
        assert_eq!(payload["config"]["secret"], "s3cret");
        assert_eq!(payload["config"]["content_type"], "json");
    }

    #[test]
    fn gitlab_uses_flags() {
        let url = Url::parse("https://ci.example.com/webhook/gl").unwrap();
        let payload =
            build_hook_payload(Provider::GitLab, &hook_spec(&url, "t", &[EventKind::PrOpened])).unwrap();
        assert_eq!(payload["push_events"], false);
        assert_eq!(payload["merge_requests_events"], true);
        assert_eq!(payload["token"], "t");
    }

    #[test]
    fn empty_event_list_is_rejected() {
        let url = Url::parse("https://ci.example.com/webhook/gl").unwrap();
        assert!(build_hook_payload(Provider::GitLab, &hook_spec(&url, "", &[])).is_err());
    }

    #[test]
    fn event_list_parsing() {
        assert_eq!(
            parse_event_list("push, pr_opened,,pr_merged").unwrap(),
            vec![EventKind::Push, EventKind::PrOpened, EventKind::PrMerged]
        );
        assert!(parse_event_list("push,issue_created").is_err());
    }
}
