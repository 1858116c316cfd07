//! Destination policy for webhook delivery endpoints.
//!
//! Subscribers can point a webhook anywhere, but outbound traffic only ever
//! goes to hosts on the administrator-defined allow-list. Anything else,
//! including URLs that fail to parse, is redirected to the configured sink
//! and the original target is preserved for auditing. The policy never
//! errors past this boundary.

use url::Url;

use crate::config::WebhookConfig;

/// Outcome of validating a destination URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    /// Whether the original destination was allowed as-is.
    pub is_allowed: bool,
    /// The URL the delivery will actually be sent to.
    pub effective_url: String,
    /// The destination the subscription asked for.
    pub original_url: String,
}

/// Destination allow-list enforcement.
///
/// Cheap to construct and evaluated once per delivery attempt, not once per
/// subscription lifetime, since the allow-list is live configuration.
#[derive(Debug, Clone)]
pub struct DestinationPolicy {
    allowed_hosts: Vec<String>,
    sink_url: String,
    policy_tag: String,
}

impl DestinationPolicy {
    pub fn new(
        allowed_hosts: Vec<String>,
        sink_url: impl Into<String>,
        policy_tag: impl Into<String>,
    ) -> Self {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            sink_url: sink_url.into(),
            policy_tag: policy_tag.into(),
        }
    }

    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(
            config.allowed_hosts.clone(),
            config.sink_url.clone(),
            config.policy_tag.clone(),
        )
    }

    /// The policy tag recorded on every delivery.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.policy_tag
    }

    /// Validate a destination URL against the allow-list.
    ///
    /// Allowed hosts pass through unchanged. Disallowed hosts and malformed
    /// URLs degrade to the sink, with a policy-violation log entry emitted
    /// before returning.
    pub fn validate(&self, raw_url: &str) -> PolicyDecision {
        match Url::parse(raw_url) {
            Ok(parsed) => {
                let host = parsed.host_str().map(normalize_host);
                match host {
                    Some(host) if self.allowed_hosts.iter().any(|h| *h == host) => {
                        PolicyDecision {
                            is_allowed: true,
                            effective_url: raw_url.to_string(),
                            original_url: raw_url.to_string(),
                        }
                    }
                    _ => self.block(raw_url, "destination host not on the allow-list"),
                }
            }
            Err(e) => self.block(raw_url, &format!("malformed destination URL: {e}")),
        }
    }

    fn block(&self, original_url: &str, reason: &str) -> PolicyDecision {
        tracing::warn!(
            target: "webhook_security",
            original_url = %original_url,
            redirected_to = %self.sink_url,
            policy = %self.policy_tag,
            reason = %reason,
            "Blocked webhook destination"
        );

        PolicyDecision {
            is_allowed: false,
            effective_url: self.sink_url.clone(),
            original_url: original_url.to_string(),
        }
    }
}

/// Lowercase and strip IPv6 brackets so hosts compare against allow-list
/// entries like `::1`.
fn normalize_host(host: &str) -> String {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase()
}
