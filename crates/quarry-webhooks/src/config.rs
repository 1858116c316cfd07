//! Runtime configuration for webhook delivery.

use std::time::Duration;

/// Configuration for the delivery pipeline.
///
/// Defaults carry the production values: destinations are restricted to
/// localhost, disallowed targets degrade to the local receiver sink, and
/// the retry schedule is 600s doubling per attempt with up to 5 retries.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Hosts a destination URL may point at. Checked case-insensitively
    /// against the parsed host of the subscription URL.
    pub allowed_hosts: Vec<String>,
    /// Where disallowed or malformed destinations are redirected.
    pub sink_url: String,
    /// Policy tag sent in the `X-Security-Policy` header and recorded in
    /// `security_info.policy`.
    pub policy_tag: String,
    /// Timeout for the outbound POST.
    pub request_timeout: Duration,
    /// `User-Agent` for outbound requests.
    pub user_agent: String,
    /// Base delay for the exponential retry backoff.
    pub backoff_base: Duration,
    /// Maximum number of retries after the initial attempt. Exhaustion
    /// deactivates the subscription.
    pub max_retries: u32,
    /// Upper bound of the random jitter added to each backoff delay.
    pub jitter_cap: Duration,
    /// Number of concurrent delivery workers.
    pub workers: usize,
    /// Capacity of the in-process delivery queue.
    pub queue_capacity: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec![
                "localhost".to_string(),
                "127.0.0.1".to_string(),
                "0.0.0.0".to_string(),
                "::1".to_string(),
            ],
            sink_url: "http://localhost:8000/api/webhooks/local-receiver/".to_string(),
            policy_tag: "localhost-only".to_string(),
            request_timeout: Duration::from_secs(30),
            user_agent: "quarry-webhooks/1.0".to_string(),
            backoff_base: Duration::from_secs(600),
            max_retries: 5,
            jitter_cap: Duration::from_secs(60),
            workers: 4,
            queue_capacity: 256,
        }
    }
}

impl WebhookConfig {
    /// Replace the destination allow-list.
    #[must_use]
    pub fn with_allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Set the sink destination for disallowed URLs.
    #[must_use]
    pub fn with_sink_url(mut self, url: impl Into<String>) -> Self {
        self.sink_url = url.into();
        self
    }

    /// Set the outbound request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the retry backoff base delay.
    #[must_use]
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the maximum retry count.
    #[must_use]
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the jitter cap for retry delays.
    #[must_use]
    pub fn with_jitter_cap(mut self, cap: Duration) -> Self {
        self.jitter_cap = cap;
        self
    }

    /// Set the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}
