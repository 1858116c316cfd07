//! Webhook delivery execution.
//!
//! Builds the wire payload for one attempt, signs it, performs the HTTP
//! POST through the destination policy, and records the attempt in the
//! delivery log. No retries happen here; the outcome drives the retry
//! scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use quarry_core::DeliveryId;
use quarry_events::{ChangeEvent, EventVerb};
use reqwest::Client;

use crate::config::WebhookConfig;
use crate::crypto;
use crate::error::{Result, WebhookError};
use crate::models::{DeliveryAttempt, WebhookSubscription};
use crate::payload::{
    WebhookPayload, HEADER_DELIVERY_ID, HEADER_EVENT, HEADER_ORIGINAL_URL,
    HEADER_SECURITY_POLICY, HEADER_SECURITY_WARNING, HEADER_SIGNATURE,
};
use crate::policy::DestinationPolicy;
use crate::store::{DeliveryLog, SnapshotProvider};

/// Result of one delivery attempt.
///
/// Any HTTP response, 2xx or not, counts as `Delivered`; only
/// transport-level failures (timeout, connection refused/reset) are
/// retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { status: u16 },
    TransportFailed { error: String },
}

/// Executes delivery attempts.
pub struct DeliveryService {
    http: Client,
    policy: DestinationPolicy,
    request_timeout: Duration,
    snapshots: Arc<dyn SnapshotProvider>,
    log: Arc<dyn DeliveryLog>,
}

impl DeliveryService {
    /// Create a delivery service with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Internal` if the HTTP client cannot be built.
    pub fn new(
        config: &WebhookConfig,
        snapshots: Arc<dyn SnapshotProvider>,
        log: Arc<dyn DeliveryLog>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| WebhookError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            policy: DestinationPolicy::from_config(config),
            request_timeout: config.request_timeout,
            snapshots,
            log,
        })
    }

    /// Execute one delivery attempt for an event/subscription pair.
    ///
    /// Appends exactly one delivery log record regardless of outcome. An
    /// `Err` return means the attempt died on a programming error
    /// (serialization); those are recorded but never retried.
    pub async fn deliver(
        &self,
        event: &ChangeEvent,
        subscription: &WebhookSubscription,
        retry_count: u32,
    ) -> Result<DeliveryOutcome> {
        // Policy runs on every attempt: the allow-list is live configuration.
        let decision = self.policy.validate(&subscription.url);

        // Snapshot is re-fetched at delivery time so receivers never see
        // state that is staler than the delivery itself.
        let data = match self
            .snapshots
            .snapshot(event.category, event.entity_id)
            .await
        {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(
                    target: "webhook_delivery",
                    webhook_id = %subscription.id,
                    entity_id = %event.entity_id,
                    error = %e,
                    "Snapshot fetch failed - delivering with null data"
                );
                None
            }
        };

        let actor = if event.verb == EventVerb::Updated {
            match self.snapshots.actor_snapshot(event.actor_id).await {
                Ok(actor) => actor,
                Err(e) => {
                    tracing::warn!(
                        target: "webhook_delivery",
                        webhook_id = %subscription.id,
                        actor_id = %event.actor_id,
                        error = %e,
                        "Actor snapshot fetch failed - delivering without actor"
                    );
                    None
                }
            }
        } else {
            None
        };

        let payload =
            WebhookPayload::build(event, subscription.id, data, actor, &decision, self.policy.tag());

        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                let error = format!("Payload serialization failed: {e}");
                tracing::error!(
                    target: "webhook_delivery",
                    webhook_id = %subscription.id,
                    event = %event.category,
                    error = %error,
                    "Delivery attempt aborted"
                );
                self.append(DeliveryAttempt {
                    workspace_id: subscription.workspace_id,
                    webhook_id: subscription.id,
                    event_category: event.category,
                    request_method: "POST".to_string(),
                    request_headers: serde_json::Value::Object(serde_json::Map::new()),
                    request_body: String::new(),
                    response_status: None,
                    response_headers: None,
                    response_body: None,
                    error: Some(error),
                    retry_count,
                    created_at: Utc::now(),
                })
                .await;
                return Err(WebhookError::Serialization(e));
            }
        };

        let delivery_id = DeliveryId::new();

        // Header values here come from constants and UUIDs; the parse
        // fallbacks only matter for destination URLs with exotic bytes.
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(v) = "application/json".parse() {
            headers.insert("Content-Type", v);
        }
        if let Ok(v) = delivery_id.to_string().parse() {
            headers.insert(HEADER_DELIVERY_ID, v);
        }
        if let Ok(v) = event.category.as_str().parse() {
            headers.insert(HEADER_EVENT, v);
        }
        if let Ok(v) = decision.original_url.parse() {
            headers.insert(HEADER_ORIGINAL_URL, v);
        }
        if let Ok(v) = self.policy.tag().parse() {
            headers.insert(HEADER_SECURITY_POLICY, v);
        }

        // The signature covers exactly the bytes that go on the wire.
        if let Some(ref secret) = subscription.secret {
            let signature = crypto::compute_signature(secret, &body);
            if let Ok(v) = signature.parse() {
                headers.insert(HEADER_SIGNATURE, v);
            }
        }

        if !decision.is_allowed {
            if let Ok(v) = format!("External URL blocked: {}", decision.original_url).parse() {
                headers.insert(HEADER_SECURITY_WARNING, v);
            }
        }

        let request_headers = serde_json::Value::Object(headers_to_map(&headers));
        let request_body = String::from_utf8_lossy(&body).into_owned();

        tracing::debug!(
            target: "webhook_delivery",
            delivery_id = %delivery_id,
            webhook_id = %subscription.id,
            workspace_id = %subscription.workspace_id,
            event = %event.category,
            url = %decision.effective_url,
            is_external_blocked = !decision.is_allowed,
            retry_count,
            "Dispatching webhook"
        );

        let result = self
            .http
            .post(&decision.effective_url)
            .headers(headers)
            .body(body)
            .send()
            .await;

        let attempt = |response_status, response_headers, response_body, error| DeliveryAttempt {
            workspace_id: subscription.workspace_id,
            webhook_id: subscription.id,
            event_category: event.category,
            request_method: "POST".to_string(),
            request_headers: request_headers.clone(),
            request_body: request_body.clone(),
            response_status,
            response_headers,
            response_body,
            error,
            retry_count,
            created_at: Utc::now(),
        };

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let response_headers = serde_json::Value::Object(headers_to_map(response.headers()));
                let response_body: String = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(4096)
                    .collect();

                tracing::info!(
                    target: "webhook_delivery",
                    delivery_id = %delivery_id,
                    webhook_id = %subscription.id,
                    status,
                    retry_count,
                    "Webhook delivery completed"
                );

                self.append(attempt(
                    Some(status),
                    Some(response_headers),
                    Some(response_body),
                    None,
                ))
                .await;

                Ok(DeliveryOutcome::Delivered { status })
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("Request timeout ({}s)", self.request_timeout.as_secs())
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };

                tracing::warn!(
                    target: "webhook_delivery",
                    delivery_id = %delivery_id,
                    webhook_id = %subscription.id,
                    error = %error,
                    retry_count,
                    "Webhook delivery failed in transport"
                );

                self.append(attempt(None, None, None, Some(error.clone()))).await;

                Ok(DeliveryOutcome::TransportFailed { error })
            }
        }
    }

    /// Append a delivery record. Log failures are reported, never raised:
    /// the log is insert-only observability, not a delivery dependency.
    async fn append(&self, attempt: DeliveryAttempt) {
        if let Err(e) = self.log.append(attempt).await {
            tracing::error!(
                target: "webhook_delivery",
                error = %e,
                "Failed to append delivery attempt record"
            );
        }
    }
}

/// Convert a reqwest HeaderMap to a JSON-serializable map.
fn headers_to_map(
    headers: &reqwest::header::HeaderMap,
) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            map.insert(name.to_string(), serde_json::Value::String(v.to_string()));
        }
    }
    map
}
