//! Common test utilities for quarry-webhooks integration tests.
//!
//! Provides mock servers, capture responders and a wired-up service
//! harness for verifying delivery behavior without a real database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quarry_core::{ActorId, EntityId, WebhookId, WorkspaceId};
use quarry_events::{ChangeEvent, EventCategory};
use quarry_webhooks::store::memory::{
    InMemoryDeliveryLog, InMemorySnapshotProvider, InMemorySubscriptionRegistry, RecordingNotifier,
};
use quarry_webhooks::store::SubscriptionRegistry;
use quarry_webhooks::{WebhookConfig, WebhookService, WebhookSubscription};
use serde_json::json;
use wiremock::{Request, Respond, ResponseTemplate};

pub const SECRET_1: &str = "whsec_test_secret_key_12345";

// ---------------------------------------------------------------------------
// Service harness
// ---------------------------------------------------------------------------

/// A webhook service wired to in-memory collaborators, with fast retry
/// timing for tests.
pub struct Harness {
    pub service: WebhookService,
    pub snapshots: Arc<InMemorySnapshotProvider>,
    pub registry: Arc<InMemorySubscriptionRegistry>,
    pub log: Arc<InMemoryDeliveryLog>,
    pub notifier: Arc<RecordingNotifier>,
    pub workspace: WorkspaceId,
}

impl Harness {
    pub fn start(config: WebhookConfig) -> Self {
        let snapshots = Arc::new(InMemorySnapshotProvider::new());
        let registry = Arc::new(InMemorySubscriptionRegistry::new());
        let log = Arc::new(InMemoryDeliveryLog::new());
        let notifier = RecordingNotifier::new();

        let service = WebhookService::start(
            config,
            snapshots.clone(),
            registry.clone(),
            log.clone(),
            notifier.clone(),
        )
        .expect("service should start");

        Self {
            service,
            snapshots,
            registry,
            log,
            notifier,
            workspace: WorkspaceId::new(),
        }
    }

    /// Default harness: mock servers bind to 127.0.0.1, which is on the
    /// default allow-list; retries are effectively instant.
    pub fn start_default() -> Self {
        Self::start(fast_config())
    }

    pub async fn subscribe(&self, subscription: WebhookSubscription) {
        self.registry.insert(subscription).await;
    }

    /// Poll until the delivery log holds at least `n` attempts.
    pub async fn wait_for_attempts(&self, n: usize, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.log.len().await < n {
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "expected {n} delivery attempts within {timeout:?}, got {}",
                    self.log.len().await
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until a subscription has been deactivated.
    pub async fn wait_for_inactive(&self, webhook_id: WebhookId, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let active = self
                .registry
                .get(webhook_id)
                .await
                .unwrap()
                .map(|sub| sub.is_active)
                .unwrap_or(false);
            if !active {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("subscription still active after {timeout:?}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Default config with millisecond-scale retry timing.
pub fn fast_config() -> WebhookConfig {
    WebhookConfig::default()
        .with_backoff_base(Duration::from_millis(10))
        .with_jitter_cap(Duration::ZERO)
        .with_request_timeout(Duration::from_secs(5))
}

pub fn issue_subscription(workspace: WorkspaceId, url: &str) -> WebhookSubscription {
    WebhookSubscription::new(workspace, url).watch(EventCategory::Issue)
}

pub fn issue_created(workspace: WorkspaceId) -> ChangeEvent {
    ChangeEvent::created(
        EventCategory::Issue,
        EntityId::new(),
        ActorId::new(),
        workspace,
        Some("https://app.example.com".to_string()),
    )
}

pub fn issue_updated(workspace: WorkspaceId, entity: EntityId, actor: ActorId) -> ChangeEvent {
    ChangeEvent::updated(
        EventCategory::Issue,
        entity,
        "state".to_string(),
        json!("open"),
        json!("closed"),
        actor,
        workspace,
        Some("https://app.example.com".to_string()),
    )
}

/// A URL that refuses connections: bind an ephemeral port, then free it.
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}/hook")
}

// ---------------------------------------------------------------------------
// CapturedRequest - for inspecting webhook requests
// ---------------------------------------------------------------------------

/// A captured HTTP request with body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl CapturedRequest {
    /// Parse the body as JSON.
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// CaptureResponder - captures requests and responds with a fixed status
// ---------------------------------------------------------------------------

/// A wiremock responder that captures incoming requests.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    response_code: u16,
}

impl CaptureResponder {
    /// Create a new capture responder that returns 200 OK.
    pub fn new() -> Self {
        Self::with_status(200)
    }

    /// Create a capture responder that returns a custom status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: status,
        }
    }

    /// Get all captured requests.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for CaptureResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let captured = CapturedRequest {
            body: request.body.clone(),
            headers: request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect(),
        };
        self.requests.lock().unwrap().push(captured);
        ResponseTemplate::new(self.response_code)
    }
}

// ---------------------------------------------------------------------------
// CountingResponder - counts requests
// ---------------------------------------------------------------------------

/// A wiremock responder that counts incoming requests.
#[derive(Clone)]
pub struct CountingResponder {
    count: Arc<AtomicU32>,
    response_code: u16,
}

impl CountingResponder {
    /// Create a counting responder with a custom status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            count: Arc::new(AtomicU32::new(0)),
            response_code: status,
        }
    }

    /// Get the current request count.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Respond for CountingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.count.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(self.response_code)
    }
}
