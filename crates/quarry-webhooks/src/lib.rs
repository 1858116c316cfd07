//! Webhook event delivery for quarry.
//!
//! Turns committed entity mutations into signed webhook deliveries:
//! field-level change events are routed to matching workspace
//! subscriptions, gated through a destination allow-list, delivered with
//! HMAC-SHA256 signatures, and retried with exponential backoff until the
//! subscription is deactivated.

pub mod config;
pub mod crypto;
pub mod delivery;
pub mod error;
pub mod models;
pub mod payload;
pub mod policy;
pub mod queue;
pub mod retry;
pub mod service;
pub mod store;
pub mod worker;

pub use config::WebhookConfig;
pub use delivery::{DeliveryOutcome, DeliveryService};
pub use error::WebhookError;
pub use models::{DeliveryAttempt, WebhookSubscription};
pub use payload::WebhookPayload;
pub use policy::{DestinationPolicy, PolicyDecision};
pub use retry::{DeliveryState, RetryDecision, RetryPolicy};
pub use service::WebhookService;
pub use worker::WebhookWorker;
