//! Collaborator interfaces consumed by the delivery pipeline.
//!
//! Persistence, snapshot serialization and notification transport live
//! outside this subsystem; the pipeline reaches them through these traits.
//! In-memory implementations for tests and local development are in
//! [`memory`].

pub mod memory;

use async_trait::async_trait;
use quarry_core::{ActorId, EntityId, WebhookId, WorkspaceId};
use quarry_events::EventCategory;
use serde_json::Value;

use crate::error::Result;
use crate::models::{DeliveryAttempt, WebhookSubscription};

/// Serializes current entity state for delivery payloads.
///
/// Snapshots are re-fetched at delivery time, not reused from diff time, so
/// receivers never get stale state.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Current field values of an entity, or `None` if it no longer exists.
    async fn snapshot(&self, category: EventCategory, entity_id: EntityId)
        -> Result<Option<Value>>;

    /// Snapshot of the acting user, attached to update activity blocks.
    async fn actor_snapshot(&self, actor_id: ActorId) -> Result<Option<Value>>;
}

/// Store of webhook subscriptions.
#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    /// All active subscriptions in a workspace whose flags cover the given
    /// category (sub-entity categories route through their parent's flag).
    async fn list_active(
        &self,
        workspace_id: WorkspaceId,
        category: EventCategory,
    ) -> Result<Vec<WebhookSubscription>>;

    /// Look up a subscription by id.
    async fn get(&self, webhook_id: WebhookId) -> Result<Option<WebhookSubscription>>;

    /// Flip `is_active` to false. Atomic and idempotent: returns true only
    /// for the call that actually deactivated the subscription, so
    /// concurrent exhaustions produce at most one notification.
    async fn deactivate(&self, webhook_id: WebhookId) -> Result<bool>;
}

/// Append-only store of delivery attempts.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    /// Append one attempt record. Never updated in place.
    async fn append(&self, attempt: DeliveryAttempt) -> Result<()>;
}

/// Receives the deactivation notice when a subscription exhausts its
/// retries. The transport (email, in-app) is outside this subsystem.
#[async_trait]
pub trait DeactivationNotifier: Send + Sync {
    async fn webhook_deactivated(&self, subscription: &WebhookSubscription, reason: &str);
}

/// Notifier that records the deactivation in the log stream only.
pub struct LoggingNotifier;

#[async_trait]
impl DeactivationNotifier for LoggingNotifier {
    async fn webhook_deactivated(&self, subscription: &WebhookSubscription, reason: &str) {
        tracing::warn!(
            target: "webhook_delivery",
            webhook_id = %subscription.id,
            workspace_id = %subscription.workspace_id,
            url = %subscription.url,
            reason = %reason,
            "Webhook deactivated after exhausting retries. Note: only allow-listed destinations are ever contacted"
        );
    }
}
