//! In-memory collaborator implementations.
//!
//! Used by tests and local development. The registry's deactivation is
//! atomic under its write lock, matching the single-UPDATE semantics of a
//! database-backed registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use quarry_core::{ActorId, EntityId, WebhookId, WorkspaceId};
use quarry_events::EventCategory;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{DeliveryAttempt, WebhookSubscription};
use crate::store::{DeactivationNotifier, DeliveryLog, SnapshotProvider, SubscriptionRegistry};

/// Snapshot provider backed by maps of pre-loaded entity and actor state.
#[derive(Default)]
pub struct InMemorySnapshotProvider {
    entities: RwLock<HashMap<(EventCategory, EntityId), Value>>,
    actors: RwLock<HashMap<ActorId, Value>>,
}

impl InMemorySnapshotProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_entity(&self, category: EventCategory, entity_id: EntityId, state: Value) {
        self.entities
            .write()
            .await
            .insert((category, entity_id), state);
    }

    pub async fn remove_entity(&self, category: EventCategory, entity_id: EntityId) {
        self.entities.write().await.remove(&(category, entity_id));
    }

    pub async fn set_actor(&self, actor_id: ActorId, state: Value) {
        self.actors.write().await.insert(actor_id, state);
    }
}

#[async_trait]
impl SnapshotProvider for InMemorySnapshotProvider {
    async fn snapshot(
        &self,
        category: EventCategory,
        entity_id: EntityId,
    ) -> Result<Option<Value>> {
        Ok(self
            .entities
            .read()
            .await
            .get(&(category, entity_id))
            .cloned())
    }

    async fn actor_snapshot(&self, actor_id: ActorId) -> Result<Option<Value>> {
        Ok(self.actors.read().await.get(&actor_id).cloned())
    }
}

/// Subscription registry backed by a map.
#[derive(Default)]
pub struct InMemorySubscriptionRegistry {
    subscriptions: RwLock<HashMap<WebhookId, WebhookSubscription>>,
}

impl InMemorySubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, subscription: WebhookSubscription) {
        self.subscriptions
            .write()
            .await
            .insert(subscription.id, subscription);
    }

    pub async fn remove(&self, webhook_id: WebhookId) {
        self.subscriptions.write().await.remove(&webhook_id);
    }
}

#[async_trait]
impl SubscriptionRegistry for InMemorySubscriptionRegistry {
    async fn list_active(
        &self,
        workspace_id: WorkspaceId,
        category: EventCategory,
    ) -> Result<Vec<WebhookSubscription>> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|sub| {
                sub.workspace_id == workspace_id && sub.is_active && sub.watches(category)
            })
            .cloned()
            .collect())
    }

    async fn get(&self, webhook_id: WebhookId) -> Result<Option<WebhookSubscription>> {
        Ok(self.subscriptions.read().await.get(&webhook_id).cloned())
    }

    async fn deactivate(&self, webhook_id: WebhookId) -> Result<bool> {
        let mut subscriptions = self.subscriptions.write().await;
        match subscriptions.get_mut(&webhook_id) {
            Some(sub) if sub.is_active => {
                sub.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Delivery log backed by a vector.
#[derive(Default)]
pub struct InMemoryDeliveryLog {
    attempts: RwLock<Vec<DeliveryAttempt>>,
}

impl InMemoryDeliveryLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attempts(&self) -> Vec<DeliveryAttempt> {
        self.attempts.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.attempts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.attempts.read().await.is_empty()
    }
}

#[async_trait]
impl DeliveryLog for InMemoryDeliveryLog {
    async fn append(&self, attempt: DeliveryAttempt) -> Result<()> {
        self.attempts.write().await.push(attempt);
        Ok(())
    }
}

/// Notifier that records every deactivation notice, for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: RwLock<Vec<(WebhookId, String)>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn notices(&self) -> Vec<(WebhookId, String)> {
        self.notices.read().await.clone()
    }
}

#[async_trait]
impl DeactivationNotifier for RecordingNotifier {
    async fn webhook_deactivated(&self, subscription: &WebhookSubscription, reason: &str) {
        self.notices
            .write()
            .await
            .push((subscription.id, reason.to_string()));
    }
}
