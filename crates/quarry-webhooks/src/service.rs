//! The webhook service: the single entry point the CRUD layer calls after
//! a mutation commits.

use std::sync::Arc;

use quarry_core::{ActorId, EntityId, WorkspaceId};
use quarry_events::{diff, ChangeEvent, EventCategory};
use serde_json::{Map, Value};

use crate::config::WebhookConfig;
use crate::delivery::DeliveryService;
use crate::error::Result;
use crate::queue::{DeliveryTask, TaskQueue};
use crate::retry::RetryPolicy;
use crate::store::{DeactivationNotifier, DeliveryLog, SnapshotProvider, SubscriptionRegistry};
use crate::worker::{WebhookWorker, WorkerPool};

/// Diffs committed mutations into change events, routes them to matching
/// subscriptions, and hands delivery tasks to the worker pool.
pub struct WebhookService {
    registry: Arc<dyn SubscriptionRegistry>,
    queue: TaskQueue,
    workers: WorkerPool,
}

impl WebhookService {
    /// Wire up the pipeline and start the delivery workers.
    pub fn start(
        config: WebhookConfig,
        snapshots: Arc<dyn SnapshotProvider>,
        registry: Arc<dyn SubscriptionRegistry>,
        log: Arc<dyn DeliveryLog>,
        notifier: Arc<dyn DeactivationNotifier>,
    ) -> Result<Self> {
        let delivery = DeliveryService::new(&config, snapshots, log)?;
        let (queue, rx) = TaskQueue::new(config.queue_capacity);
        let worker = Arc::new(WebhookWorker::new(
            delivery,
            RetryPolicy::from_config(&config),
            registry.clone(),
            notifier,
            queue.downgrade(),
        ));
        let workers = WorkerPool::spawn(config.workers, rx, worker);

        Ok(Self {
            registry,
            queue,
            workers,
        })
    }

    /// Entry point for committed entity mutations.
    ///
    /// Diffs the snapshots into change events and schedules deliveries for
    /// each. A `None` prior snapshot models creation. Scheduling does not
    /// wait for any delivery to complete.
    #[allow(clippy::too_many_arguments)]
    pub async fn on_entity_change(
        &self,
        category: EventCategory,
        entity_id: EntityId,
        prior: Option<&Map<String, Value>>,
        proposed: &Map<String, Value>,
        actor_id: ActorId,
        workspace_id: WorkspaceId,
        origin: Option<&str>,
    ) -> Result<()> {
        for event in diff(
            category,
            entity_id,
            prior,
            proposed,
            actor_id,
            workspace_id,
            origin,
        ) {
            self.publish(event).await?;
        }
        Ok(())
    }

    /// Route a fully-formed change event to matching subscriptions.
    ///
    /// Used directly for sub-entity events (`module_issue`, `cycle_issue`)
    /// and deletions, which are built by the caller with their correlation
    /// identifiers rather than diffed from snapshots.
    pub async fn publish(&self, event: ChangeEvent) -> Result<()> {
        let subscriptions = self
            .registry
            .list_active(event.workspace_id, event.category)
            .await?;

        if subscriptions.is_empty() {
            tracing::debug!(
                target: "webhook_delivery",
                event = %event.category,
                verb = %event.verb,
                workspace_id = %event.workspace_id,
                "No active subscriptions match event"
            );
            return Ok(());
        }

        tracing::info!(
            target: "webhook_delivery",
            event = %event.category,
            verb = %event.verb,
            workspace_id = %event.workspace_id,
            subscription_count = subscriptions.len(),
            "Routing change event to subscriptions"
        );

        for subscription in subscriptions {
            self.queue
                .enqueue(DeliveryTask::new(event.clone(), subscription.id))
                .await?;
        }

        Ok(())
    }

    /// Stop accepting new events and wait for in-flight deliveries,
    /// including retries already in their backoff window, to drain.
    pub async fn shutdown(self) {
        let Self { queue, workers, .. } = self;
        drop(queue);
        workers.join().await;
    }
}
