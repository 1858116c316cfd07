//! Delivery workers.
//!
//! Workers drain the task queue, execute delivery attempts, and drive the
//! retry state machine. Deliveries for different subscriptions, and
//! different events for the same subscription, run fully in parallel with
//! no ordering guarantee.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::delivery::{DeliveryOutcome, DeliveryService};
use crate::models::WebhookSubscription;
use crate::queue::{DeliveryTask, RetrySender};
use crate::retry::{DeliveryState, RetryDecision, RetryPolicy};
use crate::store::{DeactivationNotifier, SubscriptionRegistry};

/// Processes one delivery task end to end.
pub struct WebhookWorker {
    delivery: DeliveryService,
    retry_policy: RetryPolicy,
    registry: Arc<dyn SubscriptionRegistry>,
    notifier: Arc<dyn DeactivationNotifier>,
    retry_queue: RetrySender,
}

impl WebhookWorker {
    #[must_use]
    pub fn new(
        delivery: DeliveryService,
        retry_policy: RetryPolicy,
        registry: Arc<dyn SubscriptionRegistry>,
        notifier: Arc<dyn DeactivationNotifier>,
        retry_queue: RetrySender,
    ) -> Self {
        Self {
            delivery,
            retry_policy,
            registry,
            notifier,
            retry_queue,
        }
    }

    /// Run one task: resolve the subscription, deliver, apply the retry
    /// decision.
    pub async fn process(&self, task: DeliveryTask) {
        let subscription = match self.registry.get(task.webhook_id).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => {
                // Deleted between scheduling and execution: benign no-op,
                // no log entry, no retry.
                tracing::debug!(
                    target: "webhook_delivery",
                    webhook_id = %task.webhook_id,
                    "Subscription gone - dropping delivery task"
                );
                return;
            }
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    webhook_id = %task.webhook_id,
                    error = %e,
                    "Failed to load subscription for delivery"
                );
                return;
            }
        };

        if !subscription.is_active {
            tracing::debug!(
                target: "webhook_delivery",
                webhook_id = %subscription.id,
                "Subscription inactive - dropping delivery task"
            );
            return;
        }

        let state = DeliveryState::Attempting;
        let outcome = match self
            .delivery
            .deliver(&task.event, &subscription, task.retry_count)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // Serialization/signing failures are programming errors:
                // the attempt is already recorded, nothing to retry.
                tracing::error!(
                    target: "webhook_delivery",
                    webhook_id = %subscription.id,
                    error = %e,
                    "Delivery attempt aborted - not retrying"
                );
                return;
            }
        };

        let decision = self.retry_policy.decide(&outcome, task.retry_count);
        let state = state.advance(&decision, task.retry_count);

        match decision {
            RetryDecision::Complete => {
                tracing::debug!(
                    target: "webhook_delivery",
                    webhook_id = %subscription.id,
                    state = ?state,
                    "Delivery complete"
                );
            }
            RetryDecision::Retry { delay } => {
                tracing::info!(
                    target: "webhook_delivery",
                    webhook_id = %subscription.id,
                    retry_count = task.retry_count + 1,
                    delay_ms = delay.as_millis() as u64,
                    state = ?state,
                    "Scheduling delivery retry"
                );
                self.retry_queue.enqueue_after(task.next_retry(), delay);
            }
            RetryDecision::Deactivate => {
                let DeliveryOutcome::TransportFailed { ref error } = outcome else {
                    return;
                };
                self.deactivate(&subscription, error).await;
            }
        }
    }

    /// Deactivate an exhausted subscription and notify its owner.
    ///
    /// The registry's deactivate is atomic and idempotent; only the call
    /// that flips the flag sends the notification, so concurrent
    /// exhaustions cannot produce a notification storm.
    async fn deactivate(&self, subscription: &WebhookSubscription, reason: &str) {
        match self.registry.deactivate(subscription.id).await {
            Ok(true) => {
                tracing::warn!(
                    target: "webhook_delivery",
                    webhook_id = %subscription.id,
                    workspace_id = %subscription.workspace_id,
                    reason = %reason,
                    "Subscription deactivated after exhausting retries"
                );
                self.notifier.webhook_deactivated(subscription, reason).await;
            }
            Ok(false) => {
                tracing::debug!(
                    target: "webhook_delivery",
                    webhook_id = %subscription.id,
                    "Subscription already deactivated"
                );
            }
            Err(e) => {
                tracing::error!(
                    target: "webhook_delivery",
                    webhook_id = %subscription.id,
                    error = %e,
                    "Failed to deactivate subscription"
                );
            }
        }
    }
}

/// A pool of workers draining the delivery queue.
///
/// Workers stop once the queue is closed and drained; `join` waits for
/// that. Scheduled retries keep the queue open for the duration of their
/// backoff, so a drain includes them.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` tasks consuming from `rx`.
    #[must_use]
    pub fn spawn(
        workers: usize,
        rx: mpsc::Receiver<DeliveryTask>,
        worker: Arc<WebhookWorker>,
    ) -> Self {
        let rx = Arc::new(Mutex::new(rx));
        let count = workers.max(1);
        let mut handles = Vec::with_capacity(count);

        for worker_id in 0..count {
            let rx = rx.clone();
            let worker = worker.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let task = { rx.lock().await.recv().await };
                    match task {
                        Some(task) => worker.process(task).await,
                        None => break,
                    }
                }
                tracing::debug!(
                    target: "webhook_delivery",
                    worker_id,
                    "Delivery worker stopped"
                );
            }));
        }

        Self { handles }
    }

    /// Wait for all workers to finish draining the queue.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
