//! In-process delivery task queue.
//!
//! Producer/consumer over a bounded `tokio::mpsc` channel. Scheduling a
//! task never blocks on delivery completion; a full queue applies
//! backpressure to the producer only. Retries are re-enqueued by a timer
//! task so workers stay free during the backoff window. Delivery is
//! at-least-once; tasks still in the queue or in a backoff window when the
//! process stops are lost to this process (durability belongs to the
//! backing queue in deployments that need it).

use quarry_core::WebhookId;
use quarry_events::ChangeEvent;
use tokio::sync::mpsc;

use crate::error::{Result, WebhookError};

/// One delivery to one subscription.
///
/// The queue carries one task per (event, subscription) pair; retries bump
/// `retry_count` and re-enter the same queue.
#[derive(Debug, Clone)]
pub struct DeliveryTask {
    pub event: ChangeEvent,
    pub webhook_id: WebhookId,
    pub retry_count: u32,
}

impl DeliveryTask {
    #[must_use]
    pub fn new(event: ChangeEvent, webhook_id: WebhookId) -> Self {
        Self {
            event,
            webhook_id,
            retry_count: 0,
        }
    }

    /// The follow-up task for the next retry.
    #[must_use]
    pub fn next_retry(mut self) -> Self {
        self.retry_count += 1;
        self
    }
}

/// Producer handle for the delivery queue.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<DeliveryTask>,
}

impl TaskQueue {
    /// Create the queue and its consumer end.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DeliveryTask>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue a task for immediate processing.
    pub async fn enqueue(&self, task: DeliveryTask) -> Result<()> {
        self.tx
            .send(task)
            .await
            .map_err(|_| WebhookError::QueueClosed)
    }

    /// A weak handle for retry scheduling. Holding it does not keep the
    /// queue open, so workers can drain and stop once producers are gone.
    #[must_use]
    pub fn downgrade(&self) -> RetrySender {
        RetrySender {
            tx: self.tx.downgrade(),
        }
    }
}

/// Re-enqueues retries without keeping the queue alive on its own.
#[derive(Clone)]
pub struct RetrySender {
    tx: mpsc::WeakSender<DeliveryTask>,
}

impl RetrySender {
    /// Schedule a task to re-enter the queue after `delay`.
    ///
    /// The timer task holds a strong sender for the duration of the
    /// backoff, so a graceful drain waits for scheduled retries. Only the
    /// logical task is suspended; no worker blocks.
    pub fn enqueue_after(&self, task: DeliveryTask, delay: std::time::Duration) {
        let Some(tx) = self.tx.upgrade() else {
            tracing::warn!(
                target: "webhook_delivery",
                webhook_id = %task.webhook_id,
                retry_count = task.retry_count,
                "Queue closed - dropping scheduled retry"
            );
            return;
        };

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(task).await.is_err() {
                tracing::warn!(
                    target: "webhook_delivery",
                    "Queue closed while a retry was in its backoff window"
                );
            }
        });
    }
}
