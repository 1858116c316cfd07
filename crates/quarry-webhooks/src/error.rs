//! Error types for the webhook delivery system.

/// Webhook delivery error variants.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Delivery queue is closed")]
    QueueClosed,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, WebhookError>;
