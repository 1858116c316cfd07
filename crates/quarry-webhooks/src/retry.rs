//! Retry/backoff state machine and exhaustion policy.
//!
//! Only transport-level failures are retried. Any HTTP response, success or
//! error status, is terminal: a subscriber returning 500 forever will never
//! trigger deactivation. That asymmetry is intentional and preserved from
//! the observed production behavior (see DESIGN.md).

use std::time::Duration;

use rand::Rng;

use crate::config::WebhookConfig;
use crate::delivery::DeliveryOutcome;

/// What the scheduler decided to do with a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Terminal: an HTTP response was received (any status).
    Complete,
    /// Re-enqueue the task after the delay.
    Retry { delay: Duration },
    /// Retries exhausted: deactivate the subscription.
    Deactivate,
}

/// Lifecycle of one logical delivery.
///
/// `Pending → Attempting → {Delivered | Scheduled(n) | Deactivated}`;
/// a scheduled task becomes `Pending` again when its backoff elapses.
/// There is no cancel transition: once scheduled, a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Attempting,
    Delivered,
    Scheduled(u32),
    Deactivated,
}

impl DeliveryState {
    /// Advance an `Attempting` task by the scheduler's decision.
    #[must_use]
    pub fn advance(self, decision: &RetryDecision, retry_count: u32) -> DeliveryState {
        match decision {
            RetryDecision::Complete => DeliveryState::Delivered,
            RetryDecision::Retry { .. } => DeliveryState::Scheduled(retry_count + 1),
            RetryDecision::Deactivate => DeliveryState::Deactivated,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::Deactivated)
    }
}

/// Retry policy parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    backoff_base: Duration,
    max_retries: u32,
    jitter_cap: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(backoff_base: Duration, max_retries: u32, jitter_cap: Duration) -> Self {
        Self {
            backoff_base,
            max_retries,
            jitter_cap,
        }
    }

    #[must_use]
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(config.backoff_base, config.max_retries, config.jitter_cap)
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Deterministic part of the delay before retry number
    /// `retry_count + 1`: `base * 2^retry_count`.
    #[must_use]
    pub fn backoff(&self, retry_count: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << retry_count.min(31))
    }

    /// Decide the fate of an attempt that just finished with `outcome`
    /// after `retry_count` prior retries.
    #[must_use]
    pub fn decide(&self, outcome: &DeliveryOutcome, retry_count: u32) -> RetryDecision {
        match outcome {
            DeliveryOutcome::Delivered { .. } => RetryDecision::Complete,
            DeliveryOutcome::TransportFailed { .. } => {
                if retry_count < self.max_retries {
                    RetryDecision::Retry {
                        delay: self.backoff(retry_count) + self.jitter(),
                    }
                } else {
                    RetryDecision::Deactivate
                }
            }
        }
    }

    fn jitter(&self) -> Duration {
        let cap_ms = self.jitter_cap.as_millis() as u64;
        if cap_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=cap_ms))
    }
}
