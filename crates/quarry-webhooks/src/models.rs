//! Domain models for webhook subscriptions and delivery records.

use chrono::{DateTime, Utc};
use quarry_core::{WebhookId, WorkspaceId};
use quarry_events::EventCategory;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A webhook subscription owned by a workspace.
///
/// A subscription receives events only for categories whose flag is set and
/// only while `is_active` is true. Within this subsystem the active flag is
/// only ever flipped to false, by the retry exhaustion policy; re-activation
/// is an administrative act elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: WebhookId,
    pub workspace_id: WorkspaceId,
    /// Destination URL as configured. Gated through the destination policy
    /// on every attempt.
    pub url: String,
    /// Signing key. Absence disables signing.
    pub secret: Option<String>,
    pub is_active: bool,
    pub project: bool,
    pub issue: bool,
    pub cycle: bool,
    pub module: bool,
    pub issue_comment: bool,
}

impl WebhookSubscription {
    /// A new active subscription with all category flags off.
    #[must_use]
    pub fn new(workspace_id: WorkspaceId, url: impl Into<String>) -> Self {
        Self {
            id: WebhookId::new(),
            workspace_id,
            url: url.into(),
            secret: None,
            is_active: true,
            project: false,
            issue: false,
            cycle: false,
            module: false,
            issue_comment: false,
        }
    }

    /// Set the signing secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Enable delivery for a category. Sub-entity categories set their
    /// parent's flag.
    #[must_use]
    pub fn watch(mut self, category: EventCategory) -> Self {
        match category.routing_flag() {
            EventCategory::Project => self.project = true,
            EventCategory::Issue => self.issue = true,
            EventCategory::Cycle => self.cycle = true,
            EventCategory::Module => self.module = true,
            EventCategory::IssueComment => self.issue_comment = true,
            // routing_flag never returns a sub-entity category
            EventCategory::ModuleIssue | EventCategory::CycleIssue => {}
        }
        self
    }

    /// Whether this subscription's flags cover a category.
    ///
    /// Does not consider `is_active`; the registry filters on that.
    #[must_use]
    pub fn watches(&self, category: EventCategory) -> bool {
        match category.routing_flag() {
            EventCategory::Project => self.project,
            EventCategory::Issue => self.issue,
            EventCategory::Cycle => self.cycle,
            EventCategory::Module => self.module,
            EventCategory::IssueComment => self.issue_comment,
            EventCategory::ModuleIssue | EventCategory::CycleIssue => false,
        }
    }
}

/// One delivery attempt, as appended to the delivery log.
///
/// Append-only: retries create new records, never updates. The full
/// outbound request is kept as an auditable blob; `response_*` fields are
/// set when any HTTP response was received, `error` carries the failure
/// detail when none was.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub workspace_id: WorkspaceId,
    pub webhook_id: WebhookId,
    pub event_category: EventCategory,
    pub request_method: String,
    pub request_headers: Value,
    /// The exact bytes that were transmitted (and signed).
    pub request_body: String,
    pub response_status: Option<u16>,
    pub response_headers: Option<Value>,
    pub response_body: Option<String>,
    pub error: Option<String>,
    /// Cumulative retry count at the time of this attempt (0 for the
    /// initial attempt).
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription() -> WebhookSubscription {
        WebhookSubscription::new(WorkspaceId::new(), "http://localhost:9000/hook")
    }

    #[test]
    fn test_new_subscription_watches_nothing() {
        let sub = subscription();
        assert!(sub.is_active);
        for category in [
            EventCategory::Project,
            EventCategory::Issue,
            EventCategory::Cycle,
            EventCategory::Module,
            EventCategory::IssueComment,
        ] {
            assert!(!sub.watches(category));
        }
    }

    #[test]
    fn test_watch_sets_single_flag() {
        let sub = subscription().watch(EventCategory::Issue);
        assert!(sub.watches(EventCategory::Issue));
        assert!(!sub.watches(EventCategory::Project));
        assert!(!sub.watches(EventCategory::Module));
    }

    #[test]
    fn test_sub_entity_categories_route_via_parent_flag() {
        let sub = subscription().watch(EventCategory::Module);
        assert!(sub.watches(EventCategory::ModuleIssue));
        assert!(!sub.watches(EventCategory::CycleIssue));

        let sub = subscription().watch(EventCategory::Cycle);
        assert!(sub.watches(EventCategory::CycleIssue));
        assert!(!sub.watches(EventCategory::ModuleIssue));
    }

    #[test]
    fn test_watch_accepts_sub_entity_category() {
        // Watching module_issue is the same as watching module.
        let sub = subscription().watch(EventCategory::ModuleIssue);
        assert!(sub.module);
        assert!(sub.watches(EventCategory::Module));
    }

    #[test]
    fn test_with_secret() {
        let sub = subscription().with_secret("whsec_123");
        assert_eq!(sub.secret.as_deref(), Some("whsec_123"));
    }
}
