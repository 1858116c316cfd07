//! The canonical wire payload and delivery headers.
//!
//! Field order and header names are a wire contract with existing
//! receivers; the serialized byte sequence used for signing is the one
//! transmitted.

use chrono::Utc;
use quarry_core::{WebhookId, WorkspaceId};
use quarry_events::{ChangeEvent, EventVerb};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::policy::PolicyDecision;

/// Fresh random identifier per attempt.
pub const HEADER_DELIVERY_ID: &str = "X-Delivery-Id";
/// Entity category of the event.
pub const HEADER_EVENT: &str = "X-Event";
/// The destination the subscription asked for, before policy rewriting.
pub const HEADER_ORIGINAL_URL: &str = "X-Original-URL";
/// Fixed policy tag.
pub const HEADER_SECURITY_POLICY: &str = "X-Security-Policy";
/// Hex HMAC-SHA256 of the body; present only when the subscription has a
/// secret.
pub const HEADER_SIGNATURE: &str = "X-Signature";
/// Present only when the destination was rewritten to the sink.
pub const HEADER_SECURITY_WARNING: &str = "X-Security-Warning";

/// The JSON body POSTed to a webhook destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub action: String,
    pub webhook_id: WebhookId,
    pub workspace_id: WorkspaceId,
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<ActivityRecord>,
    pub security_info: SecurityInfo,
}

/// Field-level change detail, present only on update events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub field: Option<String>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    pub actor: Option<Value>,
    pub old_identifier: Option<String>,
    pub new_identifier: Option<String>,
}

/// Audit trail of the destination policy decision for this delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityInfo {
    pub original_url: String,
    pub is_external_blocked: bool,
    pub policy: String,
    pub timestamp: String,
}

impl WebhookPayload {
    /// Assemble the payload for one delivery attempt.
    ///
    /// `data` is the entity snapshot re-fetched at delivery time; `actor`
    /// is the acting user's snapshot, attached to the activity block on
    /// updates.
    #[must_use]
    pub fn build(
        event: &ChangeEvent,
        webhook_id: WebhookId,
        data: Option<Value>,
        actor: Option<Value>,
        decision: &PolicyDecision,
        policy_tag: &str,
    ) -> Self {
        let activity = matches!(event.verb, EventVerb::Updated).then(|| {
            ActivityRecord {
                field: event.field.clone(),
                new_value: event.new_value.clone(),
                old_value: event.old_value.clone(),
                actor,
                old_identifier: event.old_identifier.clone(),
                new_identifier: event.new_identifier.clone(),
            }
        });

        Self {
            event: event.category.as_str().to_string(),
            action: event.verb.action().to_string(),
            webhook_id,
            workspace_id: event.workspace_id,
            data,
            activity,
            security_info: SecurityInfo {
                original_url: decision.original_url.clone(),
                is_external_blocked: !decision.is_allowed,
                policy: policy_tag.to_string(),
                timestamp: Utc::now().to_rfc3339(),
            },
        }
    }
}
