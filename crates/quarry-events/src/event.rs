//! The change event produced by diffing entity snapshots.

use quarry_core::{ActorId, EntityId, WorkspaceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category::{EventCategory, EventVerb};

/// A single field-level change on a domain entity.
///
/// Created synchronously from two snapshots, consumed once by the webhook
/// router, never mutated. `field`, `old_value` and `new_value` are `None`
/// for `created` and `deleted` events. The correlation identifiers are set
/// on update events whose changed field itself references another entity
/// (an issue moving between modules, for example).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub category: EventCategory,
    pub verb: EventVerb,
    pub entity_id: EntityId,
    pub field: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub actor_id: ActorId,
    pub workspace_id: WorkspaceId,
    pub origin: Option<String>,
    pub old_identifier: Option<String>,
    pub new_identifier: Option<String>,
}

impl ChangeEvent {
    /// A `created` event. Models entity creation without scanning a diff.
    #[must_use]
    pub fn created(
        category: EventCategory,
        entity_id: EntityId,
        actor_id: ActorId,
        workspace_id: WorkspaceId,
        origin: Option<String>,
    ) -> Self {
        Self {
            category,
            verb: EventVerb::Created,
            entity_id,
            field: None,
            old_value: None,
            new_value: None,
            actor_id,
            workspace_id,
            origin,
            old_identifier: None,
            new_identifier: None,
        }
    }

    /// An `updated` event carrying a single field's old and new value.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn updated(
        category: EventCategory,
        entity_id: EntityId,
        field: String,
        old_value: Value,
        new_value: Value,
        actor_id: ActorId,
        workspace_id: WorkspaceId,
        origin: Option<String>,
    ) -> Self {
        Self {
            category,
            verb: EventVerb::Updated,
            entity_id,
            field: Some(field),
            old_value: Some(old_value),
            new_value: Some(new_value),
            actor_id,
            workspace_id,
            origin,
            old_identifier: None,
            new_identifier: None,
        }
    }

    /// A `deleted` event.
    #[must_use]
    pub fn deleted(
        category: EventCategory,
        entity_id: EntityId,
        actor_id: ActorId,
        workspace_id: WorkspaceId,
        origin: Option<String>,
    ) -> Self {
        Self {
            category,
            verb: EventVerb::Deleted,
            entity_id,
            field: None,
            old_value: None,
            new_value: None,
            actor_id,
            workspace_id,
            origin,
            old_identifier: None,
            new_identifier: None,
        }
    }

    /// Attach correlation identifiers for a changed field that references
    /// another entity.
    #[must_use]
    pub fn with_identifiers(
        mut self,
        old_identifier: Option<String>,
        new_identifier: Option<String>,
    ) -> Self {
        self.old_identifier = old_identifier;
        self.new_identifier = new_identifier;
        self
    }
}
