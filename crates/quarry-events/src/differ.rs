//! Field-level snapshot diffing.

use quarry_core::{ActorId, EntityId, WorkspaceId};
use serde_json::{Map, Value};

use crate::category::EventCategory;
use crate::event::ChangeEvent;

/// Compare a prior snapshot against a proposed one and produce the change
/// events for the mutation.
///
/// - A missing prior snapshot means the entity was just created: exactly one
///   `created` event is produced, with no field detail.
/// - Otherwise one `updated` event is produced per key of `proposed` that is
///   also present in `prior` with a different value. Keys absent from
///   `prior` are silently skipped: only fields the caller explicitly
///   tracked in the prior snapshot are diffable.
/// - Values are compared whole. Nested values are opaque; there is no
///   structural diffing.
///
/// This is a pure function: no I/O, deterministic, and the returned
/// iterator is lazy with at most `proposed.len()` items.
pub fn diff<'a>(
    category: EventCategory,
    entity_id: EntityId,
    prior: Option<&'a Map<String, Value>>,
    proposed: &'a Map<String, Value>,
    actor_id: ActorId,
    workspace_id: WorkspaceId,
    origin: Option<&'a str>,
) -> impl Iterator<Item = ChangeEvent> + 'a {
    let created = prior.is_none().then(|| {
        ChangeEvent::created(
            category,
            entity_id,
            actor_id,
            workspace_id,
            origin.map(str::to_owned),
        )
    });

    let updates = prior.into_iter().flat_map(move |prior| {
        proposed.iter().filter_map(move |(field, proposed_value)| {
            let prior_value = prior.get(field)?;
            (prior_value != proposed_value).then(|| {
                ChangeEvent::updated(
                    category,
                    entity_id,
                    field.clone(),
                    prior_value.clone(),
                    proposed_value.clone(),
                    actor_id,
                    workspace_id,
                    origin.map(str::to_owned),
                )
            })
        })
    });

    created.into_iter().chain(updates)
}
