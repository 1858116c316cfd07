//! Change-event model and snapshot diffing for quarry.
//!
//! A committed entity mutation is turned into zero or more field-level
//! [`ChangeEvent`]s by [`diff`], which compares the snapshot taken before
//! the mutation against the proposed one. Events are ephemeral: they are
//! produced synchronously, consumed once by the webhook router, and never
//! mutated.

pub mod category;
pub mod differ;
pub mod event;

pub use category::{EventCategory, EventVerb};
pub use differ::diff;
pub use event::ChangeEvent;
