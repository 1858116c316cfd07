//! Strongly Typed Identifiers
//!
//! This module provides type-safe identifier types for quarry.
//! Using the newtype pattern, these types prevent accidental misuse of
//! different ID types at compile time.
//!
//! # Example
//!
//! ```
//! use quarry_core::{WebhookId, WorkspaceId};
//!
//! let workspace = WorkspaceId::new();
//! let webhook = WebhookId::new();
//!
//! // Type safety: cannot pass WebhookId where WorkspaceId is expected
//! fn requires_workspace(id: WorkspaceId) -> String {
//!     id.to_string()
//! }
//!
//! let result = requires_workspace(workspace);
//! // requires_workspace(webhook); // This would not compile!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying UUID parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }
    };
}

define_id! {
    /// Identifier for a workspace. Every webhook subscription belongs to
    /// exactly one workspace.
    WorkspaceId
}

define_id! {
    /// Identifier for a webhook subscription.
    WebhookId
}

define_id! {
    /// Identifier for a domain entity (project, issue, cycle, module, comment).
    EntityId
}

define_id! {
    /// Identifier for the user who performed a mutation.
    ActorId
}

define_id! {
    /// Identifier for a single delivery attempt. A fresh one is generated
    /// per outbound request and sent in the `X-Delivery-Id` header.
    DeliveryId
}
