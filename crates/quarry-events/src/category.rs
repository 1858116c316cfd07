//! Entity categories and mutation verbs.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The category of entity a change event refers to.
///
/// `ModuleIssue` and `CycleIssue` are sub-entity categories: an issue being
/// added to or removed from a module/cycle. They have no subscription flag
/// of their own and route through their parent's flag (see
/// [`EventCategory::routing_flag`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Project,
    Issue,
    Cycle,
    Module,
    IssueComment,
    ModuleIssue,
    CycleIssue,
}

impl EventCategory {
    /// String form used on the wire (`X-Event` header, payload `event` field).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Issue => "issue",
            Self::Cycle => "cycle",
            Self::Module => "module",
            Self::IssueComment => "issue_comment",
            Self::ModuleIssue => "module_issue",
            Self::CycleIssue => "cycle_issue",
        }
    }

    /// Parse from the wire string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project" => Some(Self::Project),
            "issue" => Some(Self::Issue),
            "cycle" => Some(Self::Cycle),
            "module" => Some(Self::Module),
            "issue_comment" => Some(Self::IssueComment),
            "module_issue" => Some(Self::ModuleIssue),
            "cycle_issue" => Some(Self::CycleIssue),
            _ => None,
        }
    }

    /// The subscription flag a category routes through.
    ///
    /// Sub-entity events share their parent's flag: `module_issue` routes
    /// via `module`, `cycle_issue` via `cycle`. Everything else maps to
    /// itself.
    #[must_use]
    pub fn routing_flag(&self) -> EventCategory {
        match self {
            Self::ModuleIssue => Self::Module,
            Self::CycleIssue => Self::Cycle,
            other => *other,
        }
    }
}

impl Display for EventCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventVerb {
    Created,
    Updated,
    Deleted,
}

impl EventVerb {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }

    /// Normalized action name used in the delivered payload.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Created => "create",
            Self::Updated => "update",
            Self::Deleted => "delete",
        }
    }
}

impl Display for EventVerb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
