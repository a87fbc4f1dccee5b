//! Contact list definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::criteria::{Criteria, CriteriaInput};
use crm_core::ContactId;

pub type ListId = Uuid;

/// Membership model of a list. Criteria exist only on dynamic lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListKind {
    /// Explicit membership rows curated by an admin.
    Static,
    /// Membership recomputed from the contact store on every count.
    Dynamic { criteria: Criteria },
}

impl ListKind {
    pub fn list_type(&self) -> ListType {
        match self {
            ListKind::Static => ListType::Static,
            ListKind::Dynamic { .. } => ListType::Dynamic,
        }
    }

    pub fn criteria(&self) -> Option<&Criteria> {
        match self {
            ListKind::Static => None,
            ListKind::Dynamic { criteria } => Some(criteria),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListType {
    Static,
    Dynamic,
}

impl ListType {
    /// Only the exact strings `static` and `dynamic` are accepted. Anything
    /// else, including a missing value, becomes `Dynamic`.
    pub fn coerce(raw: Option<&str>) -> Self {
        match raw {
            Some("static") => ListType::Static,
            Some("dynamic") => ListType::Dynamic,
            other => {
                warn!(requested = ?other, "unrecognised list type, defaulting to dynamic");
                ListType::Dynamic
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::Static => "static",
            ListType::Dynamic => "dynamic",
        }
    }
}

/// A named segment of contacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactList {
    pub id: ListId,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: ListKind,
    /// Cached size, written only by the count synchronizer.
    pub contact_count: u64,
    /// Last successful recount; `None` until the first one.
    pub counted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactList {
    pub fn list_type(&self) -> ListType {
        self.kind.list_type()
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, ListKind::Static)
    }

    /// True when the cached count predates the latest edit.
    pub fn count_is_stale(&self) -> bool {
        self.counted_at.map_or(true, |at| at < self.updated_at)
    }
}

/// Caller-supplied definition for a new list. `list_type` is a raw string on
/// purpose: it is coerced, not rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListInput {
    #[serde(default)]
    pub owner: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub list_type: Option<String>,
    #[serde(default)]
    pub criteria: Option<CriteriaInput>,
    /// Initial members; only used by static lists.
    #[serde(default)]
    pub member_ids: Vec<ContactId>,
}

/// Partial update of a list. Unset fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListPatch {
    #[serde(default)]
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default, rename = "type")]
    pub list_type: Option<String>,
    #[serde(default)]
    pub criteria: Option<CriteriaInput>,
    /// Added to a static list after the update is applied.
    #[serde(default)]
    pub add_member_ids: Vec<ContactId>,
    /// Mark every active membership row removed before adding.
    #[serde(default)]
    pub clear_members: bool,
}

/// Synthetic entry standing for the whole contact store. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PseudoList {
    pub name: String,
    pub contact_count: u64,
}
