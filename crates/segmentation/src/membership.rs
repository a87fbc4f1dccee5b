//! Membership materializer — explicit membership rows for static lists.
//!
//! Rows are never hard-deleted while the list exists: removal flips a row to
//! [`MembershipStatus::Removed`], so past membership stays auditable. Only
//! active rows count.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crm_core::{ContactId, SegmentationError, SegmentationResult};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::list::ListId;
use crate::store::ContactStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMembership {
    pub id: Uuid,
    pub list_id: ListId,
    pub contact_id: ContactId,
    pub status: MembershipStatus,
    pub added_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
}

impl ListMembership {
    fn is_active_for(&self, contact_id: &ContactId) -> bool {
        self.status == MembershipStatus::Active && &self.contact_id == contact_id
    }
}

/// Result of an accepted membership batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOutcome {
    pub added: Vec<ContactId>,
    pub already_active: Vec<ContactId>,
}

pub struct MembershipMaterializer {
    rows: DashMap<ListId, Vec<ListMembership>>,
    store: Arc<dyn ContactStore>,
}

impl MembershipMaterializer {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self {
            rows: DashMap::new(),
            store,
        }
    }

    /// Add contacts to a list as active members.
    ///
    /// The batch is atomic: every id is checked against the contact store
    /// first, and if any is unknown nothing is written and the error names
    /// the rejected ids. Ids that already have an active row are left alone.
    pub(crate) fn add_members(
        &self,
        list_id: ListId,
        contact_ids: &[ContactId],
    ) -> SegmentationResult<AddOutcome> {
        let unique = self.validate_members(contact_ids)?;
        Ok(self.insert_validated(list_id, unique))
    }

    /// Deduplicate `contact_ids` and check that each one exists in the
    /// contact store. Writes nothing.
    pub(crate) fn validate_members(&self, contact_ids: &[ContactId]) -> SegmentationResult<Vec<ContactId>> {
        let mut seen = HashSet::new();
        let unique: Vec<ContactId> = contact_ids
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();
        if unique.is_empty() {
            return Ok(unique);
        }

        let existing = self.store.existing_ids(&unique)?;
        let rejected: Vec<ContactId> = unique
            .iter()
            .filter(|id| !existing.contains(*id))
            .cloned()
            .collect();
        if !rejected.is_empty() {
            return Err(SegmentationError::PartialBatchFailure { rejected });
        }
        Ok(unique)
    }

    /// Insert ids already returned by [`Self::validate_members`].
    pub(crate) fn insert_validated(&self, list_id: ListId, unique: Vec<ContactId>) -> AddOutcome {
        if unique.is_empty() {
            return AddOutcome::default();
        }

        let now = Utc::now();
        let mut outcome = AddOutcome::default();
        let mut rows = self.rows.entry(list_id).or_default();
        for contact_id in unique {
            if rows.iter().any(|row| row.is_active_for(&contact_id)) {
                outcome.already_active.push(contact_id);
                continue;
            }
            rows.push(ListMembership {
                id: Uuid::new_v4(),
                list_id,
                contact_id: contact_id.clone(),
                status: MembershipStatus::Active,
                added_at: now,
                removed_at: None,
            });
            outcome.added.push(contact_id);
        }

        info!(
            list_id = %list_id,
            added = outcome.added.len(),
            unchanged = outcome.already_active.len(),
            "added list members"
        );
        outcome
    }

    /// Mark the contact's active row removed. Returns `false` for a
    /// non-member.
    pub(crate) fn remove_member(&self, list_id: ListId, contact_id: &ContactId) -> bool {
        let Some(mut rows) = self.rows.get_mut(&list_id) else {
            return false;
        };
        match rows.iter_mut().find(|row| row.is_active_for(contact_id)) {
            Some(row) => {
                row.status = MembershipStatus::Removed;
                row.removed_at = Some(Utc::now());
                debug!(list_id = %list_id, contact_id = %contact_id, "removed list member");
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self, list_id: ListId) -> u64 {
        self.rows.get(&list_id).map_or(0, |rows| {
            rows.iter()
                .filter(|row| row.status == MembershipStatus::Active)
                .count() as u64
        })
    }

    /// Active member ids in insertion order.
    pub fn active_member_ids(&self, list_id: ListId) -> Vec<ContactId> {
        self.rows.get(&list_id).map_or_else(Vec::new, |rows| {
            rows.iter()
                .filter(|row| row.status == MembershipStatus::Active)
                .map(|row| row.contact_id.clone())
                .collect()
        })
    }

    /// Every row ever written for the list, removed ones included.
    pub fn history(&self, list_id: ListId) -> Vec<ListMembership> {
        self.rows
            .get(&list_id)
            .map_or_else(Vec::new, |rows| rows.clone())
    }

    /// Mark all active rows removed. Returns how many were active.
    pub(crate) fn clear(&self, list_id: ListId) -> usize {
        let Some(mut rows) = self.rows.get_mut(&list_id) else {
            return 0;
        };
        let now = Utc::now();
        let mut cleared = 0;
        for row in rows.iter_mut().filter(|r| r.status == MembershipStatus::Active) {
            row.status = MembershipStatus::Removed;
            row.removed_at = Some(now);
            cleared += 1;
        }
        cleared
    }

    /// Hard-delete every row of the list. Reserved for list deletion.
    pub(crate) fn purge(&self, list_id: ListId) -> usize {
        self.rows
            .remove(&list_id)
            .map_or(0, |(_, rows)| rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryContactStore;
    use crm_core::Contact;

    fn materializer() -> MembershipMaterializer {
        let now = Utc::now();
        let store = InMemoryContactStore::with_contacts(
            ["c-1", "c-2", "c-3"].map(|id| Contact::new(id, now)),
        );
        MembershipMaterializer::new(Arc::new(store))
    }

    fn ids(raw: &[&str]) -> Vec<ContactId> {
        raw.iter().map(|id| ContactId::from(*id)).collect()
    }

    #[test]
    fn test_add_is_idempotent() {
        let m = materializer();
        let list = Uuid::new_v4();

        let first = m.add_members(list, &ids(&["c-1", "c-1"])).unwrap();
        assert_eq!(first.added, ids(&["c-1"]));

        let second = m.add_members(list, &ids(&["c-1", "c-2"])).unwrap();
        assert_eq!(second.added, ids(&["c-2"]));
        assert_eq!(second.already_active, ids(&["c-1"]));
        assert_eq!(m.active_count(list), 2);
    }

    #[test]
    fn test_unknown_id_rejects_whole_batch() {
        let m = materializer();
        let list = Uuid::new_v4();

        let err = m.add_members(list, &ids(&["c-1", "ghost"])).unwrap_err();
        match err {
            SegmentationError::PartialBatchFailure { rejected } => {
                assert_eq!(rejected, ids(&["ghost"]))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(m.active_count(list), 0);
        assert!(m.history(list).is_empty());
    }

    #[test]
    fn test_removed_rows_kept_but_not_counted() {
        let m = materializer();
        let list = Uuid::new_v4();
        m.add_members(list, &ids(&["c-1", "c-2", "c-3"])).unwrap();

        assert!(m.remove_member(list, &ContactId::from("c-2")));
        assert!(!m.remove_member(list, &ContactId::from("c-2")));
        assert!(!m.remove_member(list, &ContactId::from("nobody")));

        assert_eq!(m.active_count(list), 2);
        assert_eq!(m.history(list).len(), 3);
        assert_eq!(m.active_member_ids(list), ids(&["c-1", "c-3"]));
    }

    #[test]
    fn test_readd_after_removal_creates_new_row() {
        let m = materializer();
        let list = Uuid::new_v4();
        m.add_members(list, &ids(&["c-1"])).unwrap();
        m.remove_member(list, &ContactId::from("c-1"));
        m.add_members(list, &ids(&["c-1"])).unwrap();

        assert_eq!(m.active_count(list), 1);
        let history = m.history(list);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, MembershipStatus::Removed);
        assert_eq!(history[1].status, MembershipStatus::Active);
    }

    #[test]
    fn test_clear_and_purge() {
        let m = materializer();
        let list = Uuid::new_v4();
        m.add_members(list, &ids(&["c-1", "c-2"])).unwrap();

        assert_eq!(m.clear(list), 2);
        assert_eq!(m.active_count(list), 0);
        assert_eq!(m.history(list).len(), 2);

        assert_eq!(m.purge(list), 2);
        assert!(m.history(list).is_empty());
        assert_eq!(m.active_count(list), 0);
    }
}
