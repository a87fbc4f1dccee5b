//! List registry — CRUD over list definitions, keeping memberships and
//! cached counts in step with every mutation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use crm_core::config::SegmentationConfig;
use crm_core::{Contact, ContactId, SegmentationError, SegmentationResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::criteria::{Criteria, CriteriaInput};
use crate::evaluator::to_store_query;
use crate::list::{ContactList, ListId, ListInput, ListKind, ListPatch, ListType, PseudoList};
use crate::membership::{AddOutcome, ListMembership, MembershipMaterializer};
use crate::query::{Constraint, ContactField, ContactQuery};
use crate::store::ContactStore;
use crate::sync::CountSynchronizer;

/// Per-list outcome of [`ListRegistry::recount_all`].
#[derive(Debug, Default)]
pub struct RecountReport {
    pub results: HashMap<ListId, SegmentationResult<u64>>,
}

impl RecountReport {
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.is_ok()).count()
    }

    pub fn failures(&self) -> Vec<(ListId, &SegmentationError)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (*id, e)))
            .collect()
    }

    pub fn count_for(&self, id: &ListId) -> Option<u64> {
        self.results.get(id).and_then(|r| r.as_ref().ok().copied())
    }
}

pub struct ListRegistry {
    lists: DashMap<ListId, ContactList>,
    memberships: Arc<MembershipMaterializer>,
    counts: CountSynchronizer,
    store: Arc<dyn ContactStore>,
    config: SegmentationConfig,
    /// Serializes definition writes: name checks, membership edits and
    /// cascading deletes.
    write_lock: Mutex<()>,
}

impl ListRegistry {
    pub fn new(store: Arc<dyn ContactStore>, config: SegmentationConfig) -> Self {
        let memberships = Arc::new(MembershipMaterializer::new(store.clone()));
        let counts = CountSynchronizer::new(store.clone(), memberships.clone());
        Self {
            lists: DashMap::new(),
            memberships,
            counts,
            store,
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Read access to membership rows. Edits go through
    /// [`Self::add_members`] and [`Self::remove_member`].
    pub fn memberships(&self) -> &MembershipMaterializer {
        &self.memberships
    }

    /// Create a list and compute its initial count.
    ///
    /// Initial members of a static list are written together with the list:
    /// if any id is rejected, the list is not created. A recount failure
    /// does not fail the creation; the list keeps a zero count and stays
    /// marked stale.
    pub fn create_list(&self, input: ListInput) -> SegmentationResult<ContactList> {
        let guard = self.write_lock.lock();

        let owner = input
            .owner
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| self.config.default_owner.clone());
        let name = validate_name(&input.name)?;
        self.ensure_name_available(&owner, &name, None)?;

        let list_type = ListType::coerce(input.list_type.as_deref());
        let kind = build_kind(list_type, input.criteria, None)?;
        let members = self.validate_initial_members(list_type, &input.member_ids)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let outcome = self.memberships.insert_validated(id, members);
        let list = ContactList {
            id,
            owner,
            name,
            description: normalize_description(input.description),
            kind,
            contact_count: 0,
            counted_at: None,
            created_at: now,
            updated_at: now,
        };
        info!(
            list_id = %id,
            name = %list.name,
            list_type = list_type.as_str(),
            initial_members = outcome.added.len(),
            "created contact list"
        );
        self.lists.insert(id, list);
        drop(guard);

        self.refreshed(id)
    }

    /// Apply a partial update and recount.
    ///
    /// Everything is validated before anything is written. Switching to
    /// static drops the criteria; switching to dynamic keeps membership
    /// rows (they no longer affect the count) unless `clear_members` is set.
    pub fn update_list(&self, id: ListId, patch: ListPatch) -> SegmentationResult<ContactList> {
        let guard = self.write_lock.lock();
        let current = self.get_list(id)?;

        let name = match patch.name {
            Some(raw) => validate_name(&raw)?,
            None => current.name.clone(),
        };
        self.ensure_name_available(&current.owner, &name, Some(id))?;

        let list_type = match patch.list_type.as_deref() {
            Some(raw) => ListType::coerce(Some(raw)),
            None => current.list_type(),
        };
        let kind = build_kind(list_type, patch.criteria, current.kind.criteria())?;
        let members = self.validate_initial_members(list_type, &patch.add_member_ids)?;

        if current.list_type() != list_type {
            info!(
                list_id = %id,
                from = current.list_type().as_str(),
                to = list_type.as_str(),
                "contact list type changed"
            );
        }

        let description = match patch.description {
            Some(desc) => normalize_description(desc),
            None => current.description.clone(),
        };
        let updated = match self.lists.get_mut(&id) {
            Some(mut list) => {
                list.name = name;
                list.description = description;
                list.kind = kind;
                list.updated_at = Utc::now();
                true
            }
            None => false,
        };
        if !updated {
            return Err(SegmentationError::NotFound(format!("contact list {id}")));
        }

        if patch.clear_members {
            let cleared = self.memberships.clear(id);
            info!(list_id = %id, cleared, "cleared list members");
        }
        self.memberships.insert_validated(id, members);
        drop(guard);

        self.refreshed(id)
    }

    /// Delete a list together with all of its membership rows.
    pub fn delete_list(&self, id: ListId) -> SegmentationResult<()> {
        let _guard = self.write_lock.lock();
        if !self.lists.contains_key(&id) {
            return Err(SegmentationError::NotFound(format!("contact list {id}")));
        }
        let purged = self.memberships.purge(id);
        self.lists.remove(&id);
        info!(list_id = %id, purged_rows = purged, "deleted contact list");
        Ok(())
    }

    pub fn get_list(&self, id: ListId) -> SegmentationResult<ContactList> {
        self.lists
            .get(&id)
            .map(|l| l.clone())
            .ok_or_else(|| SegmentationError::NotFound(format!("contact list {id}")))
    }

    /// Lists of one owner scope, sorted by name. With `exclude_reserved`,
    /// lists carrying the reserved pseudo-list name are skipped.
    pub fn list_lists(&self, owner: &str, exclude_reserved: bool) -> Vec<ContactList> {
        let mut lists: Vec<ContactList> = self
            .lists
            .iter()
            .filter(|l| l.owner == owner)
            .filter(|l| !(exclude_reserved && self.is_reserved_name(&l.name)))
            .map(|l| l.value().clone())
            .collect();
        lists.sort_by_key(|l| l.name.to_lowercase());
        lists
    }

    /// Look up a list by name within an owner scope, using the same
    /// comparison as the uniqueness check.
    pub fn find_by_name(&self, owner: &str, name: &str) -> Option<ContactList> {
        self.lists
            .iter()
            .find(|l| l.owner == owner && same_name(&l.name, name))
            .map(|l| l.value().clone())
    }

    pub fn is_reserved_name(&self, name: &str) -> bool {
        is_reserved_name(name, &self.config.reserved_list_name)
    }

    /// The synthetic pseudo-list covering the whole contact store.
    pub fn all_contacts(&self) -> SegmentationResult<PseudoList> {
        Ok(PseudoList {
            name: self.config.reserved_list_name.clone(),
            contact_count: self.counts.count_all_contacts()?,
        })
    }

    /// Recompute and persist one list's count.
    ///
    /// On failure the cached count is left untouched. If the list is edited
    /// while the count is computed, the result is dropped and the count
    /// already stored on the list is returned; the edit's own recount
    /// replaces it.
    pub fn recount_list(&self, id: ListId) -> SegmentationResult<u64> {
        let (kind, seen_update) = {
            let list = self.get_list(id)?;
            (list.kind, list.updated_at)
        };
        let list_type = kind.list_type().as_str();

        let count = match self.counts.count(id, &kind) {
            Ok(count) => count,
            Err(e) => {
                metrics::counter!("segmentation.recount.failed", "list_type" => list_type)
                    .increment(1);
                warn!(list_id = %id, error = %e, "recount failed, keeping cached count");
                return Err(e);
            }
        };

        match self.lists.get_mut(&id) {
            Some(mut list) if list.updated_at == seen_update => {
                list.contact_count = count;
                list.counted_at = Some(Utc::now());
            }
            Some(list) => {
                debug!(list_id = %id, discarded = count, "list changed during recount, result dropped");
                metrics::counter!("segmentation.recount.superseded", "list_type" => list_type)
                    .increment(1);
                return Ok(list.contact_count);
            }
            None => return Err(SegmentationError::NotFound(format!("contact list {id}"))),
        }
        metrics::counter!("segmentation.recount.ok", "list_type" => list_type).increment(1);
        Ok(count)
    }

    /// Recount every list independently. One list failing never stops the
    /// others; failures are collected in the report.
    pub fn recount_all(&self) -> RecountReport {
        let ids: Vec<ListId> = self.lists.iter().map(|l| *l.key()).collect();
        let mut report = RecountReport::default();
        for id in ids {
            report.results.insert(id, self.recount_list(id));
        }
        info!(
            lists = report.results.len(),
            succeeded = report.succeeded(),
            failed = report.results.len() - report.succeeded(),
            "recounted all contact lists"
        );
        report
    }

    /// Add members to a static list, then recount it.
    pub fn add_members(
        &self,
        id: ListId,
        contact_ids: &[ContactId],
    ) -> SegmentationResult<AddOutcome> {
        let guard = self.write_lock.lock();
        self.require_static(id)?;
        let outcome = self.memberships.add_members(id, contact_ids)?;
        self.touch(id);
        drop(guard);

        self.refreshed(id)?;
        Ok(outcome)
    }

    /// Remove one member from a static list, then recount it. Removing a
    /// non-member is a no-op that returns `false`.
    pub fn remove_member(&self, id: ListId, contact_id: &ContactId) -> SegmentationResult<bool> {
        let guard = self.write_lock.lock();
        self.require_static(id)?;
        let removed = self.memberships.remove_member(id, contact_id);
        if removed {
            self.touch(id);
        }
        drop(guard);

        if removed {
            self.refreshed(id)?;
        }
        Ok(removed)
    }

    pub fn membership_history(&self, id: ListId) -> SegmentationResult<Vec<ListMembership>> {
        self.get_list(id)?;
        Ok(self.memberships.history(id))
    }

    /// Contacts currently in the list, for handing to outbound senders.
    pub fn resolve_recipients(&self, id: ListId) -> SegmentationResult<Vec<Contact>> {
        let list = self.get_list(id)?;
        let query = match &list.kind {
            ListKind::Static => {
                let ids = self.memberships.active_member_ids(id);
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                ContactQuery::all().with(Constraint::OneOf {
                    field: ContactField::Id,
                    values: ids.iter().map(|c| c.as_str().to_string()).collect(),
                })
            }
            ListKind::Dynamic { criteria } => to_store_query(ContactQuery::all(), criteria),
        };
        Ok(self.store.list_contacts(&query)?)
    }

    fn refreshed(&self, id: ListId) -> SegmentationResult<ContactList> {
        if let Err(e) = self.recount_list(id) {
            if !e.is_store_unavailable() {
                return Err(e);
            }
        }
        self.get_list(id)
    }

    fn touch(&self, id: ListId) {
        if let Some(mut list) = self.lists.get_mut(&id) {
            list.updated_at = Utc::now();
        }
    }

    fn require_static(&self, id: ListId) -> SegmentationResult<()> {
        let list = self.get_list(id)?;
        if !list.is_static() {
            return Err(SegmentationError::Validation(format!(
                "list '{}' is dynamic; membership is defined by its criteria",
                list.name
            )));
        }
        Ok(())
    }

    fn validate_initial_members(
        &self,
        list_type: ListType,
        member_ids: &[ContactId],
    ) -> SegmentationResult<Vec<ContactId>> {
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }
        if list_type != ListType::Static {
            return Err(SegmentationError::Validation(
                "explicit members are only accepted for static lists".to_string(),
            ));
        }
        self.memberships.validate_members(member_ids)
    }

    fn ensure_name_available(
        &self,
        owner: &str,
        name: &str,
        except: Option<ListId>,
    ) -> SegmentationResult<()> {
        let taken = self
            .lists
            .iter()
            .any(|l| Some(l.id) != except && l.owner == owner && same_name(&l.name, name));
        if taken {
            return Err(SegmentationError::Validation(format!(
                "a list named '{name}' already exists"
            )));
        }
        Ok(())
    }
}

/// Case-insensitive comparison against the reserved pseudo-list name.
pub fn is_reserved_name(name: &str, reserved: &str) -> bool {
    same_name(name, reserved)
}

/// List names are compared trimmed and Unicode-lowercased.
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn validate_name(raw: &str) -> SegmentationResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(SegmentationError::Validation(
            "list name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Build the list kind. For a dynamic list without new criteria, `keep`
/// (the list's current criteria, if any) is reused.
fn build_kind(
    list_type: ListType,
    criteria: Option<CriteriaInput>,
    keep: Option<&Criteria>,
) -> SegmentationResult<ListKind> {
    match list_type {
        ListType::Static => {
            if criteria.is_some() {
                warn!("criteria supplied for a static list were discarded");
            }
            Ok(ListKind::Static)
        }
        ListType::Dynamic => {
            let criteria = match criteria {
                Some(input) => Criteria::from_input(input)?,
                None => keep.cloned().unwrap_or_default(),
            };
            Ok(ListKind::Dynamic { criteria })
        }
    }
}
