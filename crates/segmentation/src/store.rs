//! Contact store port and an in-memory implementation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use crm_core::{Contact, ContactId, StoreError};
use dashmap::DashMap;
use tracing::debug;

use crate::query::ContactQuery;

/// Read access to the contact pool. Contacts are created and edited outside
/// the segmentation engine; it only counts and reads them.
pub trait ContactStore: Send + Sync {
    /// Number of contacts satisfying every constraint of `query`.
    fn count_contacts(&self, query: &ContactQuery) -> Result<u64, StoreError>;

    /// Contacts satisfying every constraint of `query`, ordered by id.
    fn list_contacts(&self, query: &ContactQuery) -> Result<Vec<Contact>, StoreError>;

    /// Subset of `ids` that refer to existing contacts.
    fn existing_ids(&self, ids: &[ContactId]) -> Result<HashSet<ContactId>, StoreError>;
}

/// DashMap-backed contact pool. Can be switched offline to exercise outage
/// handling.
pub struct InMemoryContactStore {
    contacts: DashMap<ContactId, Contact>,
    offline: AtomicBool,
}

impl InMemoryContactStore {
    pub fn new() -> Self {
        Self {
            contacts: DashMap::new(),
            offline: AtomicBool::new(false),
        }
    }

    pub fn with_contacts(contacts: impl IntoIterator<Item = Contact>) -> Self {
        let store = Self::new();
        for contact in contacts {
            store.upsert(contact);
        }
        store
    }

    pub fn upsert(&self, contact: Contact) {
        self.contacts.insert(contact.id.clone(), contact);
    }

    pub fn remove(&self, id: &ContactId) -> Option<Contact> {
        self.contacts.remove(id).map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("in-memory store is offline".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryContactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactStore for InMemoryContactStore {
    fn count_contacts(&self, query: &ContactQuery) -> Result<u64, StoreError> {
        self.ensure_online()?;
        let count = self
            .contacts
            .iter()
            .filter(|entry| query.admits(entry.value()))
            .count() as u64;
        debug!(constraints = query.constraints().len(), count, "counted contacts");
        Ok(count)
    }

    fn list_contacts(&self, query: &ContactQuery) -> Result<Vec<Contact>, StoreError> {
        self.ensure_online()?;
        let mut contacts: Vec<Contact> = self
            .contacts
            .iter()
            .filter(|entry| query.admits(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        contacts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(contacts)
    }

    fn existing_ids(&self, ids: &[ContactId]) -> Result<HashSet<ContactId>, StoreError> {
        self.ensure_online()?;
        Ok(ids
            .iter()
            .filter(|id| self.contacts.contains_key(*id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Constraint, ContactField};
    use chrono::Utc;

    #[test]
    fn test_offline_store_reports_unreachable() {
        let store = InMemoryContactStore::with_contacts([Contact::new("c-1", Utc::now())]);
        assert_eq!(store.count_contacts(&ContactQuery::all()).unwrap(), 1);

        store.set_offline(true);
        let err = store.count_contacts(&ContactQuery::all()).unwrap_err();
        assert!(matches!(err, StoreError::Unreachable(_)));

        store.set_offline(false);
        assert!(store.list_contacts(&ContactQuery::all()).is_ok());
    }

    #[test]
    fn test_list_contacts_sorted_and_filtered() {
        let now = Utc::now();
        let store = InMemoryContactStore::with_contacts([
            Contact::new("c-3", now).with_status("lead"),
            Contact::new("c-1", now).with_status("lead"),
            Contact::new("c-2", now).with_status("customer"),
        ]);
        let leads = store
            .list_contacts(&ContactQuery::all().with(Constraint::Equals {
                field: ContactField::Status,
                value: "lead".to_string(),
            }))
            .unwrap();
        let ids: Vec<_> = leads.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c-1", "c-3"]);
    }

    #[test]
    fn test_existing_ids() {
        let store = InMemoryContactStore::with_contacts([Contact::new("c-1", Utc::now())]);
        let found = store
            .existing_ids(&[ContactId::from("c-1"), ContactId::from("ghost")])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains(&ContactId::from("c-1")));
    }
}
