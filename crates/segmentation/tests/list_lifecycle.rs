use std::collections::HashSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use crm_core::config::SegmentationConfig;
use crm_core::{Contact, ContactId, ContactStatus, SegmentationError, StoreError};
use crm_segmentation::query::{Constraint, ContactField};
use crm_segmentation::{
    matches, to_store_query, ContactQuery, ContactStore, Criteria, CriteriaInput,
    InMemoryContactStore, ListBuilder, ListPatch, ListRegistry, ListType,
};

/// Five contacts: three leads (two created after 2025-01-01), two customers.
fn fixture() -> Vec<Contact> {
    vec![
        Contact::new("c-1", Utc.with_ymd_and_hms(2024, 11, 3, 8, 0, 0).unwrap())
            .with_status("lead")
            .with_position("Office Manager")
            .with_company("Initech"),
        Contact::new("c-2", Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
            .with_status("lead")
            .with_position("Senior Manager")
            .with_company("Acme Corp"),
        Contact::new("c-3", Utc.with_ymd_and_hms(2025, 2, 14, 16, 45, 0).unwrap())
            .with_status("lead")
            .with_position("Engineer"),
        Contact::new("c-4", Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap())
            .with_status("customer")
            .with_company("ACME Holdings"),
        Contact::new("c-5", Utc.with_ymd_and_hms(2025, 3, 9, 10, 0, 0).unwrap())
            .with_status("customer")
            .with_position("VP Sales"),
    ]
}

fn setup() -> (Arc<InMemoryContactStore>, ListRegistry) {
    let store = Arc::new(InMemoryContactStore::with_contacts(fixture()));
    let registry = ListRegistry::new(store.clone(), SegmentationConfig::default());
    (store, registry)
}

fn criteria(input: CriteriaInput) -> Criteria {
    Criteria::from_input(input).unwrap()
}

fn ids(raw: &[&str]) -> Vec<ContactId> {
    raw.iter().map(|id| ContactId::from(*id)).collect()
}

/// Fails every count whose query filters on the given status value.
struct FlakyStore {
    inner: InMemoryContactStore,
    poisoned_status: String,
}

impl ContactStore for FlakyStore {
    fn count_contacts(&self, query: &ContactQuery) -> Result<u64, StoreError> {
        let poisoned = query.constraints().iter().any(|c| {
            matches!(c, Constraint::Equals { field: ContactField::Status, value } if *value == self.poisoned_status)
        });
        if poisoned {
            return Err(StoreError::Unreachable("shard timeout".to_string()));
        }
        self.inner.count_contacts(query)
    }

    fn list_contacts(&self, query: &ContactQuery) -> Result<Vec<Contact>, StoreError> {
        self.inner.list_contacts(query)
    }

    fn existing_ids(&self, ids: &[ContactId]) -> Result<HashSet<ContactId>, StoreError> {
        self.inner.existing_ids(ids)
    }
}

#[test]
fn test_both_evaluation_paths_agree() {
    let mut contacts = fixture();
    // A store may return a known status through the catch-all variant.
    let mut raw_status = Contact::new("c-6", Utc.with_ymd_and_hms(2025, 1, 20, 9, 0, 0).unwrap())
        .with_position("Marketing Manager");
    raw_status.status = Some(ContactStatus::Other("lead".to_string()));
    contacts.push(raw_status);
    let store = InMemoryContactStore::with_contacts(contacts.clone());
    let grid = vec![
        Criteria::any(),
        criteria(CriteriaInput {
            status: Some("lead".into()),
            ..Default::default()
        }),
        criteria(CriteriaInput {
            company_name: Some("acme".into()),
            ..Default::default()
        }),
        criteria(CriteriaInput {
            position: Some("MANAGER".into()),
            ..Default::default()
        }),
        criteria(CriteriaInput {
            created_after: Some("2025-01-01".into()),
            ..Default::default()
        }),
        criteria(CriteriaInput {
            created_before: Some("2025-01-01".into()),
            ..Default::default()
        }),
        criteria(CriteriaInput {
            status: Some("customer".into()),
            company_name: Some("acme".into()),
            ..Default::default()
        }),
        criteria(CriteriaInput {
            status: Some("lead".into()),
            position: Some("manager".into()),
            created_after: Some("2024-12-01".into()),
            created_before: Some("2025-02-28".into()),
            ..Default::default()
        }),
    ];

    for c in &grid {
        let in_memory: Vec<&str> = contacts
            .iter()
            .filter(|contact| matches(contact, c))
            .map(|contact| contact.id.as_str())
            .collect();
        let query = to_store_query(ContactQuery::all(), c);
        let from_store = store.list_contacts(&query).unwrap();
        let store_ids: Vec<&str> = from_store.iter().map(|contact| contact.id.as_str()).collect();

        assert_eq!(in_memory, store_ids, "paths diverge for {c:?}");
        assert_eq!(in_memory.len() as u64, store.count_contacts(&query).unwrap());
    }
}

#[test]
fn test_empty_criteria_selects_everyone() {
    let (_, registry) = setup();
    let list = registry.create_list(ListBuilder::new("Everyone").build()).unwrap();
    assert_eq!(list.contact_count, 5);
}

#[test]
fn test_position_substring_is_case_insensitive() {
    let (_, registry) = setup();
    let list = registry
        .create_list(ListBuilder::new("Managers").position_contains("manager").build())
        .unwrap();
    assert_eq!(list.contact_count, 2);

    let recipients = registry.resolve_recipients(list.id).unwrap();
    let names: Vec<_> = recipients.iter().filter_map(|c| c.position.as_deref()).collect();
    assert_eq!(names, vec!["Office Manager", "Senior Manager"]);
}

#[test]
fn test_created_after_boundary_is_inclusive() {
    let contacts = fixture();
    let c = criteria(CriteriaInput {
        created_after: Some("2025-01-01T00:00:00Z".into()),
        ..Default::default()
    });
    assert!(matches(&contacts[1], &c));
}

#[test]
fn test_dynamic_lead_list_counts_recent_leads() {
    let (_, registry) = setup();
    let list = registry
        .create_list(
            ListBuilder::new("New leads")
                .status("lead")
                .created_after("2025-01-01")
                .build(),
        )
        .unwrap();
    assert_eq!(list.list_type(), ListType::Dynamic);
    assert_eq!(list.contact_count, 2);
}

#[test]
fn test_dynamic_list_follows_contact_pool() {
    let (store, registry) = setup();
    let list = registry
        .create_list(ListBuilder::new("Acme").company_contains("acme").build())
        .unwrap();
    assert_eq!(list.contact_count, 2);

    store.upsert(
        Contact::new("c-6", Utc::now())
            .with_status("prospect")
            .with_company("acme GmbH"),
    );
    store.remove(&ContactId::from("c-4"));
    assert_eq!(registry.recount_list(list.id).unwrap(), 2);

    store.remove(&ContactId::from("c-2"));
    assert_eq!(registry.recount_list(list.id).unwrap(), 1);
    assert_eq!(registry.get_list(list.id).unwrap().contact_count, 1);
}

#[test]
fn test_static_list_add_three_remove_one() {
    let (_, registry) = setup();
    let list = registry
        .create_list(ListBuilder::new("Picked").static_list().build())
        .unwrap();
    assert_eq!(list.contact_count, 0);

    registry.add_members(list.id, &ids(&["c-1", "c-3", "c-5"])).unwrap();
    assert!(registry.remove_member(list.id, &ContactId::from("c-3")).unwrap());

    let list = registry.get_list(list.id).unwrap();
    assert_eq!(list.contact_count, 2);
    assert_eq!(registry.memberships().active_count(list.id), 2);
    assert_eq!(registry.membership_history(list.id).unwrap().len(), 3);
}

#[test]
fn test_adding_same_contact_twice_counts_once() {
    let (_, registry) = setup();
    let list = registry
        .create_list(ListBuilder::new("Once").static_list().member("c-2").build())
        .unwrap();
    assert_eq!(list.contact_count, 1);

    let outcome = registry.add_members(list.id, &ids(&["c-2"])).unwrap();
    assert!(outcome.added.is_empty());
    assert_eq!(registry.get_list(list.id).unwrap().contact_count, 1);
}

#[test]
fn test_static_create_with_unknown_member_creates_nothing() {
    let (_, registry) = setup();
    let err = registry
        .create_list(
            ListBuilder::new("Broken")
                .static_list()
                .members(["c-1", "nobody"])
                .build(),
        )
        .unwrap_err();
    match err {
        SegmentationError::PartialBatchFailure { rejected } => {
            assert_eq!(rejected, ids(&["nobody"]))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(registry.list_lists("default", false).is_empty());
}

#[test]
fn test_delete_removes_membership_rows() {
    let (_, registry) = setup();
    let list = registry
        .create_list(
            ListBuilder::new("Temp")
                .static_list()
                .members(["c-1", "c-2", "c-4"])
                .build(),
        )
        .unwrap();
    assert_eq!(list.contact_count, 3);

    registry.delete_list(list.id).unwrap();
    assert_eq!(registry.memberships().active_count(list.id), 0);
    assert!(registry.memberships().history(list.id).is_empty());
    assert!(matches!(
        registry.get_list(list.id),
        Err(SegmentationError::NotFound(_))
    ));
}

#[test]
fn test_recount_all_isolates_failures() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryContactStore::with_contacts(fixture()),
        poisoned_status: "customer".to_string(),
    });
    let registry = ListRegistry::new(store.clone(), SegmentationConfig::default());

    let leads = registry
        .create_list(ListBuilder::new("Leads").status("lead").build())
        .unwrap();
    let customers = registry
        .create_list(ListBuilder::new("Customers").status("customer").build())
        .unwrap();
    let picked = registry
        .create_list(ListBuilder::new("Picked").static_list().member("c-4").build())
        .unwrap();
    assert_eq!(customers.contact_count, 0);

    let report = registry.recount_all();
    assert_eq!(report.count_for(&leads.id), Some(3));
    assert_eq!(report.count_for(&picked.id), Some(1));
    assert_eq!(report.succeeded(), 2);

    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, customers.id);
    assert!(failures[0].1.is_store_unavailable());
}

#[test]
fn test_failed_recount_keeps_previous_count() {
    let (store, registry) = setup();
    let list = registry
        .create_list(ListBuilder::new("Leads").status("lead").build())
        .unwrap();
    assert_eq!(list.contact_count, 3);

    store.set_offline(true);
    let err = registry.recount_list(list.id).unwrap_err();
    assert!(err.is_store_unavailable());
    assert_eq!(registry.get_list(list.id).unwrap().contact_count, 3);

    // Updating during an outage still succeeds and keeps the cached value.
    let updated = registry
        .update_list(
            list.id,
            ListPatch {
                description: Some(Some("cold outreach".to_string())),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.contact_count, 3);
    assert!(updated.count_is_stale());

    let report = registry.recount_all();
    assert_eq!(report.failures().len(), 1);
    assert_eq!(registry.get_list(list.id).unwrap().contact_count, 3);
}

#[test]
fn test_update_clear_members_then_add() {
    let (_, registry) = setup();
    let list = registry
        .create_list(
            ListBuilder::new("Rotating")
                .static_list()
                .members(["c-1", "c-2"])
                .build(),
        )
        .unwrap();

    let updated = registry
        .update_list(
            list.id,
            ListPatch {
                clear_members: true,
                add_member_ids: ids(&["c-5"]),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.contact_count, 1);
    assert_eq!(
        registry.memberships().active_member_ids(list.id),
        ids(&["c-5"])
    );
    assert_eq!(registry.membership_history(list.id).unwrap().len(), 3);
}
