//! Filter evaluator — decides dynamic-list membership, either directly
//! against a contact or as constraints pushed down to the contact store.
//!
//! Both paths must select exactly the same contacts for the same data.

use crm_core::{Contact, ContactStatus};

use crate::criteria::Criteria;
use crate::query::{contains_ignore_case, Constraint, ContactField, ContactQuery};

/// In-memory membership check. Unset criteria fields always pass.
pub fn matches(contact: &Contact, criteria: &Criteria) -> bool {
    if let Some(status) = criteria.status() {
        // Compared as strings: a store may hand back `Other("lead")`.
        if contact.status.as_ref().map(ContactStatus::as_str) != Some(status.as_str()) {
            return false;
        }
    }
    if let Some(needle) = criteria.company_name() {
        match contact.company_name.as_deref() {
            Some(company) if contains_ignore_case(company, needle) => {}
            _ => return false,
        }
    }
    if let Some(needle) = criteria.position() {
        match contact.position.as_deref() {
            Some(position) if contains_ignore_case(position, needle) => {}
            _ => return false,
        }
    }
    if let Some(after) = criteria.created_after() {
        if contact.created_at < after {
            return false;
        }
    }
    if let Some(before) = criteria.created_before() {
        if contact.created_at > before {
            return false;
        }
    }
    true
}

/// Extend `base` with one constraint per present criteria field.
pub fn to_store_query(base: ContactQuery, criteria: &Criteria) -> ContactQuery {
    let mut query = base;
    if let Some(status) = criteria.status() {
        query = query.with(Constraint::Equals {
            field: ContactField::Status,
            value: status.as_str().to_string(),
        });
    }
    if let Some(company) = criteria.company_name() {
        query = query.with(Constraint::ContainsIgnoreCase {
            field: ContactField::CompanyName,
            needle: company.to_string(),
        });
    }
    if let Some(position) = criteria.position() {
        query = query.with(Constraint::ContainsIgnoreCase {
            field: ContactField::Position,
            needle: position.to_string(),
        });
    }
    if let Some(after) = criteria.created_after() {
        query = query.with(Constraint::AtLeast {
            field: ContactField::CreatedAt,
            bound: after,
        });
    }
    if let Some(before) = criteria.created_before() {
        query = query.with(Constraint::AtMost {
            field: ContactField::CreatedAt,
            bound: before,
        });
    }
    query
}

/// Contacts from `contacts` that satisfy `criteria`.
pub fn filter<'a>(contacts: &'a [Contact], criteria: &'a Criteria) -> impl Iterator<Item = &'a Contact> {
    contacts.iter().filter(move |c| matches(c, criteria))
}
