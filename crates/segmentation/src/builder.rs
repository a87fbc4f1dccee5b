//! List builder — fluent API for assembling list definitions.

use chrono::{DateTime, SecondsFormat, Utc};
use crm_core::ContactId;

use crate::criteria::CriteriaInput;
use crate::list::{ListInput, ListType};

pub struct ListBuilder {
    owner: Option<String>,
    name: String,
    description: Option<String>,
    list_type: ListType,
    criteria: CriteriaInput,
    member_ids: Vec<ContactId>,
}

impl ListBuilder {
    /// Starts a dynamic list with no criteria (every contact).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            owner: None,
            name: name.into(),
            description: None,
            list_type: ListType::Dynamic,
            criteria: CriteriaInput::default(),
            member_ids: Vec::new(),
        }
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn static_list(mut self) -> Self {
        self.list_type = ListType::Static;
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.criteria.status = Some(status.into());
        self
    }

    pub fn company_contains(mut self, company: impl Into<String>) -> Self {
        self.criteria.company_name = Some(company.into());
        self
    }

    pub fn position_contains(mut self, position: impl Into<String>) -> Self {
        self.criteria.position = Some(position.into());
        self
    }

    /// Inclusive; accepts `YYYY-MM-DD` or RFC 3339.
    pub fn created_after(mut self, date: impl Into<String>) -> Self {
        self.criteria.created_after = Some(date.into());
        self
    }

    /// Inclusive; a bare date covers the whole day.
    pub fn created_before(mut self, date: impl Into<String>) -> Self {
        self.criteria.created_before = Some(date.into());
        self
    }

    pub fn created_between(self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created_after(from.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .created_before(to.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn member(mut self, contact_id: impl Into<ContactId>) -> Self {
        self.member_ids.push(contact_id.into());
        self
    }

    pub fn members<I, C>(mut self, contact_ids: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ContactId>,
    {
        self.member_ids.extend(contact_ids.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> ListInput {
        let criteria = match self.list_type {
            ListType::Dynamic => Some(self.criteria),
            ListType::Static => None,
        };
        ListInput {
            owner: self.owner,
            name: self.name,
            description: self.description,
            list_type: Some(self.list_type.as_str().to_string()),
            criteria,
            member_ids: self.member_ids,
        }
    }
}
