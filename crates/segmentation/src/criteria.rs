//! Criteria model — the fixed-shape filter behind a dynamic list.
//!
//! Every field is optional and the present ones are AND-ed together. An
//! absent field and an empty string mean the same thing: no constraint.
//! [`Criteria`] can only be built through [`Criteria::from_input`], so a
//! value of that type is always normalized and its date bounds are ordered.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use crm_core::{ContactStatus, SegmentationError, SegmentationResult};
use serde::{Deserialize, Serialize};

/// Wire shape of a criteria object, as persisted next to a list and as
/// received from callers. Dates are ISO-8601 strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before: Option<String>,
}

/// Normalized dynamic-list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CriteriaInput", into = "CriteriaInput")]
pub struct Criteria {
    status: Option<ContactStatus>,
    company_name: Option<String>,
    position: Option<String>,
    created_after: Option<DateTime<Utc>>,
    created_before: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy)]
enum Bound {
    Lower,
    Upper,
}

impl Criteria {
    /// The criteria that matches every contact.
    pub fn any() -> Self {
        Self::default()
    }

    /// Normalize and validate raw criteria.
    ///
    /// Blank strings collapse to "unset". A date-only upper bound covers the
    /// whole of that day. Fails when a date cannot be parsed or when
    /// `created_after` is later than `created_before`.
    pub fn from_input(input: CriteriaInput) -> SegmentationResult<Self> {
        let created_after = non_blank(input.created_after)
            .map(|raw| parse_bound("created_after", &raw, Bound::Lower))
            .transpose()?;
        let created_before = non_blank(input.created_before)
            .map(|raw| parse_bound("created_before", &raw, Bound::Upper))
            .transpose()?;

        if let (Some(after), Some(before)) = (created_after, created_before) {
            if after > before {
                return Err(SegmentationError::Validation(format!(
                    "created_after ({}) is later than created_before ({})",
                    after.to_rfc3339(),
                    before.to_rfc3339()
                )));
            }
        }

        Ok(Self {
            status: non_blank(input.status).map(ContactStatus::from),
            company_name: non_blank(input.company_name),
            position: non_blank(input.position),
            created_after,
            created_before,
        })
    }

    pub fn status(&self) -> Option<&ContactStatus> {
        self.status.as_ref()
    }

    pub fn company_name(&self) -> Option<&str> {
        self.company_name.as_deref()
    }

    pub fn position(&self) -> Option<&str> {
        self.position.as_deref()
    }

    pub fn created_after(&self) -> Option<DateTime<Utc>> {
        self.created_after
    }

    pub fn created_before(&self) -> Option<DateTime<Utc>> {
        self.created_before
    }

    /// True when no field constrains membership.
    pub fn is_unconstrained(&self) -> bool {
        self.status.is_none()
            && self.company_name.is_none()
            && self.position.is_none()
            && self.created_after.is_none()
            && self.created_before.is_none()
    }
}

impl TryFrom<CriteriaInput> for Criteria {
    type Error = SegmentationError;

    fn try_from(input: CriteriaInput) -> Result<Self, Self::Error> {
        Criteria::from_input(input)
    }
}

impl From<Criteria> for CriteriaInput {
    fn from(criteria: Criteria) -> Self {
        let fmt = |ts: DateTime<Utc>| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        CriteriaInput {
            status: criteria.status.map(String::from),
            company_name: criteria.company_name,
            position: criteria.position,
            created_after: criteria.created_after.map(fmt),
            created_before: criteria.created_before.map(fmt),
        }
    }
}

/// Whitespace-only counts as unset; anything else is kept as entered.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_bound(field: &str, raw: &str, bound: Bound) -> SegmentationResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc());
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        SegmentationError::Validation(format!("{field}: '{raw}' is not an ISO-8601 date"))
    })?;
    let naive = match bound {
        Bound::Lower => Some(date.and_time(NaiveTime::MIN)),
        Bound::Upper => date.and_hms_nano_opt(23, 59, 59, 999_999_999),
    };
    naive
        .map(|dt| dt.and_utc())
        .ok_or_else(|| SegmentationError::Validation(format!("{field}: '{raw}' is out of range")))
}
