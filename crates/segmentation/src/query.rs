//! Store-level contact queries: a conjunction of field constraints that a
//! contact store can evaluate natively (in memory, or rendered to SQL).

use chrono::{DateTime, Utc};
use crm_core::Contact;
use serde::{Deserialize, Serialize};

/// Contact attributes a query can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    Id,
    Status,
    CompanyName,
    Position,
    CreatedAt,
}

impl ContactField {
    /// Column expression in the `contacts c LEFT JOIN companies co` shape.
    pub fn column(&self) -> &'static str {
        match self {
            ContactField::Id => "c.id",
            ContactField::Status => "c.status",
            ContactField::CompanyName => "co.name",
            ContactField::Position => "c.position",
            ContactField::CreatedAt => "c.created_at",
        }
    }

    fn text<'a>(&self, contact: &'a Contact) -> Option<&'a str> {
        match self {
            ContactField::Id => Some(contact.id.as_str()),
            ContactField::Status => contact.status.as_ref().map(|s| s.as_str()),
            ContactField::CompanyName => contact.company_name.as_deref(),
            ContactField::Position => contact.position.as_deref(),
            ContactField::CreatedAt => None,
        }
    }

    fn timestamp(&self, contact: &Contact) -> Option<DateTime<Utc>> {
        match self {
            ContactField::CreatedAt => Some(contact.created_at),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Constraint {
    Equals { field: ContactField, value: String },
    ContainsIgnoreCase { field: ContactField, needle: String },
    /// Inclusive lower bound.
    AtLeast { field: ContactField, bound: DateTime<Utc> },
    /// Inclusive upper bound.
    AtMost { field: ContactField, bound: DateTime<Utc> },
    OneOf { field: ContactField, values: Vec<String> },
}

impl Constraint {
    pub fn field(&self) -> ContactField {
        match self {
            Constraint::Equals { field, .. }
            | Constraint::ContainsIgnoreCase { field, .. }
            | Constraint::AtLeast { field, .. }
            | Constraint::AtMost { field, .. }
            | Constraint::OneOf { field, .. } => *field,
        }
    }

    /// A missing attribute never satisfies a constraint.
    pub fn admits(&self, contact: &Contact) -> bool {
        match self {
            Constraint::Equals { field, value } => field.text(contact) == Some(value.as_str()),
            Constraint::ContainsIgnoreCase { field, needle } => field
                .text(contact)
                .is_some_and(|haystack| contains_ignore_case(haystack, needle)),
            Constraint::AtLeast { field, bound } => {
                field.timestamp(contact).is_some_and(|ts| ts >= *bound)
            }
            Constraint::AtMost { field, bound } => {
                field.timestamp(contact).is_some_and(|ts| ts <= *bound)
            }
            Constraint::OneOf { field, values } => field
                .text(contact)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
        }
    }
}

/// Case-insensitive substring containment shared by both evaluation paths.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Conjunction of constraints. The empty query selects every contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactQuery {
    constraints: Vec<Constraint>,
}

/// Bind parameter for a rendered SQL filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Text(String),
    Timestamp(DateTime<Utc>),
    TextList(Vec<String>),
}

/// Parameterized `WHERE` clause using `$n` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFilter {
    pub clause: String,
    pub params: Vec<SqlParam>,
}

impl ContactQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_unconstrained(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn admits(&self, contact: &Contact) -> bool {
        self.constraints.iter().all(|c| c.admits(contact))
    }

    pub fn to_sql(&self) -> SqlFilter {
        if self.constraints.is_empty() {
            return SqlFilter {
                clause: "TRUE".to_string(),
                params: Vec::new(),
            };
        }

        let mut params = Vec::with_capacity(self.constraints.len());
        let mut parts = Vec::with_capacity(self.constraints.len());
        for constraint in &self.constraints {
            let column = constraint.field().column();
            let placeholder = params.len() + 1;
            match constraint {
                Constraint::Equals { value, .. } => {
                    parts.push(format!("{column} = ${placeholder}"));
                    params.push(SqlParam::Text(value.clone()));
                }
                Constraint::ContainsIgnoreCase { needle, .. } => {
                    parts.push(format!("{column} ILIKE ${placeholder} ESCAPE '\\'"));
                    params.push(SqlParam::Text(format!("%{}%", escape_like(needle))));
                }
                Constraint::AtLeast { bound, .. } => {
                    parts.push(format!("{column} >= ${placeholder}"));
                    params.push(SqlParam::Timestamp(*bound));
                }
                Constraint::AtMost { bound, .. } => {
                    parts.push(format!("{column} <= ${placeholder}"));
                    params.push(SqlParam::Timestamp(*bound));
                }
                Constraint::OneOf { values, .. } => {
                    parts.push(format!("{column} = ANY(${placeholder})"));
                    params.push(SqlParam::TextList(values.clone()));
                }
            }
        }

        SqlFilter {
            clause: parts.join(" AND "),
            params,
        }
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
