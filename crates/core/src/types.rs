use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque contact identifier assigned by the contact store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContactId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ContactId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle stage of a contact. Unknown stages are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContactStatus {
    Lead,
    Prospect,
    Customer,
    Inactive,
    Other(String),
}

impl ContactStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ContactStatus::Lead => "lead",
            ContactStatus::Prospect => "prospect",
            ContactStatus::Customer => "customer",
            ContactStatus::Inactive => "inactive",
            ContactStatus::Other(s) => s,
        }
    }
}

impl From<String> for ContactStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "lead" => ContactStatus::Lead,
            "prospect" => ContactStatus::Prospect,
            "customer" => ContactStatus::Customer,
            "inactive" => ContactStatus::Inactive,
            _ => ContactStatus::Other(s),
        }
    }
}

impl From<&str> for ContactStatus {
    fn from(s: &str) -> Self {
        ContactStatus::from(s.to_string())
    }
}

impl From<ContactStatus> for String {
    fn from(status: ContactStatus) -> Self {
        match status {
            ContactStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CRM contact as seen by the segmentation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    #[serde(default)]
    pub status: Option<ContactStatus>,
    #[serde(default)]
    pub position: Option<String>,
    /// Name of the related company, if any.
    #[serde(default)]
    pub company_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Contact {
    pub fn new(id: impl Into<ContactId>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            status: None,
            position: None,
            company_name: None,
            created_at,
            first_name: None,
            last_name: None,
            email: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<ContactStatus>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn with_company(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = Some(company_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
