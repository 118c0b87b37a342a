//! People the workspace does business with: lease tenants and unit buyers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// A person renting one of the workspace's units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    pub id: Uuid,
    pub tid: Tid,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(tid: Tid, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tid,
            name: name.into(),
            email: email.into(),
            phone: None,
            unit_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

impl Identifiable for Tenant {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Tenant {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for Tenant {
    fn display_label(&self) -> String {
        format!("{} {} <{}>", self.tid, self.name, self.email)
    }
}

/// A person purchasing a unit outright.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Buyer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Buyer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            phone: None,
        }
    }
}

impl Identifiable for Buyer {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Buyer {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Minimal shape check: one `@`, a non-empty local part, and a dotted domain.
pub fn is_valid_email(candidate: &str) -> bool {
    let trimmed = candidate.trim();
    let Some((local, domain)) = trimmed.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
        && !trimmed.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("jane@example.com"));
        assert!(is_valid_email("j.doe+rent@mail.example.org"));
        assert!(!is_valid_email("jane.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jane@localhost"));
        assert!(!is_valid_email("jane@@example.com"));
        assert!(!is_valid_email("ja ne@example.com"));
    }
}
