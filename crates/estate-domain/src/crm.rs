//! CRM pipeline records: leads, clients, deals, and logged communications.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub stage: LeadStage,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: None,
            phone: None,
            source: None,
            stage: LeadStage::New,
            created_at: Utc::now(),
        }
    }

    pub fn with_contact(mut self, email: Option<String>, phone: Option<String>) -> Self {
        self.email = email;
        self.phone = phone;
        self
    }
}

impl Identifiable for Lead {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Lead {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LeadStage {
    New,
    Contacted,
    Qualified,
    Converted,
    Lost,
}

crate::labelled_enum!(LeadStage {
    New => "new",
    Contacted => "contacted",
    Qualified => "qualified",
    Converted => "converted",
    Lost => "lost",
});

impl LeadStage {
    pub fn can_transition_to(self, next: LeadStage) -> bool {
        use LeadStage::*;
        matches!(
            (self, next),
            (New, Contacted)
                | (New, Lost)
                | (Contacted, Qualified)
                | (Contacted, Lost)
                | (Qualified, Converted)
                | (Qualified, Lost)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LeadStage::Converted | LeadStage::Lost)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id: Uuid,
    pub tid: Tid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_lead_id: Option<Uuid>,
    pub stage: ClientStage,
}

impl Client {
    pub fn new(tid: Tid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tid,
            name: name.into(),
            email: None,
            phone: None,
            source_lead_id: None,
            stage: ClientStage::Prospect,
        }
    }
}

impl Identifiable for Client {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Client {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for Client {
    fn display_label(&self) -> String {
        format!("{} {} ({})", self.tid, self.name, self.stage)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientStage {
    Prospect,
    Active,
    Inactive,
}

crate::labelled_enum!(ClientStage {
    Prospect => "prospect",
    Active => "active",
    Inactive => "inactive",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deal {
    pub id: Uuid,
    pub tid: Tid,
    pub client_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<Uuid>,
    pub title: String,
    pub value: f64,
    pub stage: DealStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_on: Option<NaiveDate>,
}

impl Deal {
    pub fn new(tid: Tid, client_id: Uuid, title: impl Into<String>, value: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            tid,
            client_id,
            unit_id: None,
            title: title.into(),
            value,
            stage: DealStage::Prospecting,
            closed_on: None,
        }
    }
}

impl Identifiable for Deal {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Prospecting,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

crate::labelled_enum!(DealStage {
    Prospecting => "prospecting",
    Negotiation => "negotiation",
    ClosedWon => "closed_won",
    ClosedLost => "closed_lost",
});

impl DealStage {
    pub fn can_transition_to(self, next: DealStage) -> bool {
        use DealStage::*;
        matches!(
            (self, next),
            (Prospecting, Negotiation)
                | (Prospecting, ClosedLost)
                | (Negotiation, ClosedWon)
                | (Negotiation, ClosedLost)
                | (Negotiation, Prospecting)
        )
    }

    pub fn is_closed(self) -> bool {
        matches!(self, DealStage::ClosedWon | DealStage::ClosedLost)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Communication {
    pub id: Uuid,
    pub client_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<Uuid>,
    pub channel: Channel,
    pub subject: String,
    pub content: String,
    pub occurred_at: DateTime<Utc>,
}

impl Identifiable for Communication {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Call,
    Meeting,
    Note,
}

crate::labelled_enum!(Channel {
    Email => "email",
    Call => "call",
    Meeting => "meeting",
    Note => "note",
});
