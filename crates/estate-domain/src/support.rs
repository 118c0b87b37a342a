//! Support tickets and their append-only audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: Uuid,
    pub tid: Tid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: String,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raised_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Identifiable for Ticket {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for Ticket {
    fn display_label(&self) -> String {
        format!("{} {} [{}]", self.tid, self.title, self.status)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

crate::labelled_enum!(TicketStatus {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

impl TicketStatus {
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Open, InProgress)
                | (Open, Resolved)
                | (Open, Closed)
                | (InProgress, Resolved)
                | (InProgress, Open)
                | (Resolved, Closed)
                | (Resolved, Open)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    StatusUpdate,
    Comment,
}

crate::labelled_enum!(AuditAction {
    Created => "created",
    StatusUpdate => "status_update",
    Comment => "comment",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketAuditEntry {
    pub ticket_id: Uuid,
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_status: Option<TicketStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<TicketStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_tickets_stay_closed() {
        for next in TicketStatus::ALL {
            assert!(!TicketStatus::Closed.can_transition_to(*next));
        }
        assert!(TicketStatus::Resolved.can_transition_to(TicketStatus::Open));
        assert!(!TicketStatus::InProgress.can_transition_to(TicketStatus::Closed));
    }
}
