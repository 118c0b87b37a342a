//! Support tickets with an append-only audit trail.

use estate_domain::{
    tid_prefix, AuditAction, Priority, Ticket, TicketAuditEntry, TicketStatus, Workspace,
};
use tracing::info;
use uuid::Uuid;

use crate::{property_service::required, time::Clock, CoreError, ServiceResult};

pub struct SupportService;

impl SupportService {
    pub fn create(
        ws: &mut Workspace,
        title: &str,
        description: &str,
        priority: Priority,
        category: &str,
        raised_by: Option<Uuid>,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        let title = required("Title", title)?;
        let now = clock.now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            tid: ws.next_tid(tid_prefix::TICKET),
            title,
            description: description.trim().to_string(),
            priority,
            category: category.trim().to_ascii_lowercase(),
            status: TicketStatus::Open,
            raised_by,
            created_at: now,
        };
        let id = ticket.id;
        info!(ticket = %ticket.tid, "ticket opened");
        ws.tickets.push(ticket);
        ws.ticket_audit.push(TicketAuditEntry {
            ticket_id: id,
            action: AuditAction::Created,
            old_status: None,
            new_status: Some(TicketStatus::Open),
            comment: None,
            at: now,
        });
        ws.touch();
        Ok(id)
    }

    pub fn update_status(
        ws: &mut Workspace,
        id: Uuid,
        next: TicketStatus,
        comment: Option<&str>,
        clock: &dyn Clock,
    ) -> ServiceResult<()> {
        let ticket = ws
            .tickets
            .iter_mut()
            .find(|ticket| ticket.id == id)
            .ok_or_else(|| CoreError::not_found("Ticket", id))?;
        let previous = ticket.status;
        if !previous.can_transition_to(next) {
            return Err(CoreError::InvalidOperation(format!(
                "ticket cannot move from {} to {}",
                previous, next
            )));
        }
        ticket.status = next;
        ws.ticket_audit.push(TicketAuditEntry {
            ticket_id: id,
            action: AuditAction::StatusUpdate,
            old_status: Some(previous),
            new_status: Some(next),
            comment: comment.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
            at: clock.now(),
        });
        ws.touch();
        Ok(())
    }

    pub fn comment(ws: &mut Workspace, id: Uuid, comment: &str, clock: &dyn Clock) -> ServiceResult<()> {
        if ws.ticket(id).is_none() {
            return Err(CoreError::not_found("Ticket", id));
        }
        let comment = required("Comment", comment)?;
        ws.ticket_audit.push(TicketAuditEntry {
            ticket_id: id,
            action: AuditAction::Comment,
            old_status: None,
            new_status: None,
            comment: Some(comment),
            at: clock.now(),
        });
        ws.touch();
        Ok(())
    }

    /// Oldest first; insertion order breaks timestamp ties.
    pub fn audit(ws: &Workspace, id: Uuid) -> Vec<&TicketAuditEntry> {
        let mut entries: Vec<_> = ws
            .ticket_audit
            .iter()
            .filter(|entry| entry.ticket_id == id)
            .collect();
        entries.sort_by_key(|entry| entry.at);
        entries
    }

    pub fn find<'a>(ws: &'a Workspace, key: &str) -> Option<&'a Ticket> {
        ws.tickets
            .iter()
            .find(|ticket| ticket.tid.as_str().eq_ignore_ascii_case(key.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedClock;
    use chrono::NaiveDate;

    #[test]
    fn status_changes_are_audited_in_order() {
        let mut ws = Workspace::new("Support");
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        let id = SupportService::create(&mut ws, "Leaking tap", "Kitchen", Priority::High, "Plumbing", None, &clock).unwrap();
        assert_eq!(ws.ticket(id).unwrap().tid.as_str(), "TKT-0001");

        SupportService::update_status(&mut ws, id, TicketStatus::InProgress, Some("assigned"), &clock).unwrap();
        SupportService::comment(&mut ws, id, "plumber booked", &clock).unwrap();
        assert!(SupportService::update_status(&mut ws, id, TicketStatus::Closed, None, &clock).is_err());
        SupportService::update_status(&mut ws, id, TicketStatus::Resolved, None, &clock).unwrap();
        SupportService::update_status(&mut ws, id, TicketStatus::Closed, None, &clock).unwrap();
        assert!(SupportService::update_status(&mut ws, id, TicketStatus::Open, None, &clock).is_err());

        let actions: Vec<_> = SupportService::audit(&ws, id).iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::Created,
                AuditAction::StatusUpdate,
                AuditAction::Comment,
                AuditAction::StatusUpdate,
                AuditAction::StatusUpdate,
            ]
        );
        let last = SupportService::audit(&ws, id)[4];
        assert_eq!(last.old_status, Some(TicketStatus::Resolved));
        assert_eq!(last.new_status, Some(TicketStatus::Closed));
    }
}
