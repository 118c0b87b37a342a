//! Lead qualification, client conversion, deals, and communication logs.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use estate_domain::{
    round_cents, tid_prefix, Channel, Client, ClientStage, Communication, Deal, DealStage, Lead,
    LeadStage, Workspace,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{property_service::required, CoreError, ServiceResult};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StageTotals {
    pub count: usize,
    pub value: f64,
}

pub struct CrmService;

impl CrmService {
    pub fn add_lead(
        ws: &mut Workspace,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        source: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> ServiceResult<Uuid> {
        let name = required("Lead name", name)?;
        let mut lead = Lead::new(name).with_contact(optional(email), optional(phone));
        lead.source = optional(source);
        lead.created_at = created_at;
        let id = lead.id;
        ws.leads.push(lead);
        ws.touch();
        Ok(id)
    }

    pub fn set_lead_stage(ws: &mut Workspace, id: Uuid, next: LeadStage) -> ServiceResult<()> {
        if next == LeadStage::Converted {
            return Err(CoreError::InvalidOperation(
                "use lead conversion to mark a lead converted".into(),
            ));
        }
        let lead = Self::lead_mut(ws, id)?;
        Self::check_lead_transition(lead.stage, next)?;
        lead.stage = next;
        ws.touch();
        Ok(())
    }

    /// Turns a qualified lead into a prospect client that remembers its origin.
    pub fn convert_lead(ws: &mut Workspace, id: Uuid) -> ServiceResult<Uuid> {
        let lead = Self::lead_mut(ws, id)?;
        Self::check_lead_transition(lead.stage, LeadStage::Converted)?;
        lead.stage = LeadStage::Converted;
        let (name, email, phone) = (lead.name.clone(), lead.email.clone(), lead.phone.clone());

        let tid = ws.next_tid(tid_prefix::CLIENT);
        let mut client = Client::new(tid, name);
        client.email = email;
        client.phone = phone;
        client.source_lead_id = Some(id);
        let client_id = client.id;
        info!(client = %client.tid, lead = %id, "lead converted");
        ws.clients.push(client);
        ws.touch();
        Ok(client_id)
    }

    pub fn add_client(
        ws: &mut Workspace,
        name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> ServiceResult<Uuid> {
        let name = required("Client name", name)?;
        let tid = ws.next_tid(tid_prefix::CLIENT);
        let mut client = Client::new(tid, name);
        client.email = optional(email);
        client.phone = optional(phone);
        let id = client.id;
        ws.clients.push(client);
        ws.touch();
        Ok(id)
    }

    pub fn set_client_stage(ws: &mut Workspace, id: Uuid, stage: ClientStage) -> ServiceResult<()> {
        let client = ws
            .clients
            .iter_mut()
            .find(|client| client.id == id)
            .ok_or_else(|| CoreError::not_found("Client", id))?;
        client.stage = stage;
        ws.touch();
        Ok(())
    }

    pub fn add_deal(
        ws: &mut Workspace,
        client_id: Uuid,
        title: &str,
        value: f64,
        unit_id: Option<Uuid>,
    ) -> ServiceResult<Uuid> {
        if ws.client(client_id).is_none() {
            return Err(CoreError::not_found("Client", client_id));
        }
        if let Some(unit_id) = unit_id {
            if ws.unit(unit_id).is_none() {
                return Err(CoreError::not_found("Unit", unit_id));
            }
        }
        let title = required("Deal title", title)?;
        if !(value.is_finite() && value >= 0.0) {
            return Err(CoreError::validation("deal value cannot be negative"));
        }
        let tid = ws.next_tid(tid_prefix::DEAL);
        let mut deal = Deal::new(tid, client_id, title, round_cents(value));
        deal.unit_id = unit_id;
        let id = deal.id;
        ws.deals.push(deal);
        ws.touch();
        Ok(id)
    }

    /// Moves a deal through the pipeline; closing stamps `closed_on`.
    pub fn set_deal_stage(
        ws: &mut Workspace,
        id: Uuid,
        next: DealStage,
        today: NaiveDate,
    ) -> ServiceResult<()> {
        let deal = ws
            .deals
            .iter_mut()
            .find(|deal| deal.id == id)
            .ok_or_else(|| CoreError::not_found("Deal", id))?;
        if !deal.stage.can_transition_to(next) {
            return Err(CoreError::InvalidOperation(format!(
                "deal cannot move from {} to {}",
                deal.stage, next
            )));
        }
        deal.stage = next;
        deal.closed_on = next.is_closed().then_some(today);
        info!(deal = %deal.tid, stage = %next, "deal stage changed");
        let won_client = (next == DealStage::ClosedWon).then_some(deal.client_id);
        if let Some(client_id) = won_client {
            if let Some(client) = ws.clients.iter_mut().find(|c| c.id == client_id) {
                client.stage = ClientStage::Active;
            }
        }
        ws.touch();
        Ok(())
    }

    pub fn log_communication(
        ws: &mut Workspace,
        client_id: Uuid,
        deal_id: Option<Uuid>,
        channel: Channel,
        subject: &str,
        content: &str,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<Uuid> {
        if ws.client(client_id).is_none() {
            return Err(CoreError::not_found("Client", client_id));
        }
        if let Some(deal_id) = deal_id {
            let deal = ws
                .deal(deal_id)
                .ok_or_else(|| CoreError::not_found("Deal", deal_id))?;
            if deal.client_id != client_id {
                return Err(CoreError::validation("deal belongs to another client"));
            }
        }
        let communication = Communication {
            id: Uuid::new_v4(),
            client_id,
            deal_id,
            channel,
            subject: required("Subject", subject)?,
            content: content.trim().to_string(),
            occurred_at,
        };
        let id = communication.id;
        ws.communications.push(communication);
        ws.touch();
        Ok(id)
    }

    /// Communications for a client, most recent first.
    pub fn history(ws: &Workspace, client_id: Uuid) -> Vec<&Communication> {
        let mut entries: Vec<_> = ws
            .communications
            .iter()
            .filter(|entry| entry.client_id == client_id)
            .collect();
        entries.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        entries
    }

    /// Deal count and value per stage; every stage is present.
    pub fn pipeline(ws: &Workspace) -> BTreeMap<DealStage, StageTotals> {
        let mut totals: BTreeMap<DealStage, StageTotals> = DealStage::ALL
            .iter()
            .map(|stage| (*stage, StageTotals::default()))
            .collect();
        for deal in &ws.deals {
            let entry = totals.entry(deal.stage).or_default();
            entry.count += 1;
            entry.value = round_cents(entry.value + deal.value);
        }
        totals
    }

    fn lead_mut(ws: &mut Workspace, id: Uuid) -> ServiceResult<&mut Lead> {
        ws.leads
            .iter_mut()
            .find(|lead| lead.id == id)
            .ok_or_else(|| CoreError::not_found("Lead", id))
    }

    fn check_lead_transition(current: LeadStage, next: LeadStage) -> ServiceResult<()> {
        if current.can_transition_to(next) {
            Ok(())
        } else {
            Err(CoreError::InvalidOperation(format!(
                "lead cannot move from {} to {}",
                current, next
            )))
        }
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    #[test]
    fn lead_walks_to_conversion() {
        let mut ws = Workspace::new("CRM");
        let lead = CrmService::add_lead(&mut ws, "Ada", Some("ada@example.com"), None, Some("web"), Utc::now()).unwrap();
        assert!(CrmService::convert_lead(&mut ws, lead).is_err(), "new leads are not qualified yet");
        CrmService::set_lead_stage(&mut ws, lead, LeadStage::Contacted).unwrap();
        CrmService::set_lead_stage(&mut ws, lead, LeadStage::Qualified).unwrap();
        let client = CrmService::convert_lead(&mut ws, lead).unwrap();
        let client = ws.client(client).unwrap();
        assert_eq!(client.source_lead_id, Some(lead));
        assert_eq!(client.tid.as_str(), "CLT-0001");
        assert_eq!(client.email.as_deref(), Some("ada@example.com"));
        assert!(CrmService::set_lead_stage(&mut ws, lead, LeadStage::Lost).is_err());
    }

    #[test]
    fn closing_a_deal_records_date_and_is_terminal() {
        let mut ws = Workspace::new("CRM");
        let client = CrmService::add_client(&mut ws, "Acme", None, None).unwrap();
        let deal = CrmService::add_deal(&mut ws, client, "Lease 12F", 50_000.0, None).unwrap();
        assert!(CrmService::set_deal_stage(&mut ws, deal, DealStage::ClosedWon, today()).is_err());
        CrmService::set_deal_stage(&mut ws, deal, DealStage::Negotiation, today()).unwrap();
        CrmService::set_deal_stage(&mut ws, deal, DealStage::ClosedWon, today()).unwrap();
        assert_eq!(ws.deal(deal).unwrap().closed_on, Some(today()));
        assert_eq!(ws.client(client).unwrap().stage, ClientStage::Active);
        assert!(CrmService::set_deal_stage(&mut ws, deal, DealStage::Negotiation, today()).is_err());

        let pipeline = CrmService::pipeline(&ws);
        assert_eq!(pipeline[&DealStage::ClosedWon].count, 1);
        assert_eq!(pipeline[&DealStage::ClosedWon].value, 50_000.0);
        assert_eq!(pipeline[&DealStage::Prospecting].count, 0);
    }

    #[test]
    fn communication_deal_must_match_client() {
        let mut ws = Workspace::new("CRM");
        let first = CrmService::add_client(&mut ws, "First", None, None).unwrap();
        let second = CrmService::add_client(&mut ws, "Second", None, None).unwrap();
        let deal = CrmService::add_deal(&mut ws, first, "Deal", 1.0, None).unwrap();
        let err = CrmService::log_communication(&mut ws, second, Some(deal), Channel::Call, "Hi", "", Utc::now())
            .expect_err("foreign deal");
        assert!(matches!(err, CoreError::Validation(_)));
        CrmService::log_communication(&mut ws, first, Some(deal), Channel::Email, "Offer", "Sent", Utc::now()).unwrap();
        assert_eq!(CrmService::history(&ws, first).len(), 1);
    }
}
