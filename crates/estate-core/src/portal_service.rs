//! Tenant-facing views: dashboard, own invoices and payments, self-service requests.

use chrono::NaiveDate;
use estate_domain::{
    round_cents, Invoice, InvoiceStatus, MaintenanceRequest, MaintenanceStatus, Payment,
    PaymentMethod, Priority, RentDue, Workspace,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    finance_service::FinanceService, lease_service::LeaseService, property_service::required,
    time::Clock, CoreError, ServiceResult,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TenantDashboard {
    pub tenant: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_end: Option<NaiveDate>,
    pub outstanding_balance: f64,
    pub open_invoices: usize,
    pub open_maintenance: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_rent_due: Option<RentDue>,
}

pub struct PortalService;

impl PortalService {
    pub fn dashboard(ws: &Workspace, tenant_id: Uuid, today: NaiveDate) -> ServiceResult<TenantDashboard> {
        let tenant = ws
            .tenant(tenant_id)
            .ok_or_else(|| CoreError::not_found("Tenant", tenant_id))?;
        let lease = ws.active_lease_for_tenant(tenant_id);
        let unit = lease
            .and_then(|lease| ws.unit(lease.unit_id))
            .map(|unit| unit.unit_number.clone());
        let open: Vec<&Invoice> = Self::invoices(ws, tenant_id)
            .into_iter()
            .filter(|invoice| invoice.outstanding() > 0.0)
            .collect();
        let next_rent_due = lease.and_then(|lease| {
            LeaseService::rent_schedule(lease)
                .into_iter()
                .find(|due| due.due_date >= today)
        });
        Ok(TenantDashboard {
            tenant: tenant.tid.to_string(),
            name: tenant.name.clone(),
            unit,
            lease_id: lease.map(|lease| lease.id),
            lease_end: lease.map(|lease| lease.end_date),
            outstanding_balance: round_cents(open.iter().map(|i| i.outstanding()).sum()),
            open_invoices: open.len(),
            open_maintenance: ws
                .maintenance
                .iter()
                .filter(|request| request.tenant_id == tenant_id && request.is_open())
                .count(),
            next_rent_due,
        })
    }

    /// Issued invoices billed to the tenant, oldest due first. Drafts stay hidden.
    pub fn invoices(ws: &Workspace, tenant_id: Uuid) -> Vec<&Invoice> {
        let mut invoices: Vec<_> = ws
            .invoices
            .iter()
            .filter(|invoice| invoice.tenant_id == Some(tenant_id))
            .filter(|invoice| invoice.status != InvoiceStatus::Draft)
            .collect();
        invoices.sort_by_key(|invoice| invoice.due_date);
        invoices
    }

    pub fn payments(ws: &Workspace, tenant_id: Uuid) -> Vec<&Payment> {
        ws.payments
            .iter()
            .filter(|payment| {
                ws.invoice(payment.invoice_id)
                    .is_some_and(|invoice| invoice.tenant_id == Some(tenant_id))
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn submit_payment(
        ws: &mut Workspace,
        tenant_id: Uuid,
        invoice_id: Uuid,
        amount: f64,
        method: PaymentMethod,
        date: NaiveDate,
        reference: Option<&str>,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        let invoice = ws
            .invoice(invoice_id)
            .ok_or_else(|| CoreError::not_found("Invoice", invoice_id))?;
        if invoice.tenant_id != Some(tenant_id) {
            return Err(CoreError::InvalidOperation(format!(
                "invoice {} is not billed to this tenant",
                invoice.number
            )));
        }
        FinanceService::record_payment(ws, invoice_id, amount, method, date, reference, clock)
    }

    /// Opens a maintenance request against the tenant's currently leased unit.
    pub fn request_maintenance(
        ws: &mut Workspace,
        tenant_id: Uuid,
        subject: &str,
        description: &str,
        priority: Priority,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        if ws.tenant(tenant_id).is_none() {
            return Err(CoreError::not_found("Tenant", tenant_id));
        }
        let mut request = MaintenanceRequest::new(
            tenant_id,
            required("Subject", subject)?,
            description.trim(),
            priority,
            clock.now(),
        );
        request.unit_id = ws
            .active_lease_for_tenant(tenant_id)
            .map(|lease| lease.unit_id);
        let id = request.id;
        ws.maintenance.push(request);
        ws.touch();
        Ok(id)
    }

    pub fn set_maintenance_status(
        ws: &mut Workspace,
        id: Uuid,
        status: MaintenanceStatus,
    ) -> ServiceResult<()> {
        let request = ws
            .maintenance
            .iter_mut()
            .find(|request| request.id == id)
            .ok_or_else(|| CoreError::not_found("Maintenance request", id))?;
        if request.status == MaintenanceStatus::Closed {
            return Err(CoreError::InvalidOperation("request is already closed".into()));
        }
        request.status = status;
        ws.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lease_service::NewLease, party_service::PartyService, property_service::PropertyService,
        time::FixedClock,
    };
    use estate_domain::{PropertyKind, TimeInterval, Unit, UnitKind};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn leased_tenant(ws: &mut Workspace) -> (Uuid, Uuid) {
        let property = PropertyService::add_property(ws, "Tower", "TW", "", PropertyKind::Residential).unwrap();
        let unit = PropertyService::add_unit(ws, Unit::new(property, "101", UnitKind::Residential)).unwrap();
        let tenant = PartyService::add_tenant(ws, "Jane", "jane@example.com", None).unwrap();
        let lease = LeaseService::create(
            ws,
            NewLease {
                unit_id: unit,
                tenant_id: tenant,
                start_date: date(1, 1),
                end_date: date(12, 31),
                rent: 1000.0,
                deposit: 0.0,
                billing: TimeInterval::monthly(),
                activate: true,
            },
        )
        .unwrap();
        (tenant, lease)
    }

    #[test]
    fn dashboard_summarises_balance_and_next_due() {
        let mut ws = Workspace::new("Portal");
        let clock = FixedClock::on(date(2, 10));
        let (tenant, lease) = leased_tenant(&mut ws);
        let billed = LeaseService::bill_due_rent(&mut ws, lease, date(2, 10), &clock).unwrap();
        assert_eq!(billed.len(), 2);
        PortalService::submit_payment(&mut ws, tenant, billed[0], 1000.0, PaymentMethod::Cash, date(2, 10), None, &clock).unwrap();
        PortalService::request_maintenance(&mut ws, tenant, "Broken heater", "", Priority::High, &clock).unwrap();

        let dash = PortalService::dashboard(&ws, tenant, date(2, 10)).unwrap();
        assert_eq!(dash.unit.as_deref(), Some("101"));
        assert_eq!(dash.outstanding_balance, 1000.0);
        assert_eq!(dash.open_invoices, 1);
        assert_eq!(dash.open_maintenance, 1);
        assert_eq!(dash.next_rent_due.map(|d| d.due_date), Some(date(3, 1)));
        assert_eq!(PortalService::payments(&ws, tenant).len(), 1);
        assert_eq!(ws.maintenance[0].unit_id, ws.lease(lease).map(|l| l.unit_id));
    }

    #[test]
    fn tenants_cannot_pay_foreign_invoices() {
        let mut ws = Workspace::new("Portal");
        let clock = FixedClock::on(date(1, 5));
        let (_, lease) = leased_tenant(&mut ws);
        let billed = LeaseService::bill_due_rent(&mut ws, lease, date(1, 5), &clock).unwrap();
        let stranger = PartyService::add_tenant(&mut ws, "Bob", "bob@example.com", None).unwrap();
        let err = PortalService::submit_payment(&mut ws, stranger, billed[0], 10.0, PaymentMethod::Card, date(1, 5), None, &clock)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
        assert!(PortalService::invoices(&ws, stranger).is_empty());
    }
}
