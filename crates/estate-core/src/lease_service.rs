//! Lease lifecycle, rent billing, and unit sales.

use chrono::NaiveDate;
use estate_domain::{
    ranges_overlap, InvoiceItem, Lease, LeaseStatus, RentDue, Sale, SaleStatus, TimeInterval,
    UnitStatus, Workspace,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    finance_service::{FinanceService, NewInvoice},
    time::Clock,
    CoreError, ServiceResult,
};

/// Inputs for [`LeaseService::create`].
#[derive(Debug, Clone)]
pub struct NewLease {
    pub unit_id: Uuid,
    pub tenant_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rent: f64,
    pub deposit: f64,
    pub billing: TimeInterval,
    /// Start the lease as active instead of draft.
    pub activate: bool,
}

pub struct LeaseService;

impl LeaseService {
    pub fn create(ws: &mut Workspace, draft: NewLease) -> ServiceResult<Uuid> {
        let unit = ws
            .unit(draft.unit_id)
            .ok_or_else(|| CoreError::not_found("Unit", draft.unit_id))?;
        if unit.status == UnitStatus::Sold {
            return Err(CoreError::InvalidOperation(format!(
                "unit {} has been sold",
                unit.unit_number
            )));
        }
        if ws.tenant(draft.tenant_id).is_none() {
            return Err(CoreError::not_found("Tenant", draft.tenant_id));
        }
        if draft.end_date <= draft.start_date {
            return Err(CoreError::validation("lease end date must be after its start"));
        }
        if !(draft.rent.is_finite() && draft.rent > 0.0) {
            return Err(CoreError::validation("rent must be positive"));
        }
        if !(draft.deposit.is_finite() && draft.deposit >= 0.0) {
            return Err(CoreError::validation("deposit cannot be negative"));
        }
        if draft.billing.every == 0 {
            return Err(CoreError::validation("billing interval must be at least 1"));
        }
        match draft.billing.nth_date(draft.start_date, 1) {
            Some(next) if next > draft.start_date => {}
            _ => {
                return Err(CoreError::validation(format!(
                    "billing interval `{}` is out of range",
                    draft.billing.label()
                )))
            }
        }
        if draft.activate {
            Self::ensure_no_open_sale(ws, draft.unit_id)?;
        }

        let mut lease = Lease::new(
            draft.unit_id,
            draft.tenant_id,
            draft.start_date,
            draft.end_date,
            draft.rent,
        )
        .with_deposit(draft.deposit);
        lease.billing = draft.billing;
        Self::ensure_no_overlap(ws, &lease)?;
        let id = lease.id;
        ws.leases.push(lease);
        if draft.activate {
            Self::set_status(ws, id, LeaseStatus::Active)?;
        }
        ws.touch();
        Ok(id)
    }

    /// Moves a lease along its lifecycle and keeps the unit and tenant in step.
    pub fn set_status(ws: &mut Workspace, id: Uuid, next: LeaseStatus) -> ServiceResult<()> {
        let lease = ws.lease(id).ok_or_else(|| CoreError::not_found("Lease", id))?;
        let current = lease.status;
        if !current.can_transition_to(next) {
            return Err(CoreError::InvalidOperation(format!(
                "lease cannot move from {} to {}",
                current, next
            )));
        }
        let (unit_id, tenant_id) = (lease.unit_id, lease.tenant_id);
        if next == LeaseStatus::Active {
            Self::ensure_no_overlap(ws, lease)?;
            if ws.unit(unit_id).map_or(false, |unit| unit.status == UnitStatus::Sold) {
                return Err(CoreError::InvalidOperation("unit has been sold".into()));
            }
            Self::ensure_no_open_sale(ws, unit_id)?;
        }

        if let Some(lease) = ws.lease_mut(id) {
            lease.status = next;
        }
        match next {
            LeaseStatus::Active => {
                if let Some(unit) = ws.unit_mut(unit_id) {
                    unit.status = UnitStatus::Occupied;
                }
                if let Some(tenant) = ws.tenants.iter_mut().find(|t| t.id == tenant_id) {
                    tenant.unit_id = Some(unit_id);
                }
            }
            LeaseStatus::Terminated | LeaseStatus::Expired if current == LeaseStatus::Active => {
                if let Some(unit) = ws.unit_mut(unit_id) {
                    if unit.status == UnitStatus::Occupied {
                        unit.status = UnitStatus::Available;
                    }
                }
                if let Some(tenant) = ws.tenants.iter_mut().find(|t| t.id == tenant_id) {
                    if tenant.unit_id == Some(unit_id) {
                        tenant.unit_id = None;
                    }
                }
            }
            _ => {}
        }
        info!(lease = %id, from = %current, to = %next, "lease status changed");
        ws.touch();
        Ok(())
    }

    /// Expires every active lease whose end date is before `today`.
    pub fn expire_due(ws: &mut Workspace, today: NaiveDate) -> ServiceResult<Vec<Uuid>> {
        let due: Vec<Uuid> = ws
            .leases
            .iter()
            .filter(|lease| lease.is_active() && lease.end_date < today)
            .map(|lease| lease.id)
            .collect();
        for id in &due {
            Self::set_status(ws, *id, LeaseStatus::Expired)?;
        }
        Ok(due)
    }

    /// Rent installments from the start date, stepping by the billing interval,
    /// strictly before the end date. Stops early if the interval leaves the
    /// calendar or fails to advance.
    pub fn rent_schedule(lease: &Lease) -> Vec<RentDue> {
        let mut schedule: Vec<RentDue> = Vec::new();
        for n in 0u32.. {
            let Some(due_date) = lease.billing.nth_date(lease.start_date, n) else {
                break;
            };
            let advanced = schedule.last().map_or(true, |last| due_date > last.due_date);
            if due_date >= lease.end_date || !advanced {
                break;
            }
            schedule.push(RentDue {
                due_date,
                amount: lease.rent,
            });
        }
        schedule
    }

    /// Issues an invoice for each unbilled installment due on or before `through`.
    pub fn bill_due_rent(
        ws: &mut Workspace,
        lease_id: Uuid,
        through: NaiveDate,
        clock: &dyn Clock,
    ) -> ServiceResult<Vec<Uuid>> {
        let lease = ws
            .lease(lease_id)
            .ok_or_else(|| CoreError::not_found("Lease", lease_id))?;
        if !lease.is_active() {
            return Err(CoreError::InvalidOperation(format!(
                "lease is {} and cannot be billed",
                lease.status
            )));
        }
        let tenant_id = lease.tenant_id;
        let pending: Vec<RentDue> = Self::rent_schedule(lease)
            .into_iter()
            .filter(|due| due.due_date <= through)
            .filter(|due| lease.billed_through.map_or(true, |billed| due.due_date > billed))
            .collect();

        let mut invoices = Vec::with_capacity(pending.len());
        for due in pending {
            let invoice = FinanceService::create_invoice(
                ws,
                NewInvoice {
                    tenant_id: Some(tenant_id),
                    buyer_id: None,
                    lease_id: Some(lease_id),
                    issue_date: due.due_date,
                    due_date: due.due_date,
                    items: vec![InvoiceItem::new(
                        format!("Rent due {}", due.due_date),
                        1.0,
                        due.amount,
                    )],
                },
            )?;
            FinanceService::issue_invoice(ws, invoice, clock)?;
            if let Some(lease) = ws.lease_mut(lease_id) {
                lease.billed_through = Some(due.due_date);
            }
            invoices.push(invoice);
        }
        debug!(lease = %lease_id, count = invoices.len(), "rent billed");
        Ok(invoices)
    }

    /// Opens a pending sale and reserves the unit.
    pub fn create_sale(
        ws: &mut Workspace,
        unit_id: Uuid,
        buyer_id: Uuid,
        sale_date: NaiveDate,
        price: f64,
    ) -> ServiceResult<Uuid> {
        let unit = ws
            .unit(unit_id)
            .ok_or_else(|| CoreError::not_found("Unit", unit_id))?;
        if unit.status == UnitStatus::Sold {
            return Err(CoreError::InvalidOperation(format!(
                "unit {} is already sold",
                unit.unit_number
            )));
        }
        if ws.buyer(buyer_id).is_none() {
            return Err(CoreError::not_found("Buyer", buyer_id));
        }
        if ws
            .leases
            .iter()
            .any(|lease| lease.unit_id == unit_id && lease.is_active())
        {
            return Err(CoreError::InvalidOperation(
                "unit is under an active lease".into(),
            ));
        }
        if ws
            .sales
            .iter()
            .any(|sale| sale.unit_id == unit_id && sale.status.holds_unit())
        {
            return Err(CoreError::Conflict("unit already has an open sale".into()));
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(CoreError::validation("sale price must be positive"));
        }
        let sale = Sale::new(unit_id, buyer_id, sale_date, price);
        let id = sale.id;
        ws.sales.push(sale);
        if let Some(unit) = ws.unit_mut(unit_id) {
            unit.status = UnitStatus::Reserved;
        }
        ws.touch();
        Ok(id)
    }

    pub fn set_sale_status(ws: &mut Workspace, id: Uuid, next: SaleStatus) -> ServiceResult<()> {
        let sale = ws
            .sales
            .iter_mut()
            .find(|sale| sale.id == id)
            .ok_or_else(|| CoreError::not_found("Sale", id))?;
        if !sale.status.can_transition_to(next) {
            return Err(CoreError::InvalidOperation(format!(
                "sale cannot move from {} to {}",
                sale.status, next
            )));
        }
        let unit_id = sale.unit_id;
        if next == SaleStatus::Completed
            && ws
                .leases
                .iter()
                .any(|lease| lease.unit_id == unit_id && lease.is_active())
        {
            return Err(CoreError::InvalidOperation(
                "unit is under an active lease".into(),
            ));
        }
        sale.status = next;
        let unit_status = match next {
            SaleStatus::Completed => UnitStatus::Sold,
            SaleStatus::Refunded | SaleStatus::Cancelled => UnitStatus::Available,
            SaleStatus::Pending => UnitStatus::Reserved,
        };
        if let Some(unit) = ws.unit_mut(unit_id) {
            unit.status = unit_status;
        }
        info!(sale = %id, status = %next, "sale status changed");
        ws.touch();
        Ok(())
    }

    pub fn active_leases(ws: &Workspace) -> Vec<&Lease> {
        ws.leases.iter().filter(|lease| lease.is_active()).collect()
    }

    fn ensure_no_open_sale(ws: &Workspace, unit_id: Uuid) -> ServiceResult<()> {
        if ws
            .sales
            .iter()
            .any(|sale| sale.unit_id == unit_id && sale.status.holds_unit())
        {
            return Err(CoreError::InvalidOperation(
                "unit is held by an open sale".into(),
            ));
        }
        Ok(())
    }

    fn ensure_no_overlap(ws: &Workspace, lease: &Lease) -> ServiceResult<()> {
        let clash = ws.leases.iter().any(|other| {
            other.id != lease.id
                && other.unit_id == lease.unit_id
                && other.is_active()
                && ranges_overlap(other.period(), lease.period())
        });
        if clash {
            Err(CoreError::Conflict(
                "unit already has an active lease for these dates".into(),
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{party_service::PartyService, property_service::PropertyService, time::FixedClock};
    use estate_domain::{InvoiceStatus, PropertyKind, TimeUnit, Unit, UnitKind};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        ws: Workspace,
        unit: Uuid,
        tenant: Uuid,
    }

    fn fixture() -> Fixture {
        let mut ws = Workspace::new("Leases");
        let property =
            PropertyService::add_property(&mut ws, "Tower", "TW", "", PropertyKind::Residential).unwrap();
        let unit =
            PropertyService::add_unit(&mut ws, Unit::new(property, "101", UnitKind::Residential)).unwrap();
        let tenant = PartyService::add_tenant(&mut ws, "Jane", "jane@example.com", None).unwrap();
        Fixture { ws, unit, tenant }
    }

    fn new_lease(f: &Fixture, start: NaiveDate, end: NaiveDate, activate: bool) -> NewLease {
        NewLease {
            unit_id: f.unit,
            tenant_id: f.tenant,
            start_date: start,
            end_date: end,
            rent: 1200.0,
            deposit: 0.0,
            billing: TimeInterval::monthly(),
            activate,
        }
    }

    #[test]
    fn active_lease_occupies_unit_and_blocks_overlaps() {
        let mut f = fixture();
        let lease = new_lease(&f, date(2025, 1, 1), date(2025, 12, 31), true);
        LeaseService::create(&mut f.ws, lease).unwrap();
        assert_eq!(f.ws.unit(f.unit).unwrap().status, UnitStatus::Occupied);
        assert_eq!(f.ws.tenant(f.tenant).unwrap().unit_id, Some(f.unit));

        let overlapping = new_lease(&f, date(2025, 12, 31), date(2026, 6, 30), true);
        let err = LeaseService::create(&mut f.ws, overlapping).expect_err("overlap");
        assert!(matches!(err, CoreError::Conflict(_)));
        let later = new_lease(&f, date(2026, 1, 1), date(2026, 6, 30), true);
        assert!(LeaseService::create(&mut f.ws, later).is_ok());
    }

    #[test]
    fn lease_dates_and_rent_are_validated() {
        let mut f = fixture();
        let backwards = new_lease(&f, date(2025, 2, 1), date(2025, 2, 1), false);
        assert!(LeaseService::create(&mut f.ws, backwards).is_err());
        let mut free = new_lease(&f, date(2025, 2, 1), date(2025, 3, 1), false);
        free.rent = 0.0;
        assert!(LeaseService::create(&mut f.ws, free).is_err());
    }

    #[test]
    fn termination_frees_unit_and_invalid_transitions_fail() {
        let mut f = fixture();
        let new = new_lease(&f, date(2025, 1, 1), date(2025, 6, 30), true);
        let id = LeaseService::create(&mut f.ws, new).unwrap();
        LeaseService::set_status(&mut f.ws, id, LeaseStatus::Terminated).unwrap();
        assert_eq!(f.ws.unit(f.unit).unwrap().status, UnitStatus::Available);
        assert_eq!(f.ws.tenant(f.tenant).unwrap().unit_id, None);
        assert!(LeaseService::set_status(&mut f.ws, id, LeaseStatus::Active).is_err());
    }

    #[test]
    fn expire_due_only_touches_past_leases() {
        let mut f = fixture();
        let new = new_lease(&f, date(2025, 1, 1), date(2025, 6, 30), true);
        let id = LeaseService::create(&mut f.ws, new).unwrap();
        assert!(LeaseService::expire_due(&mut f.ws, date(2025, 6, 30)).unwrap().is_empty());
        assert_eq!(LeaseService::expire_due(&mut f.ws, date(2025, 7, 1)).unwrap(), vec![id]);
        assert_eq!(f.ws.lease(id).unwrap().status, LeaseStatus::Expired);
    }

    #[test]
    fn schedule_stops_before_end_and_clamps_month_end() {
        let mut lease = Lease::new(Uuid::new_v4(), Uuid::new_v4(), date(2025, 1, 31), date(2025, 4, 30), 100.0);
        let dates: Vec<_> = LeaseService::rent_schedule(&lease).iter().map(|d| d.due_date).collect();
        assert_eq!(dates, vec![date(2025, 1, 31), date(2025, 2, 28), date(2025, 3, 31)]);

        lease.billing = TimeInterval { every: 2, unit: TimeUnit::Week };
        lease.start_date = date(2025, 1, 1);
        lease.end_date = date(2025, 1, 29);
        assert_eq!(LeaseService::rent_schedule(&lease).len(), 2);
    }

    #[test]
    fn billing_is_idempotent_per_installment() {
        let mut f = fixture();
        let clock = FixedClock::on(date(2025, 3, 1));
        let new = new_lease(&f, date(2025, 1, 1), date(2025, 12, 31), true);
        let id = LeaseService::create(&mut f.ws, new).unwrap();
        let first = LeaseService::bill_due_rent(&mut f.ws, id, date(2025, 3, 1), &clock).unwrap();
        assert_eq!(first.len(), 3);
        assert!(LeaseService::bill_due_rent(&mut f.ws, id, date(2025, 3, 15), &clock).unwrap().is_empty());
        assert_eq!(f.ws.lease(id).unwrap().billed_through, Some(date(2025, 3, 1)));
        assert!(f.ws.invoices.iter().all(|inv| inv.status == InvoiceStatus::Issued));
        assert_eq!(crate::FinanceService::balance_of(&f.ws, "1100"), 3600.0);
    }

    #[test]
    fn sale_lifecycle_drives_unit_status() {
        let mut f = fixture();
        let buyer = PartyService::add_buyer(&mut f.ws, "Bob", "bob@example.com", None).unwrap();
        let sale = LeaseService::create_sale(&mut f.ws, f.unit, buyer, date(2025, 5, 1), 250_000.0).unwrap();
        assert_eq!(f.ws.unit(f.unit).unwrap().status, UnitStatus::Reserved);
        LeaseService::set_sale_status(&mut f.ws, sale, SaleStatus::Completed).unwrap();
        assert_eq!(f.ws.unit(f.unit).unwrap().status, UnitStatus::Sold);
        let lease = new_lease(&f, date(2025, 6, 1), date(2025, 12, 1), false);
        assert!(LeaseService::create(&mut f.ws, lease).is_err());
        LeaseService::set_sale_status(&mut f.ws, sale, SaleStatus::Refunded).unwrap();
        assert_eq!(f.ws.unit(f.unit).unwrap().status, UnitStatus::Available);
    }

    #[test]
    fn oversized_billing_intervals_are_rejected() {
        let mut f = fixture();
        for billing in [
            TimeInterval { every: 4_000_000, unit: TimeUnit::Month },
            TimeInterval { every: 1_000_000_000, unit: TimeUnit::Day },
            TimeInterval { every: u32::MAX, unit: TimeUnit::Year },
        ] {
            let mut lease = new_lease(&f, date(2025, 1, 1), date(2026, 1, 1), true);
            lease.billing = billing.clone();
            let err = LeaseService::create(&mut f.ws, lease).expect_err("interval out of range");
            assert!(matches!(err, CoreError::Validation(_)));

            let mut stored = Lease::new(f.unit, f.tenant, date(2025, 1, 1), date(2026, 1, 1), 100.0);
            stored.billing = billing;
            assert_eq!(LeaseService::rent_schedule(&stored).len(), 1);
        }
        assert!(f.ws.leases.is_empty());

        let mut biennial = new_lease(&f, date(2025, 1, 1), date(2026, 1, 1), false);
        biennial.billing = TimeInterval { every: 24, unit: TimeUnit::Month };
        let id = LeaseService::create(&mut f.ws, biennial).unwrap();
        assert_eq!(LeaseService::rent_schedule(f.ws.lease(id).unwrap()).len(), 1);
    }

    #[test]
    fn pending_sale_and_active_lease_exclude_each_other() {
        let mut f = fixture();
        let buyer = PartyService::add_buyer(&mut f.ws, "Bob", "bob@example.com", None).unwrap();
        let sale = LeaseService::create_sale(&mut f.ws, f.unit, buyer, date(2025, 5, 1), 250_000.0).unwrap();

        let active = new_lease(&f, date(2025, 6, 1), date(2025, 12, 1), true);
        assert!(matches!(
            LeaseService::create(&mut f.ws, active),
            Err(CoreError::InvalidOperation(_))
        ));
        assert!(f.ws.leases.is_empty());
        let new = new_lease(&f, date(2025, 6, 1), date(2025, 12, 1), false);
        let draft = LeaseService::create(&mut f.ws, new).unwrap();
        assert!(LeaseService::set_status(&mut f.ws, draft, LeaseStatus::Active).is_err());
        assert_eq!(f.ws.unit(f.unit).unwrap().status, UnitStatus::Reserved);

        LeaseService::set_sale_status(&mut f.ws, sale, SaleStatus::Cancelled).unwrap();
        LeaseService::set_status(&mut f.ws, draft, LeaseStatus::Active).unwrap();
        // A pending sale saved alongside an active lease must not complete.
        let stale = Sale::new(f.unit, buyer, date(2025, 7, 1), 240_000.0);
        let stale_id = stale.id;
        f.ws.sales.push(stale);
        assert!(matches!(
            LeaseService::set_sale_status(&mut f.ws, stale_id, SaleStatus::Completed),
            Err(CoreError::InvalidOperation(_))
        ));
        assert_eq!(f.ws.unit(f.unit).unwrap().status, UnitStatus::Occupied);
        assert!(f.ws.sales.iter().all(|sale| sale.status != SaleStatus::Completed));
    }

    #[test]
    fn sale_refused_under_active_lease() {
        let mut f = fixture();
        let new = new_lease(&f, date(2025, 1, 1), date(2025, 12, 31), true);
        LeaseService::create(&mut f.ws, new).unwrap();
        let buyer = PartyService::add_buyer(&mut f.ws, "Bob", "bob@example.com", None).unwrap();
        assert!(LeaseService::create_sale(&mut f.ws, f.unit, buyer, date(2025, 5, 1), 1.0).is_err());
    }
}
