use std::collections::BTreeMap;

use chrono::NaiveDate;
use estate_domain::{ranges_overlap, round_cents, PayrollStatus, UnitStatus, Workspace};
use serde::Serialize;

use crate::{
    finance_service::{AgingReport, FinanceService, TrialBalance},
    lease_service::LeaseService,
    CoreError, ServiceResult,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OccupancyRow {
    pub property: String,
    pub name: String,
    pub total_units: usize,
    pub available: usize,
    pub reserved: usize,
    pub occupied: usize,
    pub sold: usize,
    pub maintenance: usize,
    /// Occupied share of units that are not sold.
    pub occupancy_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RentRollRow {
    pub property: String,
    pub unit: String,
    pub tenant: String,
    pub tenant_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub billing: String,
    pub rent: f64,
    pub outstanding: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PayrollSummaryRow {
    pub employee: String,
    pub name: String,
    pub department: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub base_salary: f64,
    pub bonuses: f64,
    pub deductions: f64,
    pub net_pay: f64,
    pub posted: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PayrollSummary {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub rows: Vec<PayrollSummaryRow>,
    pub total_net: f64,
    pub total_posted: f64,
}

/// Read-only register views; rows serialize directly for export.
pub struct ReportService;

impl ReportService {
    pub fn occupancy(ws: &Workspace) -> Vec<OccupancyRow> {
        ws.properties
            .iter()
            .map(|property| {
                let mut counts: BTreeMap<UnitStatus, usize> = BTreeMap::new();
                for unit in ws.units.iter().filter(|u| u.property_id == property.id) {
                    *counts.entry(unit.status).or_default() += 1;
                }
                let count = |status: UnitStatus| counts.get(&status).copied().unwrap_or_default();
                let total_units: usize = counts.values().sum();
                let leasable = total_units - count(UnitStatus::Sold);
                OccupancyRow {
                    property: property.tid.to_string(),
                    name: property.name.clone(),
                    total_units,
                    available: count(UnitStatus::Available),
                    reserved: count(UnitStatus::Reserved),
                    occupied: count(UnitStatus::Occupied),
                    sold: count(UnitStatus::Sold),
                    maintenance: count(UnitStatus::Maintenance),
                    occupancy_rate: if leasable == 0 {
                        0.0
                    } else {
                        count(UnitStatus::Occupied) as f64 / leasable as f64
                    },
                }
            })
            .collect()
    }

    /// Active leases ordered by property and unit.
    pub fn rent_roll(ws: &Workspace) -> Vec<RentRollRow> {
        let mut rows: Vec<RentRollRow> = LeaseService::active_leases(ws)
            .into_iter()
            .map(|lease| {
                let unit = ws.unit(lease.unit_id);
                let property = unit.and_then(|unit| ws.property(unit.property_id));
                let tenant = ws.tenant(lease.tenant_id);
                let outstanding = ws
                    .invoices
                    .iter()
                    .filter(|invoice| invoice.lease_id == Some(lease.id))
                    .map(|invoice| invoice.outstanding())
                    .sum::<f64>();
                RentRollRow {
                    property: property.map(|p| p.code.clone()).unwrap_or_default(),
                    unit: unit.map(|u| u.unit_number.clone()).unwrap_or_default(),
                    tenant: tenant.map(|t| t.tid.to_string()).unwrap_or_default(),
                    tenant_name: tenant.map(|t| t.name.clone()).unwrap_or_default(),
                    start_date: lease.start_date,
                    end_date: lease.end_date,
                    billing: lease.billing.label(),
                    rent: lease.rent,
                    outstanding: round_cents(outstanding),
                }
            })
            .collect();
        rows.sort_by(|a, b| (&a.property, &a.unit).cmp(&(&b.property, &b.unit)));
        rows
    }

    pub fn aging(ws: &Workspace, today: NaiveDate) -> AgingReport {
        FinanceService::receivables_aging(ws, today)
    }

    pub fn trial_balance(ws: &Workspace) -> TrialBalance {
        FinanceService::trial_balance(ws)
    }

    /// Payroll entries whose period overlaps `[from, to]`.
    pub fn payroll_summary(
        ws: &Workspace,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServiceResult<PayrollSummary> {
        if to < from {
            return Err(CoreError::validation("report period ends before it starts"));
        }
        let mut rows: Vec<PayrollSummaryRow> = ws
            .payroll
            .iter()
            .filter(|entry| ranges_overlap(entry.period(), (from, to)))
            .map(|entry| {
                let employee = ws.employee(entry.employee_id);
                PayrollSummaryRow {
                    employee: employee.map(|e| e.tid.to_string()).unwrap_or_default(),
                    name: employee.map(|e| e.full_name()).unwrap_or_default(),
                    department: employee.map(|e| e.department.clone()).unwrap_or_default(),
                    period_start: entry.period_start,
                    period_end: entry.period_end,
                    base_salary: entry.base_salary,
                    bonuses: entry.bonuses,
                    deductions: entry.deductions,
                    net_pay: entry.net_pay,
                    posted: entry.status == PayrollStatus::Posted,
                }
            })
            .collect();
        rows.sort_by(|a, b| (a.period_start, &a.employee).cmp(&(b.period_start, &b.employee)));
        let total_net = round_cents(rows.iter().map(|row| row.net_pay).sum());
        let total_posted = round_cents(rows.iter().filter(|row| row.posted).map(|row| row.net_pay).sum());
        Ok(PayrollSummary {
            period_start: from,
            period_end: to,
            rows,
            total_net,
            total_posted,
        })
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

    #[test]
    fn occupancy_and_rent_roll_follow_leases() {
        let mut ws = Workspace::new("Reports");
        let property = PropertyService::add_property(&mut ws, "Tower", "TW", "", PropertyKind::Residential).unwrap();
        let leased = PropertyService::add_unit(&mut ws, Unit::new(property, "101", UnitKind::Residential)).unwrap();
        PropertyService::add_unit(&mut ws, Unit::new(property, "102", UnitKind::Residential)).unwrap();
        let tenant = PartyService::add_tenant(&mut ws, "Jane", "jane@example.com", None).unwrap();
        let lease = LeaseService::create(
            &mut ws,
            NewLease {
                unit_id: leased,
                tenant_id: tenant,
                start_date: date(1, 1),
                end_date: date(12, 31),
                rent: 800.0,
                deposit: 0.0,
                billing: TimeInterval::monthly(),
                activate: true,
            },
        )
        .unwrap();
        LeaseService::bill_due_rent(&mut ws, lease, date(1, 1), &FixedClock::on(date(1, 1))).unwrap();

        let occupancy = ReportService::occupancy(&ws);
        assert_eq!(occupancy.len(), 1);
        assert_eq!(occupancy[0].occupied, 1);
        assert_eq!(occupancy[0].available, 1);
        assert_eq!(occupancy[0].occupancy_rate, 0.5);

        let roll = ReportService::rent_roll(&ws);
        assert_eq!(roll.len(), 1);
        assert_eq!(roll[0].unit, "101");
        assert_eq!(roll[0].outstanding, 800.0);
    }

    #[test]
    fn payroll_summary_rejects_inverted_period() {
        let ws = Workspace::new("Reports");
        assert!(ReportService::payroll_summary(&ws, date(2, 1), date(1, 1)).is_err());
        let summary = ReportService::payroll_summary(&ws, date(1, 1), date(1, 31)).unwrap();
        assert!(summary.rows.is_empty());
        assert_eq!(summary.total_net, 0.0);
    }
}
