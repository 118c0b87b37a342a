//! Resolves the references typed at the prompt into record ids.
//!
//! Records with a sequential reference (`PRP-0001`, `INV-0004`) are found by it;
//! everything else accepts a unique prefix of its id as printed by the list commands.

use estate_core::{CoreError, FinanceService, HrService, PartyService, ServiceResult, SupportService, VoucherService};
use estate_domain::Workspace;
use uuid::Uuid;

const SHORT_ID_LEN: usize = 8;

/// Leading characters of an id, as shown in listings.
pub fn short(id: Uuid) -> String {
    id.simple().to_string()[..SHORT_ID_LEN].to_string()
}

fn by_prefix<T>(
    kind: &'static str,
    items: &[T],
    key: &str,
    id_of: impl Fn(&T) -> Uuid,
) -> ServiceResult<Uuid> {
    let needle = key.trim().to_ascii_lowercase().replace('-', "");
    if needle.is_empty() {
        return Err(CoreError::not_found(kind, key));
    }
    let mut matches = items
        .iter()
        .map(&id_of)
        .filter(|id| id.simple().to_string().starts_with(&needle));
    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(id),
        (Some(_), Some(_)) => Err(CoreError::Validation(format!(
            "`{}` matches more than one {}; type more characters",
            key, kind
        ))),
        (None, _) => Err(CoreError::not_found(kind, key)),
    }
}

pub fn property(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    let trimmed = key.trim();
    ws.properties
        .iter()
        .find(|p| p.tid.as_str().eq_ignore_ascii_case(trimmed) || p.code.eq_ignore_ascii_case(trimmed))
        .map(|p| p.id)
        .map_or_else(|| by_prefix("Property", &ws.properties, key, |p| p.id), Ok)
}

pub fn block(ws: &Workspace, property_id: Uuid, key: &str) -> ServiceResult<Uuid> {
    ws.blocks
        .iter()
        .find(|b| b.property_id == property_id && b.code.eq_ignore_ascii_case(key.trim()))
        .map(|b| b.id)
        .ok_or_else(|| CoreError::not_found("Block", key))
}

pub fn floor(ws: &Workspace, block_id: Uuid, key: &str) -> ServiceResult<Uuid> {
    let level: Option<i32> = key.trim().parse().ok();
    ws.floors
        .iter()
        .find(|f| f.block_id == block_id && (Some(f.level) == level || f.name.eq_ignore_ascii_case(key.trim())))
        .map(|f| f.id)
        .ok_or_else(|| CoreError::not_found("Floor", key))
}

/// `<property-code>/<unit-number>`, a unit number unique across the workspace, or an id prefix.
pub fn unit(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    let trimmed = key.trim();
    if let Some((property_key, number)) = trimmed.split_once('/') {
        let property_id = property(ws, property_key)?;
        return ws
            .units
            .iter()
            .find(|u| u.property_id == property_id && u.unit_number.eq_ignore_ascii_case(number))
            .map(|u| u.id)
            .ok_or_else(|| CoreError::not_found("Unit", key));
    }
    let mut numbered = ws
        .units
        .iter()
        .filter(|u| u.unit_number.eq_ignore_ascii_case(trimmed));
    match (numbered.next(), numbered.next()) {
        (Some(unit), None) => Ok(unit.id),
        (Some(_), Some(_)) => Err(CoreError::Validation(format!(
            "unit `{}` exists in several properties; use <property>/<unit>",
            key
        ))),
        (None, _) => by_prefix("Unit", &ws.units, key, |u| u.id),
    }
}

pub fn unit_label(ws: &Workspace, id: Uuid) -> String {
    ws.unit(id)
        .map(|unit| {
            let code = ws
                .property(unit.property_id)
                .map(|p| p.code.as_str())
                .unwrap_or("?");
            format!("{}/{}", code, unit.unit_number)
        })
        .unwrap_or_else(|| short(id))
}

pub fn tenant(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    PartyService::find_tenant(ws, key)
        .map(|t| t.id)
        .map_or_else(|| by_prefix("Tenant", &ws.tenants, key, |t| t.id), Ok)
}

pub fn buyer(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    ws.buyers
        .iter()
        .find(|b| b.email.eq_ignore_ascii_case(key.trim()))
        .map(|b| b.id)
        .map_or_else(|| by_prefix("Buyer", &ws.buyers, key, |b| b.id), Ok)
}

/// A lease id prefix, or a tenant reference meaning that tenant's active lease.
pub fn lease(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    if let Some(lease) = PartyService::find_tenant(ws, key).and_then(|t| ws.active_lease_for_tenant(t.id)) {
        return Ok(lease.id);
    }
    by_prefix("Lease", &ws.leases, key, |l| l.id)
}

pub fn sale(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    by_prefix("Sale", &ws.sales, key, |s| s.id)
}

pub fn maintenance(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    by_prefix("Maintenance request", &ws.maintenance, key, |m| m.id)
}

pub fn invoice(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    match FinanceService::find_invoice(ws, key) {
        Ok(invoice) => Ok(invoice.id),
        Err(_) => by_prefix("Invoice", &ws.invoices, key, |i| i.id),
    }
}

pub fn voucher(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    match VoucherService::find(ws, key) {
        Ok(voucher) => Ok(voucher.id),
        Err(_) => by_prefix("Voucher", &ws.vouchers, key, |v| v.id),
    }
}

pub fn commission(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    by_prefix("Commission", &ws.commissions, key, |c| c.id)
}

pub fn lead(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    by_prefix("Lead", &ws.leads, key, |l| l.id)
}

pub fn client(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    ws.clients
        .iter()
        .find(|c| c.tid.as_str().eq_ignore_ascii_case(key.trim()))
        .map(|c| c.id)
        .map_or_else(|| by_prefix("Client", &ws.clients, key, |c| c.id), Ok)
}

pub fn deal(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    ws.deals
        .iter()
        .find(|d| d.tid.as_str().eq_ignore_ascii_case(key.trim()))
        .map(|d| d.id)
        .map_or_else(|| by_prefix("Deal", &ws.deals, key, |d| d.id), Ok)
}

pub fn employee(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    HrService::find_employee(ws, key)
        .map(|e| e.id)
        .map_or_else(|| by_prefix("Employee", &ws.employees, key, |e| e.id), Ok)
}

pub fn leave_request(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    by_prefix("Leave request", &ws.leave_requests, key, |l| l.id)
}

pub fn payroll(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    by_prefix("Payroll entry", &ws.payroll, key, |p| p.id)
}

pub fn ticket(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    SupportService::find(ws, key)
        .map(|t| t.id)
        .map_or_else(|| by_prefix("Ticket", &ws.tickets, key, |t| t.id), Ok)
}

pub fn notification(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    by_prefix("Notification", &ws.notifications, key, |n| n.id)
}

pub fn role(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    ws.role_by_name(key.trim())
        .map(|r| r.id)
        .ok_or_else(|| CoreError::not_found("Role", key))
}

pub fn user(ws: &Workspace, key: &str) -> ServiceResult<Uuid> {
    ws.user_by_email(key.trim())
        .map(|u| u.id)
        .map_or_else(|| by_prefix("User", &ws.users, key, |u| u.id), Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use estate_core::PropertyService;
    use estate_domain::{PropertyKind, Unit, UnitKind};

    #[test]
    fn units_resolve_by_code_number_or_prefix() {
        let mut ws = Workspace::new("Lookup");
        let harbour =
            PropertyService::add_property(&mut ws, "Harbour", "HV", "1 Quay", PropertyKind::Residential).unwrap();
        let hill = PropertyService::add_property(&mut ws, "Hill", "HL", "2 Rise", PropertyKind::Residential).unwrap();
        let a1 = PropertyService::add_unit(&mut ws, Unit::new(harbour, "A1", UnitKind::Residential)).unwrap();
        PropertyService::add_unit(&mut ws, Unit::new(hill, "A1", UnitKind::Residential)).unwrap();
        let b2 = PropertyService::add_unit(&mut ws, Unit::new(hill, "B2", UnitKind::Parking)).unwrap();

        assert_eq!(unit(&ws, "hv/a1").unwrap(), a1);
        assert_eq!(unit(&ws, "B2").unwrap(), b2);
        assert!(matches!(unit(&ws, "A1"), Err(CoreError::Validation(_))));
        assert_eq!(unit(&ws, &short(b2)).unwrap(), b2);
        assert_eq!(unit_label(&ws, a1), "HV/A1");
        assert_eq!(property(&ws, "PRP-0002").unwrap(), hill);
    }

    #[test]
    fn empty_prefix_never_matches() {
        let ws = Workspace::new("Lookup");
        assert!(matches!(lead(&ws, "  "), Err(CoreError::NotFound { .. })));
    }
}
