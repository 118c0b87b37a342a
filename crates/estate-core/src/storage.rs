use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use estate_domain::{VoucherStatus, Workspace};

use crate::CoreError;

/// Describes a persisted backup artifact for a workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceBackupInfo {
    pub workspace: String,
    pub id: String,
    pub created_at: String,
    pub path: PathBuf,
}

/// Abstraction over persistence backends capable of storing workspaces and backups.
pub trait WorkspaceStorage: Send + Sync {
    fn save_workspace(&self, name: &str, workspace: &Workspace) -> Result<(), CoreError>;
    fn load_workspace(&self, name: &str) -> Result<Workspace, CoreError>;
    fn list_workspaces(&self) -> Result<Vec<String>, CoreError>;
    fn delete_workspace(&self, name: &str) -> Result<(), CoreError>;
    fn save_workspace_to_path(&self, workspace: &Workspace, path: &Path) -> Result<(), CoreError>;
    fn load_workspace_from_path(&self, path: &Path) -> Result<Workspace, CoreError>;
    fn backup_workspace(
        &self,
        name: &str,
        workspace: &Workspace,
        note: Option<&str>,
    ) -> Result<WorkspaceBackupInfo, CoreError>;
    fn list_backups(&self, name: &str) -> Result<Vec<WorkspaceBackupInfo>, CoreError>;
    fn restore_backup(&self, backup: &WorkspaceBackupInfo) -> Result<Workspace, CoreError>;
}

/// Detects dangling references and unbalanced posted vouchers within a workspace snapshot.
pub fn workspace_warnings(ws: &Workspace) -> Vec<String> {
    let properties: HashSet<_> = ws.properties.iter().map(|p| p.id).collect();
    let units: HashSet<_> = ws.units.iter().map(|u| u.id).collect();
    let tenants: HashSet<_> = ws.tenants.iter().map(|t| t.id).collect();
    let invoices: HashSet<_> = ws.invoices.iter().map(|i| i.id).collect();
    let employees: HashSet<_> = ws.employees.iter().map(|e| e.id).collect();
    let roles: HashSet<_> = ws.roles.iter().map(|r| r.id).collect();
    let clients: HashSet<_> = ws.clients.iter().map(|c| c.id).collect();
    let accounts: HashSet<&str> = ws.accounts.iter().map(|a| a.code.as_str()).collect();
    let mut warnings = Vec::new();

    for unit in &ws.units {
        if !properties.contains(&unit.property_id) {
            warnings.push(format!(
                "unit {} references unknown property {}",
                unit.unit_number, unit.property_id
            ));
        }
    }
    for lease in &ws.leases {
        if !units.contains(&lease.unit_id) {
            warnings.push(format!("lease {} references unknown unit {}", lease.id, lease.unit_id));
        }
        if !tenants.contains(&lease.tenant_id) {
            warnings.push(format!(
                "lease {} references unknown tenant {}",
                lease.id, lease.tenant_id
            ));
        }
    }
    for invoice in &ws.invoices {
        if let Some(tenant) = invoice.tenant_id {
            if !tenants.contains(&tenant) {
                warnings.push(format!(
                    "invoice {} references unknown tenant {}",
                    invoice.number, tenant
                ));
            }
        }
    }
    for payment in &ws.payments {
        if !invoices.contains(&payment.invoice_id) {
            warnings.push(format!(
                "payment {} references missing invoice {}",
                payment.id, payment.invoice_id
            ));
        }
    }
    for deal in &ws.deals {
        if !clients.contains(&deal.client_id) {
            warnings.push(format!("deal {} references unknown client {}", deal.tid, deal.client_id));
        }
    }
    for entry in &ws.payroll {
        if !employees.contains(&entry.employee_id) {
            warnings.push(format!(
                "payroll entry {} references unknown employee {}",
                entry.id, entry.employee_id
            ));
        }
    }
    for user in &ws.users {
        if !roles.contains(&user.role_id) {
            warnings.push(format!("user {} has unknown role {}", user.email, user.role_id));
        }
    }
    for voucher in &ws.vouchers {
        for line in &voucher.lines {
            if !accounts.contains(line.account_code.as_str()) {
                warnings.push(format!(
                    "voucher {} posts to unknown account {}",
                    voucher.reference(),
                    line.account_code
                ));
            }
        }
        if voucher.status != VoucherStatus::Draft && !voucher.is_balanced() {
            warnings.push(format!(
                "posted voucher {} is unbalanced ({:.2} vs {:.2})",
                voucher.reference(),
                voucher.total_debit(),
                voucher.total_credit()
            ));
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use estate_domain::{Lease, Voucher, VoucherLine, VoucherType};
    use uuid::Uuid;

    #[test]
    fn clean_workspace_has_no_warnings() {
        assert!(workspace_warnings(&Workspace::new("Clean")).is_empty());
    }

    #[test]
    fn dangling_references_and_unbalanced_vouchers_are_reported() {
        let mut ws = Workspace::new("Broken");
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        ws.leases.push(Lease::new(Uuid::new_v4(), Uuid::new_v4(), day, day, 100.0));
        let mut voucher = Voucher::new(
            VoucherType::Journal,
            day,
            "hand edited",
            vec![VoucherLine::debit("1100", 10.0), VoucherLine::credit("9999", 9.0)],
        );
        voucher.status = VoucherStatus::Posted;
        ws.vouchers.push(voucher);

        let warnings = workspace_warnings(&ws);
        assert_eq!(warnings.len(), 4, "{warnings:?}");
        assert!(warnings.iter().any(|w| w.contains("unknown account 9999")));
        assert!(warnings.iter().any(|w| w.contains("unbalanced")));
    }
}
