//! The per-organisation aggregate persisted as one document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    access::*, common::*, crm::*, finance::*, hr::*, lease::*, notification::*, party::*,
    property::*, support::*,
};

pub const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Prefixes of the user-facing sequential references.
pub mod tid_prefix {
    pub const PROPERTY: &str = "PRP";
    pub const TENANT: &str = "TNT";
    pub const CLIENT: &str = "CLT";
    pub const DEAL: &str = "DL";
    pub const EMPLOYEE: &str = "EMP";
    pub const INVOICE: &str = "INV";
    pub const TICKET: &str = "TKT";
}

/// One organisation's isolated data set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "Workspace::default_currency")]
    pub base_currency: String,

    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub floors: Vec<Floor>,
    #[serde(default)]
    pub units: Vec<Unit>,

    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub buyers: Vec<Buyer>,
    #[serde(default)]
    pub leases: Vec<Lease>,
    #[serde(default)]
    pub sales: Vec<Sale>,
    #[serde(default)]
    pub maintenance: Vec<MaintenanceRequest>,

    #[serde(default)]
    pub leads: Vec<Lead>,
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub deals: Vec<Deal>,
    #[serde(default)]
    pub communications: Vec<Communication>,

    #[serde(default = "default_chart")]
    pub accounts: Vec<LedgerAccount>,
    #[serde(default)]
    pub vouchers: Vec<Voucher>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub commissions: Vec<Commission>,
    #[serde(default)]
    pub posting: PostingAccounts,

    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub leave_requests: Vec<LeaveRequest>,
    #[serde(default)]
    pub payroll: Vec<PayrollEntry>,

    #[serde(default = "system_roles")]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub invites: Vec<Invite>,
    #[serde(default)]
    pub device_approvals: Vec<DeviceApproval>,
    #[serde(default)]
    pub notifications: Vec<Notification>,

    #[serde(default)]
    pub tickets: Vec<Ticket>,
    #[serde(default)]
    pub ticket_audit: Vec<TicketAuditEntry>,

    /// Last issued sequence number per reference prefix.
    #[serde(default)]
    pub sequences: BTreeMap<String, u32>,
    pub signing_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "Workspace::schema_version_default")]
    pub schema_version: u8,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            base_currency: Self::default_currency(),
            properties: Vec::new(),
            blocks: Vec::new(),
            floors: Vec::new(),
            units: Vec::new(),
            tenants: Vec::new(),
            buyers: Vec::new(),
            leases: Vec::new(),
            sales: Vec::new(),
            maintenance: Vec::new(),
            leads: Vec::new(),
            clients: Vec::new(),
            deals: Vec::new(),
            communications: Vec::new(),
            accounts: default_chart(),
            vouchers: Vec::new(),
            invoices: Vec::new(),
            payments: Vec::new(),
            commissions: Vec::new(),
            posting: PostingAccounts::default(),
            employees: Vec::new(),
            attendance: Vec::new(),
            leave_requests: Vec::new(),
            payroll: Vec::new(),
            roles: system_roles(),
            users: Vec::new(),
            invites: Vec::new(),
            device_approvals: Vec::new(),
            notifications: Vec::new(),
            tickets: Vec::new(),
            ticket_audit: Vec::new(),
            sequences: BTreeMap::new(),
            signing_key: Self::fresh_signing_key(),
            created_at: now,
            updated_at: now,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Issues the next reference for `prefix`. Numbers are never reused.
    pub fn next_tid(&mut self, prefix: &str) -> Tid {
        let counter = self.sequences.entry(prefix.to_ascii_uppercase()).or_insert(0);
        *counter += 1;
        Tid::format(prefix, *counter)
    }

    /// 256 bits of randomness, hex encoded.
    pub fn fresh_signing_key() -> String {
        format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        )
    }

    pub fn property(&self, id: Uuid) -> Option<&Property> {
        find(&self.properties, id)
    }

    pub fn block(&self, id: Uuid) -> Option<&Block> {
        find(&self.blocks, id)
    }

    pub fn floor(&self, id: Uuid) -> Option<&Floor> {
        find(&self.floors, id)
    }

    pub fn unit(&self, id: Uuid) -> Option<&Unit> {
        find(&self.units, id)
    }

    pub fn unit_mut(&mut self, id: Uuid) -> Option<&mut Unit> {
        self.units.iter_mut().find(|unit| unit.id == id)
    }

    pub fn tenant(&self, id: Uuid) -> Option<&Tenant> {
        find(&self.tenants, id)
    }

    pub fn buyer(&self, id: Uuid) -> Option<&Buyer> {
        find(&self.buyers, id)
    }

    pub fn lease(&self, id: Uuid) -> Option<&Lease> {
        find(&self.leases, id)
    }

    pub fn lease_mut(&mut self, id: Uuid) -> Option<&mut Lease> {
        self.leases.iter_mut().find(|lease| lease.id == id)
    }

    /// The active lease currently binding a tenant, if any.
    pub fn active_lease_for_tenant(&self, tenant_id: Uuid) -> Option<&Lease> {
        self.leases
            .iter()
            .find(|lease| lease.tenant_id == tenant_id && lease.is_active())
    }

    pub fn client(&self, id: Uuid) -> Option<&Client> {
        find(&self.clients, id)
    }

    pub fn deal(&self, id: Uuid) -> Option<&Deal> {
        find(&self.deals, id)
    }

    pub fn account(&self, code: &str) -> Option<&LedgerAccount> {
        self.accounts.iter().find(|account| account.code == code)
    }

    pub fn voucher(&self, id: Uuid) -> Option<&Voucher> {
        find(&self.vouchers, id)
    }

    pub fn voucher_by_number(&self, number: &str) -> Option<&Voucher> {
        self.vouchers.iter().find(|voucher| {
            voucher
                .number
                .as_ref()
                .map_or(false, |tid| tid.as_str().eq_ignore_ascii_case(number))
        })
    }

    pub fn invoice(&self, id: Uuid) -> Option<&Invoice> {
        find(&self.invoices, id)
    }

    pub fn invoice_mut(&mut self, id: Uuid) -> Option<&mut Invoice> {
        self.invoices.iter_mut().find(|invoice| invoice.id == id)
    }

    pub fn employee(&self, id: Uuid) -> Option<&Employee> {
        find(&self.employees, id)
    }

    pub fn role(&self, id: Uuid) -> Option<&Role> {
        find(&self.roles, id)
    }

    pub fn role_by_name(&self, name: &str) -> Option<&Role> {
        self.roles
            .iter()
            .find(|role| role.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn user(&self, id: Uuid) -> Option<&User> {
        find(&self.users, id)
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email.trim()))
    }

    pub fn ticket(&self, id: Uuid) -> Option<&Ticket> {
        find(&self.tickets, id)
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }

    fn default_currency() -> String {
        "USD".into()
    }
}

fn find<T: Identifiable>(items: &[T], id: Uuid) -> Option<&T> {
    items.iter().find(|item| item.id() == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_workspace_is_seeded() {
        let ws = Workspace::new("Acme Estates");
        assert_eq!(ws.accounts.len(), default_chart().len());
        assert!(ws.role_by_name("admin").is_some());
        assert_eq!(ws.signing_key.len(), 64);
        assert_ne!(ws.signing_key, Workspace::new("Other").signing_key);
    }

    #[test]
    fn tids_are_sequential_per_prefix() {
        let mut ws = Workspace::new("Acme");
        assert_eq!(ws.next_tid("PRP").as_str(), "PRP-0001");
        assert_eq!(ws.next_tid("PRP").as_str(), "PRP-0002");
        assert_eq!(ws.next_tid("CLT").as_str(), "CLT-0001");
    }

    #[test]
    fn legacy_documents_gain_defaults() {
        let ws = Workspace::new("Acme");
        let mut json = serde_json::to_value(&ws).unwrap();
        let object = json.as_object_mut().unwrap();
        object.remove("accounts");
        object.remove("roles");
        object.remove("schema_version");
        let restored: Workspace = serde_json::from_value(json).unwrap();
        assert_eq!(restored.accounts.len(), default_chart().len());
        assert_eq!(restored.schema_version, CURRENT_SCHEMA_VERSION);
        assert!(!restored.roles.is_empty());
    }
}
