//! Users, roles and their permissions, invite links, device approvals, and token claims.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewProperties,
    ManageProperties,
    ManageLeases,
    ViewFinance,
    ManageFinance,
    PostVouchers,
    ManageCrm,
    ManageHr,
    ReadRoles,
    CreateRoles,
    GenerateInviteLinks,
    ApproveDevices,
    ManageSupport,
    ViewReports,
    SendNotifications,
}

crate::labelled_enum!(Permission {
    ViewProperties => "view_properties",
    ManageProperties => "manage_properties",
    ManageLeases => "manage_leases",
    ViewFinance => "view_finance",
    ManageFinance => "manage_finance",
    PostVouchers => "post_vouchers",
    ManageCrm => "manage_crm",
    ManageHr => "manage_hr",
    ReadRoles => "read_roles",
    CreateRoles => "create_roles",
    GenerateInviteLinks => "generate_invite_links",
    ApproveDevices => "approve_devices",
    ManageSupport => "manage_support",
    ViewReports => "view_reports",
    SendNotifications => "send_notifications",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub permissions: BTreeSet<Permission>,
    /// Seeded roles cannot be deleted.
    #[serde(default)]
    pub system: bool,
}

impl Role {
    pub fn new(name: impl Into<String>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            permissions: permissions.into_iter().collect(),
            system: false,
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    fn seeded(mut self) -> Self {
        self.system = true;
        self
    }
}

impl Identifiable for Role {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Role {
    fn name(&self) -> &str {
        &self.name
    }
}

pub const ADMIN_ROLE: &str = "Admin";

/// Roles every workspace starts with.
pub fn system_roles() -> Vec<Role> {
    use Permission::*;
    vec![
        Role::new(ADMIN_ROLE, Permission::ALL.iter().copied()).seeded(),
        Role::new(
            "Accountant",
            [ViewProperties, ViewFinance, ManageFinance, PostVouchers, ViewReports],
        )
        .seeded(),
        Role::new(
            "Agent",
            [ViewProperties, ManageProperties, ManageLeases, ManageCrm],
        )
        .seeded(),
        Role::new("HR Manager", [ManageHr, ReadRoles, ViewReports]).seeded(),
    ]
}

/// Salted, iterated SHA-256 digest of a password, both parts hex encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordHash {
    pub salt: String,
    pub hash: String,
    pub iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password: PasswordHash,
    pub role_id: Uuid,
    #[serde(default)]
    pub approved_devices: BTreeSet<String>,
    #[serde(default = "User::default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_device(&self, device_id: &str) -> bool {
        self.approved_devices.contains(device_id)
    }

    fn default_active() -> bool {
        true
    }
}

impl Identifiable for User {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for User {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Single-use link granting a role to whoever accepts it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invite {
    pub id: Uuid,
    pub token: String,
    pub role_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Invite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }
}

/// A login from a device the user has not used before.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceApproval {
    pub user_id: Uuid,
    pub device_id: String,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl DeviceApproval {
    pub fn is_pending(&self) -> bool {
        self.approved_at.is_none()
    }
}

/// Payload of a signed session token. Times are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub org: Uuid,
    pub role: Uuid,
    pub device: String,
    pub iat: i64,
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_role_holds_every_permission() {
        let roles = system_roles();
        let admin = roles.iter().find(|r| r.name == ADMIN_ROLE).unwrap();
        assert!(admin.system);
        assert_eq!(admin.permissions.len(), Permission::ALL.len());
        let agent = roles.iter().find(|r| r.name == "Agent").unwrap();
        assert!(agent.allows(Permission::ManageCrm));
        assert!(!agent.allows(Permission::PostVouchers));
    }

    #[test]
    fn permissions_serialize_snake_case() {
        let json = serde_json::to_string(&Permission::GenerateInviteLinks).unwrap();
        assert_eq!(json, "\"generate_invite_links\"");
        assert_eq!(
            "read-roles".parse::<Permission>(),
            Ok(Permission::ReadRoles)
        );
    }
}
