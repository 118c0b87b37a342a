use estate_domain::{is_valid_email, tid_prefix, Buyer, Tenant, Workspace};
use tracing::info;
use uuid::Uuid;

use crate::{property_service::required, CoreError, ServiceResult};

/// Tenant and buyer registry.
pub struct PartyService;

impl PartyService {
    pub fn add_tenant(
        ws: &mut Workspace,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> ServiceResult<Uuid> {
        let name = required("Tenant name", name)?;
        let email = Self::validate_email(email)?;
        if ws
            .tenants
            .iter()
            .any(|tenant| tenant.email.eq_ignore_ascii_case(&email))
        {
            return Err(CoreError::Conflict(format!(
                "a tenant with email {} already exists",
                email
            )));
        }
        let tid = ws.next_tid(tid_prefix::TENANT);
        let mut tenant = Tenant::new(tid, name, email);
        if let Some(phone) = phone.map(str::trim).filter(|phone| !phone.is_empty()) {
            tenant = tenant.with_phone(phone);
        }
        let id = tenant.id;
        info!(tenant = %tenant.tid, "tenant registered");
        ws.tenants.push(tenant);
        ws.touch();
        Ok(id)
    }

    pub fn update_tenant(
        ws: &mut Workspace,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> ServiceResult<()> {
        let name = name.map(|name| required("Tenant name", name)).transpose()?;
        let email = email.map(Self::validate_email).transpose()?;
        if let Some(email) = email.as_deref() {
            if ws
                .tenants
                .iter()
                .any(|tenant| tenant.id != id && tenant.email.eq_ignore_ascii_case(email))
            {
                return Err(CoreError::Conflict(format!(
                    "a tenant with email {} already exists",
                    email
                )));
            }
        }
        let tenant = ws
            .tenants
            .iter_mut()
            .find(|tenant| tenant.id == id)
            .ok_or_else(|| CoreError::not_found("Tenant", id))?;
        if let Some(name) = name {
            tenant.name = name;
        }
        if let Some(email) = email {
            tenant.email = email;
        }
        if let Some(phone) = phone {
            tenant.phone = Some(phone.trim().to_string()).filter(|phone| !phone.is_empty());
        }
        ws.touch();
        Ok(())
    }

    /// Removes a tenant that no lease refers to.
    pub fn remove_tenant(ws: &mut Workspace, id: Uuid) -> ServiceResult<()> {
        if ws.tenant(id).is_none() {
            return Err(CoreError::not_found("Tenant", id));
        }
        if ws.leases.iter().any(|lease| lease.tenant_id == id) {
            return Err(CoreError::InvalidOperation(
                "tenant is referenced by a lease".into(),
            ));
        }
        ws.tenants.retain(|tenant| tenant.id != id);
        ws.touch();
        Ok(())
    }

    pub fn add_buyer(
        ws: &mut Workspace,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> ServiceResult<Uuid> {
        let name = required("Buyer name", name)?;
        let email = Self::validate_email(email)?;
        let mut buyer = Buyer::new(name, email);
        buyer.phone = phone
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty());
        let id = buyer.id;
        ws.buyers.push(buyer);
        ws.touch();
        Ok(id)
    }

    pub fn remove_buyer(ws: &mut Workspace, id: Uuid) -> ServiceResult<()> {
        if ws.buyer(id).is_none() {
            return Err(CoreError::not_found("Buyer", id));
        }
        if ws.sales.iter().any(|sale| sale.buyer_id == id) {
            return Err(CoreError::InvalidOperation(
                "buyer is referenced by a sale".into(),
            ));
        }
        ws.buyers.retain(|buyer| buyer.id != id);
        ws.touch();
        Ok(())
    }

    /// Resolves a tenant by TID or case-insensitive email.
    pub fn find_tenant<'a>(ws: &'a Workspace, key: &str) -> Option<&'a Tenant> {
        let key = key.trim();
        ws.tenants.iter().find(|tenant| {
            tenant.tid.as_str().eq_ignore_ascii_case(key) || tenant.email.eq_ignore_ascii_case(key)
        })
    }

    fn validate_email(email: &str) -> ServiceResult<String> {
        let email = email.trim();
        if is_valid_email(email) {
            Ok(email.to_ascii_lowercase())
        } else {
            Err(CoreError::Validation(format!("`{}` is not a valid email", email)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_emails_are_unique_and_normalised() {
        let mut ws = Workspace::new("Test");
        let id = PartyService::add_tenant(&mut ws, "Jane Doe", "Jane@Example.com", None).unwrap();
        assert_eq!(ws.tenant(id).unwrap().email, "jane@example.com");
        let err = PartyService::add_tenant(&mut ws, "Other", "jane@example.com", None)
            .expect_err("duplicate email");
        assert!(matches!(err, CoreError::Conflict(_)));
        assert!(PartyService::find_tenant(&ws, "tnt-0001").is_some());
    }

    #[test]
    fn invalid_email_is_rejected() {
        let mut ws = Workspace::new("Test");
        let err = PartyService::add_buyer(&mut ws, "Bob", "bob-at-example", None).expect_err("bad email");
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
