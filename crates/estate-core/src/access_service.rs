//! Roles, user accounts, permission checks, and invite links.

use std::collections::BTreeSet;

use chrono::Duration;
use estate_domain::{is_valid_email, Invite, Permission, Role, User, Workspace};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth_service::{hex, AuthService, Session},
    property_service::required,
    time::Clock,
    AuthError, CoreError, ServiceResult,
};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteLink {
    pub invite_id: Uuid,
    pub token: String,
    pub url: String,
}

pub struct AccessService;

impl AccessService {
    /// Fails with `Forbidden` unless the session's role grants `permission`.
    pub fn authorize(ws: &Workspace, session: &Session, permission: Permission) -> ServiceResult<()> {
        match ws.role(session.role_id) {
            Some(role) if role.allows(permission) => Ok(()),
            _ => Err(AuthError::Forbidden(permission.to_string()).into()),
        }
    }

    pub fn create_role(
        ws: &mut Workspace,
        name: &str,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> ServiceResult<Uuid> {
        let name = required("Role name", name)?;
        if ws.role_by_name(&name).is_some() {
            return Err(CoreError::Conflict(format!("role `{}` already exists", name)));
        }
        let role = Role::new(name, permissions);
        if role.permissions.is_empty() {
            return Err(CoreError::validation("a role needs at least one permission"));
        }
        let id = role.id;
        info!(role = %role.name, "role created");
        ws.roles.push(role);
        ws.touch();
        Ok(id)
    }

    pub fn set_permissions(
        ws: &mut Workspace,
        id: Uuid,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> ServiceResult<()> {
        let permissions: BTreeSet<Permission> = permissions.into_iter().collect();
        if permissions.is_empty() {
            return Err(CoreError::validation("a role needs at least one permission"));
        }
        let role = ws
            .roles
            .iter_mut()
            .find(|role| role.id == id)
            .ok_or_else(|| CoreError::not_found("Role", id))?;
        if role.system {
            return Err(CoreError::InvalidOperation(format!(
                "system role `{}` cannot be edited",
                role.name
            )));
        }
        role.permissions = permissions;
        ws.touch();
        Ok(())
    }

    pub fn delete_role(ws: &mut Workspace, id: Uuid) -> ServiceResult<()> {
        let role = ws.role(id).ok_or_else(|| CoreError::not_found("Role", id))?;
        if role.system {
            return Err(CoreError::InvalidOperation(format!(
                "system role `{}` cannot be deleted",
                role.name
            )));
        }
        if ws.users.iter().any(|user| user.role_id == id) {
            return Err(CoreError::InvalidOperation(format!(
                "role `{}` is still assigned to users",
                role.name
            )));
        }
        ws.roles.retain(|role| role.id != id);
        ws.invites.retain(|invite| invite.role_id != id || invite.is_accepted());
        ws.touch();
        Ok(())
    }

    pub fn register_user(
        ws: &mut Workspace,
        name: &str,
        email: &str,
        password: &str,
        role_id: Uuid,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        let name = required("Name", name)?;
        let email = email.trim().to_ascii_lowercase();
        if !is_valid_email(&email) {
            return Err(CoreError::Validation(format!("`{}` is not a valid email", email)));
        }
        if ws.user_by_email(&email).is_some() {
            return Err(CoreError::Conflict(format!("user {} already exists", email)));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CoreError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if ws.role(role_id).is_none() {
            return Err(CoreError::not_found("Role", role_id));
        }
        let user = User {
            id: Uuid::new_v4(),
            name,
            email,
            password: AuthService::hash_password(password),
            role_id,
            approved_devices: BTreeSet::new(),
            active: true,
            created_at: clock.now(),
        };
        let id = user.id;
        info!(user = %user.email, "user registered");
        ws.users.push(user);
        ws.touch();
        Ok(id)
    }

    pub fn assign_role(ws: &mut Workspace, session: &Session, user_id: Uuid, role_id: Uuid) -> ServiceResult<()> {
        Self::authorize(ws, session, Permission::CreateRoles)?;
        if ws.role(role_id).is_none() {
            return Err(CoreError::not_found("Role", role_id));
        }
        Self::user_mut(ws, user_id)?.role_id = role_id;
        ws.touch();
        Ok(())
    }

    pub fn set_user_active(ws: &mut Workspace, user_id: Uuid, active: bool) -> ServiceResult<()> {
        Self::user_mut(ws, user_id)?.active = active;
        ws.touch();
        Ok(())
    }

    /// Issues a single-use invite for `role_id`, returned as `<base_url>/invite/<token>`.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_invite(
        ws: &mut Workspace,
        session: &Session,
        role_id: Uuid,
        email: Option<&str>,
        base_url: &str,
        ttl: Duration,
        clock: &dyn Clock,
    ) -> ServiceResult<InviteLink> {
        Self::authorize(ws, session, Permission::GenerateInviteLinks)?;
        if ws.role(role_id).is_none() {
            return Err(CoreError::not_found("Role", role_id));
        }
        let email = match email.map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) if !is_valid_email(email) => {
                return Err(CoreError::Validation(format!("`{}` is not a valid email", email)))
            }
            other => other.map(str::to_ascii_lowercase),
        };
        if ttl <= Duration::zero() {
            return Err(CoreError::validation("invite lifetime must be positive"));
        }
        let now = clock.now();
        let invite = Invite {
            id: Uuid::new_v4(),
            token: hex(&rand::random::<[u8; 24]>()),
            role_id,
            email,
            created_by: session.user_id,
            created_at: now,
            expires_at: now + ttl,
            accepted_at: None,
        };
        let link = InviteLink {
            invite_id: invite.id,
            url: format!("{}/invite/{}", base_url.trim_end_matches('/'), invite.token),
            token: invite.token.clone(),
        };
        info!(invite = %invite.id, "invite generated");
        ws.invites.push(invite);
        ws.touch();
        Ok(link)
    }

    /// Redeems an invite token, creating the user with the invited role.
    ///
    /// Accepts either the bare token or the full invite URL.
    pub fn accept_invite(
        ws: &mut Workspace,
        token: &str,
        name: &str,
        email: &str,
        password: &str,
        clock: &dyn Clock,
    ) -> ServiceResult<Uuid> {
        let token = token.trim().rsplit('/').next().unwrap_or_default();
        let now = clock.now();
        let invite = ws
            .invites
            .iter()
            .find(|invite| invite.token == token)
            .ok_or(AuthError::UnknownInvite)?;
        if invite.is_accepted() {
            return Err(AuthError::InviteUsed.into());
        }
        if invite.is_expired(now) {
            return Err(AuthError::InviteExpired.into());
        }
        if let Some(invited) = &invite.email {
            if !invited.eq_ignore_ascii_case(email.trim()) {
                return Err(CoreError::validation("invite was issued for another email"));
            }
        }
        let (invite_id, role_id) = (invite.id, invite.role_id);
        let user = Self::register_user(ws, name, email, password, role_id, clock)?;
        if let Some(invite) = ws.invites.iter_mut().find(|invite| invite.id == invite_id) {
            invite.accepted_at = Some(now);
        }
        Ok(user)
    }

    fn user_mut(ws: &mut Workspace, id: Uuid) -> ServiceResult<&mut User> {
        ws.users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or_else(|| CoreError::not_found("User", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedClock;
    use chrono::NaiveDate;
    use estate_domain::ADMIN_ROLE;

    fn clock() -> FixedClock {
        FixedClock::on(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
    }

    fn session_for(ws: &Workspace, user_id: Uuid) -> Session {
        let user = ws.user(user_id).unwrap();
        Session {
            user_id,
            role_id: user.role_id,
            device_id: "test".into(),
            expires_at: i64::MAX,
        }
    }

    #[test]
    fn roles_are_unique_and_system_roles_are_protected() {
        let mut ws = Workspace::new("Access");
        let viewer = AccessService::create_role(&mut ws, "Viewer", [Permission::ViewReports]).unwrap();
        assert!(matches!(
            AccessService::create_role(&mut ws, "viewer", [Permission::ViewReports]),
            Err(CoreError::Conflict(_))
        ));
        assert!(AccessService::create_role(&mut ws, "Empty", []).is_err());

        let admin = ws.role_by_name(ADMIN_ROLE).unwrap().id;
        assert!(AccessService::delete_role(&mut ws, admin).is_err());

        AccessService::register_user(&mut ws, "Val", "val@example.com", "secret1", viewer, &clock()).unwrap();
        assert!(AccessService::delete_role(&mut ws, viewer).is_err());
    }

    #[test]
    fn authorize_checks_role_permissions() {
        let mut ws = Workspace::new("Access");
        let agent = ws.role_by_name("Agent").unwrap().id;
        let user = AccessService::register_user(&mut ws, "Ann", "ann@example.com", "secret1", agent, &clock()).unwrap();
        let session = session_for(&ws, user);
        assert!(AccessService::authorize(&ws, &session, Permission::ManageCrm).is_ok());
        let err = AccessService::authorize(&ws, &session, Permission::GenerateInviteLinks).unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::Forbidden(p)) if p == "generate_invite_links"));
    }

    #[test]
    fn invite_link_round_trip() {
        let mut ws = Workspace::new("Access");
        let admin_role = ws.role_by_name(ADMIN_ROLE).unwrap().id;
        let agent = ws.role_by_name("Agent").unwrap().id;
        let admin = AccessService::register_user(&mut ws, "Root", "root@example.com", "secret1", admin_role, &clock()).unwrap();
        let session = session_for(&ws, admin);

        let link = AccessService::generate_invite(
            &mut ws,
            &session,
            agent,
            Some("new@example.com"),
            "https://erp.example.com/",
            Duration::hours(48),
            &clock(),
        )
        .unwrap();
        assert_eq!(link.url, format!("https://erp.example.com/invite/{}", link.token));

        assert!(AccessService::accept_invite(&mut ws, &link.url, "New", "other@example.com", "secret1", &clock()).is_err());
        let user = AccessService::accept_invite(&mut ws, &link.url, "New", "new@example.com", "secret1", &clock()).unwrap();
        assert_eq!(ws.user(user).unwrap().role_id, agent);
        let err = AccessService::accept_invite(&mut ws, &link.token, "Dup", "dup@example.com", "secret1", &clock()).unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::InviteUsed)));
        let err = AccessService::accept_invite(&mut ws, "missing", "X", "x@example.com", "secret1", &clock()).unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::UnknownInvite)));
    }

    #[test]
    fn expired_invites_and_unprivileged_issuers_are_refused() {
        let mut ws = Workspace::new("Access");
        let admin_role = ws.role_by_name(ADMIN_ROLE).unwrap().id;
        let agent = ws.role_by_name("Agent").unwrap().id;
        let admin = AccessService::register_user(&mut ws, "Root", "root@example.com", "secret1", admin_role, &clock()).unwrap();
        let seller = AccessService::register_user(&mut ws, "Sel", "sel@example.com", "secret1", agent, &clock()).unwrap();

        let seller_session = session_for(&ws, seller);
        let denied = AccessService::generate_invite(&mut ws, &seller_session, agent, None, "http://x", Duration::hours(1), &clock());
        assert!(matches!(denied, Err(CoreError::Auth(AuthError::Forbidden(_)))));

        let admin_session = session_for(&ws, admin);
        let link = AccessService::generate_invite(&mut ws, &admin_session, agent, None, "http://x", Duration::hours(1), &clock()).unwrap();
        let later = FixedClock(clock().0 + Duration::hours(2));
        let err = AccessService::accept_invite(&mut ws, &link.token, "Late", "late@example.com", "secret1", &later).unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::InviteExpired)));
    }
}
