//! Password hashing, signed session tokens, and device approval.

use std::fmt::Write as _;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Duration;
use estate_domain::{Claims, DeviceApproval, PasswordHash, Permission, User, Workspace};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{access_service::AccessService, time::Clock, AuthError, CoreError, ServiceResult};

type HmacSha256 = Hmac<Sha256>;

const PASSWORD_ITERATIONS: u32 = 10_000;
const TOKEN_ALGORITHM: &str = "HS256";

/// Knobs read from configuration when issuing and checking tokens.
#[derive(Debug, Clone, Copy)]
pub struct AuthPolicy {
    pub token_ttl: Duration,
    pub require_device_approval: bool,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            token_ttl: Duration::minutes(60),
            require_device_approval: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub token: String,
    pub device_approval_required: bool,
}

/// An authenticated caller, resolved from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub device_id: String,
    pub expires_at: i64,
}

#[derive(Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

pub struct AuthService;

impl AuthService {
    pub fn hash_password(password: &str) -> PasswordHash {
        let salt = hex(&rand::random::<[u8; 16]>());
        let hash = digest_password(&salt, password, PASSWORD_ITERATIONS);
        PasswordHash {
            salt,
            hash,
            iterations: PASSWORD_ITERATIONS,
        }
    }

    pub fn verify_password(stored: &PasswordHash, password: &str) -> bool {
        let candidate = digest_password(&stored.salt, password, stored.iterations.max(1));
        constant_time_eq(candidate.as_bytes(), stored.hash.as_bytes())
    }

    /// Checks credentials and issues a token bound to `device_id`.
    ///
    /// A user's first device is trusted on sight; any later unknown device is
    /// queued for approval and the token stays unusable until it is approved.
    pub fn login(
        ws: &mut Workspace,
        email: &str,
        password: &str,
        device_id: &str,
        policy: &AuthPolicy,
        clock: &dyn Clock,
    ) -> ServiceResult<LoginOutcome> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(CoreError::validation("device id is required"));
        }
        let org = ws.id;
        let now = clock.now();
        let user = ws
            .users
            .iter_mut()
            .find(|user| user.email.eq_ignore_ascii_case(email.trim()))
            .ok_or(AuthError::InvalidCredentials)?;
        if !Self::verify_password(&user.password, password) {
            warn!(user = %user.id, "rejected login");
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.active {
            return Err(AuthError::Disabled.into());
        }
        if user.approved_devices.is_empty() {
            user.approved_devices.insert(device_id.to_string());
        }
        let approval_required = policy.require_device_approval && !user.has_device(device_id);
        let claims = Claims {
            sub: user.id,
            org,
            role: user.role_id,
            device: device_id.to_string(),
            iat: now.timestamp(),
            exp: (now + policy.token_ttl).timestamp(),
        };
        let user_id = user.id;

        if approval_required
            && !ws
                .device_approvals
                .iter()
                .any(|a| a.user_id == user_id && a.device_id == device_id && a.is_pending())
        {
            ws.device_approvals.push(DeviceApproval {
                user_id,
                device_id: device_id.to_string(),
                requested_at: now,
                approved_at: None,
            });
        }
        let token = Self::issue_token(&ws.signing_key, &claims)?;
        info!(user = %user_id, approval_required, "login");
        ws.touch();
        Ok(LoginOutcome {
            token,
            device_approval_required: approval_required,
        })
    }

    pub fn issue_token(signing_key: &str, claims: &Claims) -> ServiceResult<String> {
        let header = TokenHeader {
            alg: TOKEN_ALGORITHM.into(),
            typ: "JWT".into(),
        };
        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{}.{}", header, payload);
        let signature = sign(signing_key, signing_input.as_bytes())?.finalize().into_bytes();
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Validates structure, signature, workspace, and expiry of a token.
    pub fn verify(ws: &Workspace, token: &str, clock: &dyn Clock) -> Result<Claims, AuthError> {
        let token = token.trim();
        let (signing_input, signature) = token.rsplit_once('.').ok_or(AuthError::MalformedToken)?;
        let (header, payload) = signing_input
            .split_once('.')
            .filter(|(_, payload)| !payload.contains('.'))
            .ok_or(AuthError::MalformedToken)?;
        let header: TokenHeader = decode_json(header)?;
        if header.alg != TOKEN_ALGORITHM {
            return Err(AuthError::MalformedToken);
        }
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::MalformedToken)?;
        sign(&ws.signing_key, signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;
        let claims: Claims = decode_json(payload)?;
        if claims.org != ws.id {
            return Err(AuthError::WrongWorkspace);
        }
        if clock.now().timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }
        debug!(user = %claims.sub, "token verified");
        Ok(claims)
    }

    /// Resolves a token into a session, enforcing account state and device approval.
    pub fn authenticate(
        ws: &Workspace,
        token: &str,
        policy: &AuthPolicy,
        clock: &dyn Clock,
    ) -> ServiceResult<Session> {
        let claims = Self::verify(ws, token, clock)?;
        let user = ws.user(claims.sub).ok_or(AuthError::InvalidCredentials)?;
        if !user.active {
            return Err(AuthError::Disabled.into());
        }
        if policy.require_device_approval && !user.has_device(&claims.device) {
            return Err(AuthError::DeviceNotApproved(claims.device).into());
        }
        Ok(Session {
            user_id: user.id,
            role_id: user.role_id,
            device_id: claims.device,
            expires_at: claims.exp,
        })
    }

    pub fn approve_device(
        ws: &mut Workspace,
        session: &Session,
        user_id: Uuid,
        device_id: &str,
        clock: &dyn Clock,
    ) -> ServiceResult<()> {
        AccessService::authorize(ws, session, Permission::ApproveDevices)?;
        let approval = ws
            .device_approvals
            .iter_mut()
            .find(|a| a.user_id == user_id && a.device_id == device_id && a.is_pending())
            .ok_or_else(|| CoreError::not_found("Device approval", device_id))?;
        approval.approved_at = Some(clock.now());
        let user = Self::user_mut(ws, user_id)?;
        user.approved_devices.insert(device_id.to_string());
        info!(user = %user_id, device = device_id, "device approved");
        ws.touch();
        Ok(())
    }

    pub fn pending_devices(ws: &Workspace) -> Vec<&DeviceApproval> {
        ws.device_approvals.iter().filter(|a| a.is_pending()).collect()
    }

    fn user_mut(ws: &mut Workspace, id: Uuid) -> ServiceResult<&mut User> {
        ws.users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or_else(|| CoreError::not_found("User", id))
    }
}

fn sign(key: &str, message: &[u8]) -> Result<HmacSha256, AuthError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| AuthError::BadSignature)?;
    mac.update(message);
    Ok(mac)
}

fn decode_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}

fn digest_password(salt: &str, password: &str, iterations: u32) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt.as_bytes())
            .finalize();
    }
    hex(&digest)
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{:02x}", byte);
        out
    })
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len() && left.iter().zip(right).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedClock;
    use chrono::NaiveDate;

    fn clock() -> FixedClock {
        FixedClock::on(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap())
    }

    fn workspace_with_admin() -> (Workspace, Uuid) {
        let mut ws = Workspace::new("Auth");
        let admin_role = ws.role_by_name(estate_domain::ADMIN_ROLE).unwrap().id;
        let id = AccessService::register_user(&mut ws, "Root", "root@example.com", "s3cret!", admin_role, &clock()).unwrap();
        (ws, id)
    }

    #[test]
    fn password_hash_is_salted() {
        let first = AuthService::hash_password("hunter2");
        let second = AuthService::hash_password("hunter2");
        assert_ne!(first.hash, second.hash);
        assert!(AuthService::verify_password(&first, "hunter2"));
        assert!(!AuthService::verify_password(&first, "hunter3"));
    }

    #[test]
    fn login_issues_verifiable_token() {
        let (mut ws, user) = workspace_with_admin();
        let policy = AuthPolicy::default();
        let outcome = AuthService::login(&mut ws, "ROOT@example.com", "s3cret!", "laptop", &policy, &clock()).unwrap();
        assert!(!outcome.device_approval_required);
        let session = AuthService::authenticate(&ws, &outcome.token, &policy, &clock()).unwrap();
        assert_eq!(session.user_id, user);

        let err = AuthService::login(&mut ws, "root@example.com", "nope", "laptop", &policy, &clock()).unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::InvalidCredentials)));
        let err = AuthService::login(&mut ws, "ghost@example.com", "s3cret!", "laptop", &policy, &clock()).unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::InvalidCredentials)));
    }

    #[test]
    fn tampered_expired_and_foreign_tokens_are_rejected() {
        let (mut ws, _) = workspace_with_admin();
        let policy = AuthPolicy::default();
        let token = AuthService::login(&mut ws, "root@example.com", "s3cret!", "laptop", &policy, &clock()).unwrap().token;

        assert_eq!(AuthService::verify(&ws, "not-a-token", &clock()), Err(AuthError::MalformedToken));
        let (head, rest) = token.split_once('.').unwrap();
        let (_, signature) = rest.split_once('.').unwrap();
        let mut claims = AuthService::verify(&ws, &token, &clock()).unwrap();
        claims.role = Uuid::new_v4();
        let forged = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let tampered = format!("{}.{}.{}", head, forged, signature);
        assert_eq!(AuthService::verify(&ws, &tampered, &clock()), Err(AuthError::BadSignature));

        let later = FixedClock(clock().0 + Duration::minutes(61));
        assert_eq!(AuthService::verify(&ws, &token, &later), Err(AuthError::Expired));

        let other = Workspace::new("Other");
        assert_eq!(AuthService::verify(&other, &token, &clock()), Err(AuthError::BadSignature));
    }

    #[test]
    fn new_device_needs_approval() {
        let (mut ws, user) = workspace_with_admin();
        let policy = AuthPolicy::default();
        let admin = AuthService::login(&mut ws, "root@example.com", "s3cret!", "laptop", &policy, &clock()).unwrap();
        let phone = AuthService::login(&mut ws, "root@example.com", "s3cret!", "phone", &policy, &clock()).unwrap();
        assert!(phone.device_approval_required);
        assert_eq!(AuthService::pending_devices(&ws).len(), 1);
        let err = AuthService::authenticate(&ws, &phone.token, &policy, &clock()).unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::DeviceNotApproved(_))));

        let session = AuthService::authenticate(&ws, &admin.token, &policy, &clock()).unwrap();
        AuthService::approve_device(&mut ws, &session, user, "phone", &clock()).unwrap();
        assert!(AuthService::authenticate(&ws, &phone.token, &policy, &clock()).is_ok());
        assert!(AuthService::pending_devices(&ws).is_empty());
    }
}
