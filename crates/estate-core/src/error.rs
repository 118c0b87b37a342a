use estate_domain::{AccountCategory, AccountSubtype, Side};
use thiserror::Error;
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Workspace not loaded")]
    WorkspaceNotLoaded,
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Voucher(#[from] VoucherError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        CoreError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serde(err.to_string())
    }
}

/// Reasons a voucher is refused by the posting engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VoucherError {
    #[error("a voucher needs at least two lines, got {0}")]
    TooFewLines(usize),
    #[error("line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },
    #[error("account {0} does not exist")]
    UnknownAccount(String),
    #[error("account {0} is inactive")]
    InactiveAccount(String),
    #[error("voucher is not balanced: debits {debit:.2} vs credits {credit:.2}")]
    Unbalanced { debit: f64, credit: f64 },
    #[error("{voucher_type} requires one {subtype} control leg")]
    MissingControlLeg {
        voucher_type: &'static str,
        subtype: AccountSubtype,
    },
    #[error("{voucher_type} allows a single control leg, found {count}")]
    MultipleControlLegs {
        voucher_type: &'static str,
        count: usize,
    },
    #[error("control account {account} must be on the {expected} side")]
    ControlSideMismatch { account: String, expected: Side },
    #[error("account {account} must be on the {expected} side for {voucher_type}")]
    UserSideMismatch {
        account: String,
        expected: Side,
        voucher_type: &'static str,
    },
    #[error("{category} account {account} is not allowed on a {voucher_type}")]
    CategoryNotAllowed {
        account: String,
        category: AccountCategory,
        voucher_type: &'static str,
    },
    #[error("cash or bank account {0} may only appear as a control leg")]
    CashOnUserLeg(String),
    #[error("voucher {0} is not a draft")]
    NotDraft(String),
    #[error("voucher {0} is not posted")]
    NotPosted(String),
    #[error("voucher {0} not found")]
    NotFound(Uuid),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("account is disabled")]
    Disabled,
    #[error("token is malformed")]
    MalformedToken,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token was issued for another workspace")]
    WrongWorkspace,
    #[error("device {0} is awaiting approval")]
    DeviceNotApproved(String),
    #[error("missing permission `{0}`")]
    Forbidden(String),
    #[error("invite is unknown")]
    UnknownInvite,
    #[error("invite has expired")]
    InviteExpired,
    #[error("invite was already used")]
    InviteUsed,
}
