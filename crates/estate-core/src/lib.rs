//! estate-core
//!
//! Business services for the estate ERP. Every operation works on a borrowed
//! `Workspace`; no terminal I/O and no direct storage interactions.

pub mod access_service;
pub mod auth_service;
pub mod crm_service;
pub mod error;
pub mod filter;
pub mod finance_service;
pub mod hr_service;
pub mod lease_service;
pub mod notification_service;
pub mod party_service;
pub mod portal_service;
pub mod property_service;
pub mod report_service;
pub mod storage;
pub mod support_service;
pub mod time;
pub mod voucher_service;

pub use access_service::*;
pub use auth_service::*;
pub use crm_service::*;
pub use error::{AuthError, CoreError, ServiceResult, VoucherError};
pub use filter::{FilterState, Filterable, Page, Sort, SortOrder, SortValue};
pub use finance_service::*;
pub use hr_service::*;
pub use lease_service::*;
pub use notification_service::*;
pub use party_service::*;
pub use portal_service::*;
pub use property_service::*;
pub use report_service::*;
pub use support_service::*;
pub use time::{Clock, FixedClock, SystemClock};
pub use voucher_service::*;

#[cfg(test)]
mod tests;
