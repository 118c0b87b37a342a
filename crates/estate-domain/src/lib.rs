//! estate-domain
//!
//! Pure domain models for the estate ERP (properties, leases, CRM, finance, HR, access).
//! No I/O, no CLI, no storage. Only data types, core enums, and the voucher posting rules.

pub mod access;
pub mod common;
pub mod crm;
pub mod finance;
pub mod hr;
pub mod lease;
pub mod notification;
pub mod party;
pub mod property;
pub mod support;
pub mod workspace;

pub use access::*;
pub use common::*;
pub use crm::*;
pub use finance::*;
pub use hr::*;
pub use lease::*;
pub use notification::*;
pub use party::*;
pub use property::*;
pub use support::*;
pub use workspace::*;
