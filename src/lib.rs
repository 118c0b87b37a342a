#![doc(test(attr(deny(warnings))))]

//! Estate ERP: multi-tenant property management with a double-entry ledger.
//!
//! The domain model, services and storage live in the `estate-*` workspace
//! crates; this crate wires them into the `estate_cli` shell and CSV export.

pub mod cli;
pub mod core;
pub mod errors;
pub mod export;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Estate ERP tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }
}
