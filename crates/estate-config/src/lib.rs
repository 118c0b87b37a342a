//! estate-config
//!
//! Operator preferences for the estate CLI plus their disk persistence.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::ConfigManager;
pub use model::{AuthSettings, Config, Theme};
