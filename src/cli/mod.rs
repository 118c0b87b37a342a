pub mod args;
pub mod commands;
pub mod context;
pub mod help;
pub mod lookup;
pub mod output;
mod shell;
pub mod table;

pub use shell::run_cli;
