pub mod workspace_manager;

pub use workspace_manager::{LoadReport, WorkspaceManager};
