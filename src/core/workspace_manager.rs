use std::path::{Path, PathBuf};

use estate_core::{
    storage::{workspace_warnings, WorkspaceBackupInfo, WorkspaceStorage},
    CoreError,
};
use estate_domain::{Workspace, CURRENT_SCHEMA_VERSION};
use tracing::{info, warn};

use crate::errors::EstateError;

/// Metadata describing the outcome of a load operation.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub name: Option<String>,
    pub warnings: Vec<String>,
    pub schema_version: u8,
}

/// Facade that owns the open workspace and coordinates persistence and backups.
pub struct WorkspaceManager {
    current: Option<Workspace>,
    current_name: Option<String>,
    current_path: Option<PathBuf>,
    storage: Box<dyn WorkspaceStorage>,
}

impl WorkspaceManager {
    pub fn new(storage: Box<dyn WorkspaceStorage>) -> Self {
        Self {
            current: None,
            current_name: None,
            current_path: None,
            storage,
        }
    }

    pub fn storage(&self) -> &dyn WorkspaceStorage {
        self.storage.as_ref()
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Creates a fresh workspace and persists it under `name`.
    pub fn create(&mut self, name: &str) -> Result<(), EstateError> {
        if self.storage.list_workspaces()?.iter().any(|existing| existing == &slug(name)) {
            return Err(CoreError::Conflict(format!("workspace `{}` already exists", name)).into());
        }
        self.current = Some(Workspace::new(name));
        self.current_name = Some(name.to_string());
        self.current_path = None;
        self.save()?;
        info!(workspace = %name, "workspace created");
        Ok(())
    }

    pub fn load(&mut self, name: &str) -> Result<LoadReport, EstateError> {
        let ws = self.storage.load_workspace(name)?;
        self.apply_load(ws, Some(name.to_string()), None)
    }

    pub fn load_from_path(&mut self, path: &Path) -> Result<LoadReport, EstateError> {
        let ws = self.storage.load_workspace_from_path(path)?;
        self.apply_load(ws, None, Some(path.to_path_buf()))
    }

    /// Writes the open workspace back to wherever it came from.
    pub fn save(&mut self) -> Result<(), EstateError> {
        let ws = self.current.as_ref().ok_or(CoreError::WorkspaceNotLoaded)?;
        if let Some(name) = &self.current_name {
            self.storage.save_workspace(name, ws)?;
        } else if let Some(path) = &self.current_path {
            self.storage.save_workspace_to_path(ws, path)?;
        } else {
            return Err(EstateError::Persistence(
                "unable to determine save target for current workspace".into(),
            ));
        }
        Ok(())
    }

    pub fn save_as(&mut self, name: &str) -> Result<(), EstateError> {
        let ws = self.current.as_ref().ok_or(CoreError::WorkspaceNotLoaded)?;
        self.storage.save_workspace(name, ws)?;
        self.current_name = Some(name.to_string());
        self.current_path = None;
        Ok(())
    }

    pub fn save_to_path(&mut self, path: &Path) -> Result<(), EstateError> {
        let ws = self.current.as_ref().ok_or(CoreError::WorkspaceNotLoaded)?;
        self.storage.save_workspace_to_path(ws, path)?;
        self.current_path = Some(path.to_path_buf());
        self.current_name = None;
        Ok(())
    }

    pub fn close(&mut self) {
        self.current = None;
        self.current_name = None;
        self.current_path = None;
    }

    pub fn backup(&self, note: Option<&str>) -> Result<WorkspaceBackupInfo, EstateError> {
        let name = self.require_name()?;
        let ws = self.current.as_ref().ok_or(CoreError::WorkspaceNotLoaded)?;
        Ok(self.storage.backup_workspace(name, ws, note)?)
    }

    pub fn list_backups(&self) -> Result<Vec<WorkspaceBackupInfo>, EstateError> {
        Ok(self.storage.list_backups(self.require_name()?)?)
    }

    /// Restores a backup by list position (1-based) or file name and makes it current.
    pub fn restore(&mut self, reference: &str) -> Result<LoadReport, EstateError> {
        let backups = self.list_backups()?;
        let chosen = match reference.parse::<usize>() {
            Ok(index) if index >= 1 => backups.get(index - 1),
            _ => backups.iter().find(|info| info.id == reference),
        }
        .cloned()
        .ok_or_else(|| CoreError::not_found("Backup", reference))?;
        let ws = self.storage.restore_backup(&chosen)?;
        let name = self.current_name.clone();
        self.apply_load(ws, name, None)
    }

    pub fn with_current<T>(&self, f: impl FnOnce(&Workspace) -> T) -> Result<T, EstateError> {
        let ws = self.current.as_ref().ok_or(CoreError::WorkspaceNotLoaded)?;
        Ok(f(ws))
    }

    pub fn with_current_mut<T>(&mut self, f: impl FnOnce(&mut Workspace) -> T) -> Result<T, EstateError> {
        let ws = self.current.as_mut().ok_or(CoreError::WorkspaceNotLoaded)?;
        Ok(f(ws))
    }

    fn require_name(&self) -> Result<&str, EstateError> {
        self.current_name.as_deref().ok_or_else(|| {
            EstateError::Persistence("current workspace is not stored under a name".into())
        })
    }

    fn apply_load(
        &mut self,
        ws: Workspace,
        name: Option<String>,
        path: Option<PathBuf>,
    ) -> Result<LoadReport, EstateError> {
        if ws.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(EstateError::Persistence(format!(
                "workspace schema v{} is newer than supported v{}",
                ws.schema_version, CURRENT_SCHEMA_VERSION
            )));
        }
        let warnings = workspace_warnings(&ws);
        for warning in &warnings {
            warn!(workspace = %ws.name, "{}", warning);
        }
        let report = LoadReport {
            name: name.clone(),
            warnings,
            schema_version: ws.schema_version,
        };
        self.current = Some(ws);
        self.current_name = name;
        self.current_path = path;
        Ok(report)
    }
}

fn slug(name: &str) -> String {
    estate_storage_json::canonical_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use estate_storage_json::{JsonWorkspaceStorage, StoragePaths};
    use tempfile::tempdir;

    fn manager(dir: &Path) -> WorkspaceManager {
        let storage = JsonWorkspaceStorage::new(StoragePaths::under(dir)).expect("storage");
        WorkspaceManager::new(Box::new(storage))
    }

    #[test]
    fn create_save_and_reload() {
        let dir = tempdir().expect("tempdir");
        let mut manager = manager(dir.path());
        manager.create("Harbour").expect("create");
        assert!(manager.create("harbour").is_err());
        manager
            .with_current_mut(|ws| ws.base_currency = "EUR".into())
            .expect("open");
        manager.save().expect("save");

        manager.close();
        assert!(manager.with_current(|ws| ws.id).is_err());
        let report = manager.load("Harbour").expect("load");
        assert!(report.warnings.is_empty());
        assert_eq!(manager.with_current(|ws| ws.base_currency.clone()).unwrap(), "EUR");
    }

    #[test]
    fn restore_by_position() {
        let dir = tempdir().expect("tempdir");
        let mut manager = manager(dir.path());
        manager.create("Tower").expect("create");
        manager.backup(Some("baseline")).expect("backup");
        manager
            .with_current_mut(|ws| ws.base_currency = "GBP".into())
            .expect("open");
        manager.save().expect("save");

        let backups = manager.list_backups().expect("list");
        let position = backups
            .iter()
            .position(|info| info.id.ends_with("_baseline.json"))
            .expect("baseline listed");
        manager.restore(&(position + 1).to_string()).expect("restore");
        assert_eq!(manager.with_current(|ws| ws.base_currency.clone()).unwrap(), "USD");
        assert!(manager.restore("99").is_err());
    }
}
