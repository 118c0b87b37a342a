use std::{env, path::PathBuf};

use estate_config::Config;
use estate_storage_json::StoragePaths;

pub const HOME_ENV: &str = "ESTATE_HOME";

/// Base directory holding configuration and, unless overridden, workspace data.
///
/// `ESTATE_HOME` wins; otherwise `~/.estate`.
pub fn app_home() -> PathBuf {
    match env::var_os(HOME_ENV) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".estate"),
    }
}

/// Workspace and backup directories for the given configuration.
pub fn storage_paths(config: &Config) -> StoragePaths {
    let root = config.data_root.clone().unwrap_or_else(app_home);
    StoragePaths::under(&root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_data_root_overrides_home() {
        let mut config = Config::default();
        config.data_root = Some(PathBuf::from("/srv/estate"));
        let paths = storage_paths(&config);
        assert_eq!(paths.workspace_root, PathBuf::from("/srv/estate/workspaces"));
        assert_eq!(paths.backup_root, PathBuf::from("/srv/estate/backups"));
    }
}
