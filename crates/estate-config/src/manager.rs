use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::Utc;

use crate::{Config, ConfigError};

const CONFIG_FILE: &str = "config.json";
const BACKUP_PREFIX: &str = "config-";
const BACKUP_SUFFIX: &str = ".json";
/// Sorts lexicographically in time order.
const BACKUP_STAMP: &str = "%Y%m%dT%H%M%S";

/// Reads, writes and snapshots the operator [`Config`].
///
/// Every config that comes off disk, live or from a backup, is validated
/// with [`Config::validate`] before it is handed out.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    backups_dir: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf, backups_dir: PathBuf) -> Self {
        Self {
            config_path,
            backups_dir,
        }
    }

    /// `<base>/config/config.json` with snapshots in `<base>/config/backups`.
    pub fn with_base_dir(base: PathBuf) -> Result<Self, ConfigError> {
        let dir = base.join("config");
        fs::create_dir_all(&dir)?;
        Ok(Self::new(dir.join(CONFIG_FILE), dir.join("backups")))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// A missing file yields [`Config::default`].
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }
        read_config(&self.config_path)
    }

    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        config.validate()?;
        write_atomic(&self.config_path, &serde_json::to_string_pretty(config)?)
    }

    /// Snapshots `config` and prunes snapshots beyond its `backup_retention`.
    pub fn backup(&self, config: &Config, note: Option<&str>) -> Result<String, ConfigError> {
        let mut name = format!("{BACKUP_PREFIX}{}", Utc::now().format(BACKUP_STAMP));
        if let Some(slug) = note.map(slugify).filter(|slug| !slug.is_empty()) {
            name.push('-');
            name.push_str(&slug);
        }
        name.push_str(BACKUP_SUFFIX);

        write_atomic(&self.backups_dir.join(&name), &serde_json::to_string_pretty(config)?)?;
        for stale in self.list_backups()?.iter().skip(config.backup_retention.max(1)) {
            fs::remove_file(self.backups_dir.join(stale))?;
        }
        Ok(name)
    }

    /// Reads a snapshot; saving it as the live config is up to the caller.
    pub fn restore(&self, backup_name: &str) -> Result<Config, ConfigError> {
        let path = self.backups_dir.join(backup_name);
        if !is_backup_name(backup_name) || !path.is_file() {
            return Err(ConfigError::BackupNotFound(backup_name.to_string()));
        }
        read_config(&path)
    }

    /// Snapshot names, newest first.
    pub fn list_backups(&self) -> Result<Vec<String>, ConfigError> {
        if !self.backups_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            if let Some(name) = entry?.file_name().to_str().filter(|name| is_backup_name(name)) {
                names.push(name.to_string());
            }
        }
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }
}

fn is_backup_name(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_SUFFIX)
}

/// Lowercase ASCII words joined by `-`.
fn slugify(note: &str) -> String {
    note.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(&fs::read_to_string(path)?)?;
    config.validate()?;
    Ok(config)
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_become_slugs() {
        assert_eq!(slugify("  Before EUR switch!! "), "before-eur-switch");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn only_prefixed_json_files_count_as_backups() {
        assert!(is_backup_name("config-20240101T000000.json"));
        assert!(!is_backup_name("config.json"));
        assert!(!is_backup_name("config-20240101T000000.json.tmp"));
    }
}
