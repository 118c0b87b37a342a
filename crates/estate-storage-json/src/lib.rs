//! estate-storage-json
//!
//! Filesystem persistence for workspaces. Each workspace is one pretty-printed
//! JSON document; overwrites snapshot the previous file into a per-workspace
//! backup directory that is pruned to a fixed retention.

use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use estate_core::{
    storage::{WorkspaceBackupInfo, WorkspaceStorage},
    CoreError,
};
use estate_domain::{round_cents, Workspace};
use tracing::{debug, warn};

const FILE_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";
const TMP_SUFFIX: &str = "tmp";
pub const DEFAULT_RETENTION: usize = 5;

/// Directory roots used by [`JsonWorkspaceStorage`].
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub workspace_root: PathBuf,
    pub backup_root: PathBuf,
}

impl StoragePaths {
    /// `<base>/workspaces` and `<base>/backups`.
    pub fn under(base: &Path) -> Self {
        Self {
            workspace_root: base.join("workspaces"),
            backup_root: base.join("backups"),
        }
    }
}

/// Filesystem-backed JSON persistence for workspaces and their backups.
#[derive(Debug, Clone)]
pub struct JsonWorkspaceStorage {
    workspaces_dir: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
}

impl JsonWorkspaceStorage {
    pub fn new(paths: StoragePaths) -> Result<Self, CoreError> {
        Self::with_retention(paths, DEFAULT_RETENTION)
    }

    pub fn with_retention(paths: StoragePaths, retention: usize) -> Result<Self, CoreError> {
        fs::create_dir_all(&paths.workspace_root)?;
        fs::create_dir_all(&paths.backup_root)?;
        Ok(Self {
            workspaces_dir: paths.workspace_root,
            backups_dir: paths.backup_root,
            retention: retention.max(1),
        })
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn workspace_path(&self, name: &str) -> PathBuf {
        self.workspaces_dir
            .join(format!("{}.{}", canonical_name(name), FILE_EXTENSION))
    }

    pub fn backup_path(&self, name: &str, backup: &str) -> PathBuf {
        self.backup_dir(name).join(backup)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.workspace_path(name).exists()
    }

    /// Summary rows for every stored workspace, sorted by display name.
    pub fn list_workspace_metadata(&self) -> Result<Vec<WorkspaceMetadata>, CoreError> {
        let mut entries = Vec::new();
        for slug in self.list_workspaces()? {
            let ws = match self.load_workspace(&slug) {
                Ok(ws) => ws,
                Err(err) => {
                    warn!(workspace = %slug, error = %err, "skipping unreadable workspace");
                    continue;
                }
            };
            let receivables = ws.invoices.iter().map(|invoice| invoice.outstanding()).sum();
            entries.push(WorkspaceMetadata {
                path: self.workspace_path(&slug),
                slug,
                name: ws.name.clone(),
                created_at: ws.created_at,
                updated_at: ws.updated_at,
                property_count: ws.properties.len(),
                unit_count: ws.units.len(),
                voucher_count: ws.vouchers.len(),
                user_count: ws.users.len(),
                outstanding_receivables: round_cents(receivables),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub fn list_backup_metadata(&self, name: &str) -> Result<Vec<BackupMetadata>, CoreError> {
        let mut rows: Vec<BackupMetadata> = self
            .list_backups(name)?
            .into_iter()
            .map(|entry| BackupMetadata {
                created_at: parse_backup_timestamp(&entry.id),
                size_bytes: fs::metadata(&entry.path).map(|meta| meta.len()).unwrap_or(0),
                name: entry.id,
                path: entry.path,
            })
            .collect();
        rows.sort_by_key(|meta| Reverse(meta.created_at));
        Ok(rows)
    }

    pub fn delete_backup(&self, name: &str, backup_id: &str) -> Result<(), CoreError> {
        let path = self.backup_path(name, backup_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn backup_dir(&self, name: &str) -> PathBuf {
        self.backups_dir.join(canonical_name(name))
    }

    fn write_backup_file(
        &self,
        ws: &Workspace,
        name: &str,
        note: Option<&str>,
    ) -> Result<WorkspaceBackupInfo, CoreError> {
        let dir = self.backup_dir(name);
        fs::create_dir_all(&dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let mut stem = format!("{}_{}", canonical_name(name), timestamp);
        if let Some(label) = sanitize_backup_note(note) {
            stem.push('_');
            stem.push_str(&label);
        }
        let file_name = format!("{}.{}", stem, FILE_EXTENSION);
        let path = dir.join(&file_name);
        write_atomic(&path, &serialize_workspace(ws)?)?;
        debug!(workspace = %name, backup = %file_name, "backup written");
        self.prune_backups(name)?;
        Ok(WorkspaceBackupInfo {
            workspace: canonical_name(name),
            id: file_name,
            created_at: timestamp,
            path,
        })
    }

    fn backup_existing_file(&self, name: &str, path: &Path) -> Result<(), CoreError> {
        if !path.exists() {
            return Ok(());
        }
        let dir = self.backup_dir(name);
        fs::create_dir_all(&dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let file_name = format!("{}_{}.{}", canonical_name(name), timestamp, FILE_EXTENSION);
        fs::copy(path, dir.join(&file_name))?;
        self.prune_backups(name)?;
        Ok(())
    }

    fn prune_backups(&self, name: &str) -> Result<(), CoreError> {
        let entries = self.list_backups(name)?;
        for entry in entries.into_iter().skip(self.retention) {
            if let Err(err) = fs::remove_file(&entry.path) {
                warn!(backup = %entry.id, error = %err, "failed to prune backup");
            }
        }
        Ok(())
    }
}

impl WorkspaceStorage for JsonWorkspaceStorage {
    fn save_workspace(&self, name: &str, workspace: &Workspace) -> Result<(), CoreError> {
        let path = self.workspace_path(name);
        if path.exists() {
            self.backup_existing_file(name, &path)?;
        }
        save_workspace_to_path(workspace, &path)
    }

    fn load_workspace(&self, name: &str) -> Result<Workspace, CoreError> {
        let path = self.workspace_path(name);
        if !path.exists() {
            return Err(CoreError::WorkspaceNotFound(name.to_string()));
        }
        load_workspace_from_path(&path)
    }

    fn list_workspaces(&self) -> Result<Vec<String>, CoreError> {
        if !self.workspaces_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.workspaces_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete_workspace(&self, name: &str) -> Result<(), CoreError> {
        let path = self.workspace_path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn save_workspace_to_path(&self, workspace: &Workspace, path: &Path) -> Result<(), CoreError> {
        if path.starts_with(&self.workspaces_dir) {
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                self.backup_existing_file(stem, path)?;
            }
        }
        save_workspace_to_path(workspace, path)
    }

    fn load_workspace_from_path(&self, path: &Path) -> Result<Workspace, CoreError> {
        load_workspace_from_path(path)
    }

    fn backup_workspace(
        &self,
        name: &str,
        workspace: &Workspace,
        note: Option<&str>,
    ) -> Result<WorkspaceBackupInfo, CoreError> {
        self.write_backup_file(workspace, name, note)
    }

    fn list_backups(&self, name: &str) -> Result<Vec<WorkspaceBackupInfo>, CoreError> {
        let dir = self.backup_dir(name);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let slug = canonical_name(name);
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
                entries.push(WorkspaceBackupInfo {
                    workspace: slug.clone(),
                    id: file_name.to_string(),
                    created_at: parse_backup_timestamp(file_name)
                        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default(),
                    path: path.clone(),
                });
            }
        }
        entries.sort_by(|a, b| {
            parse_backup_timestamp(&b.id)
                .cmp(&parse_backup_timestamp(&a.id))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(entries)
    }

    fn restore_backup(&self, backup: &WorkspaceBackupInfo) -> Result<Workspace, CoreError> {
        if !backup.path.exists() {
            return Err(CoreError::Storage(format!("backup `{}` not found", backup.id)));
        }
        let restored = load_workspace_from_path(&backup.path)?;
        let target = self.workspace_path(&backup.workspace);
        if target.exists() {
            self.backup_existing_file(&backup.workspace, &target)?;
        }
        save_workspace_to_path(&restored, &target)?;
        Ok(restored)
    }
}

/// Saves a workspace to an arbitrary path, replacing the file atomically.
pub fn save_workspace_to_path(ws: &Workspace, path: &Path) -> Result<(), CoreError> {
    let tmp = tmp_path(path);
    write_atomic(&tmp, &serialize_workspace(ws)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Loads a workspace from the provided filesystem path.
pub fn load_workspace_from_path(path: &Path) -> Result<Workspace, CoreError> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|err| CoreError::Serde(err.to_string()))
}

#[derive(Debug, Clone)]
pub struct WorkspaceMetadata {
    pub slug: String,
    pub name: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub property_count: usize,
    pub unit_count: usize,
    pub voucher_count: usize,
    pub user_count: usize,
    pub outstanding_receivables: f64,
}

#[derive(Debug, Clone)]
pub struct BackupMetadata {
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
    pub path: PathBuf,
}

/// Lowercase slug used for file names; anything outside `[a-z0-9]` becomes `_`.
pub fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "workspace".into()
    } else {
        sanitized
    }
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if (ch.is_whitespace() || matches!(ch, '-' | '.' | '_'))
            && !sanitized.is_empty()
            && !last_dash
        {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reads `<slug>_<YYYYMMDD>_<HHMM>[_note].json`. The slug itself may contain
/// underscores, so the timestamp is located as the first digit pair that fits.
fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let trimmed = name.strip_suffix(&format!(".{}", FILE_EXTENSION))?;
    let segments: Vec<&str> = trimmed.split('_').collect();
    segments.windows(2).rev().find_map(|pair| {
        if !is_digits(pair[0], 8) || !is_digits(pair[1], 4) {
            return None;
        }
        NaiveDateTime::parse_from_str(&format!("{}{}", pair[0], pair[1]), "%Y%m%d%H%M")
            .ok()
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
    })
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

fn serialize_workspace(ws: &Workspace) -> Result<String, CoreError> {
    serde_json::to_string_pretty(ws).map_err(|err| CoreError::Serde(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_slugs_display_names() {
        assert_eq!(canonical_name("Harbour Estates"), "harbour_estates");
        assert_eq!(canonical_name("  ###  "), "workspace");
    }

    #[test]
    fn backup_notes_are_sanitized() {
        assert_eq!(sanitize_backup_note(Some("Before Q3 close!")), Some("before-q3-close".into()));
        assert_eq!(sanitize_backup_note(Some("   ")), None);
        assert_eq!(sanitize_backup_note(None), None);
    }

    #[test]
    fn backup_timestamps_survive_underscored_slugs() {
        let parsed = parse_backup_timestamp("harbour_estates_20250301_0930_pre-close.json")
            .expect("timestamp");
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2025-03-01 09:30");
        assert!(parse_backup_timestamp("harbour.json").is_none());
    }
}
