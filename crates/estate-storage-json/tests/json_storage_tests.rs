use std::fs;

use estate_core::storage::WorkspaceStorage;
use estate_domain::{PropertyKind, Workspace};
use estate_storage_json::{JsonWorkspaceStorage, StoragePaths};
use tempfile::tempdir;

fn storage_in(dir: &std::path::Path, retention: usize) -> (JsonWorkspaceStorage, StoragePaths) {
    let paths = StoragePaths::under(dir);
    let storage = JsonWorkspaceStorage::with_retention(paths.clone(), retention).expect("create storage");
    (storage, paths)
}

#[test]
fn saves_and_loads_a_workspace_by_name() {
    let dir = tempdir().expect("tempdir");
    let (storage, _) = storage_in(dir.path(), 5);
    let mut ws = Workspace::new("Harbour Estates");
    estate_core::PropertyService::add_property(&mut ws, "Quay", "QY", "", PropertyKind::Commercial)
        .expect("property");

    storage.save_workspace("Harbour Estates", &ws).expect("save");
    let loaded = storage.load_workspace("harbour estates").expect("load");

    assert_eq!(loaded.id, ws.id);
    assert_eq!(loaded.properties.len(), 1);
    assert_eq!(storage.list_workspaces().expect("list"), vec!["harbour_estates".to_string()]);
    let path = storage.workspace_path("Harbour Estates");
    assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("json"));
    assert!(!path.with_extension("json.tmp").exists());
}

#[test]
fn missing_workspace_is_reported_by_name() {
    let dir = tempdir().expect("tempdir");
    let (storage, _) = storage_in(dir.path(), 5);
    let err = storage.load_workspace("ghost").expect_err("missing");
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn overwriting_snapshots_the_previous_file() {
    let dir = tempdir().expect("tempdir");
    let (storage, paths) = storage_in(dir.path(), 5);
    let mut ws = Workspace::new("Tower");
    storage.save_workspace("tower", &ws).expect("first save");
    ws.base_currency = "EUR".into();
    storage.save_workspace("tower", &ws).expect("second save");

    let backups = storage.list_backups("tower").expect("backups");
    assert_eq!(backups.len(), 1);
    assert!(backups[0].path.starts_with(paths.backup_root.join("tower")));
    let snapshot = storage.load_workspace_from_path(&backups[0].path).expect("snapshot");
    assert_eq!(snapshot.base_currency, "USD");
}

#[test]
fn explicit_backups_restore_and_prune() {
    let dir = tempdir().expect("tempdir");
    let (storage, _) = storage_in(dir.path(), 2);
    let mut ws = Workspace::new("Tower");
    storage.save_workspace("tower", &ws).expect("save");

    let first = storage.backup_workspace("tower", &ws, Some("first")).expect("backup");
    ws.base_currency = "GBP".into();
    storage.backup_workspace("tower", &ws, Some("second")).expect("backup");
    storage.backup_workspace("tower", &ws, Some("third")).expect("backup");
    assert_eq!(storage.list_backups("tower").expect("list").len(), 2);

    let remaining = storage.list_backups("tower").expect("list");
    assert!(remaining.iter().all(|info| info.id != first.id));
    let newest = remaining.iter().find(|info| info.id.ends_with("_third.json")).expect("third");
    let restored = storage.restore_backup(newest).expect("restore");
    assert_eq!(restored.base_currency, "GBP");
    assert_eq!(storage.load_workspace("tower").expect("reload").base_currency, "GBP");
}

#[test]
fn metadata_summarises_each_workspace() {
    let dir = tempdir().expect("tempdir");
    let (storage, _) = storage_in(dir.path(), 5);
    storage.save_workspace("beta", &Workspace::new("Beta")).expect("save");
    storage.save_workspace("alpha", &Workspace::new("Alpha")).expect("save");
    fs::write(storage.workspace_path("broken"), "{ not json").expect("write");

    let rows = storage.list_workspace_metadata().expect("metadata");
    let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, ["Alpha", "Beta"]);
    assert_eq!(rows[0].voucher_count, 0);
}

#[test]
fn delete_removes_the_document() {
    let dir = tempdir().expect("tempdir");
    let (storage, _) = storage_in(dir.path(), 5);
    storage.save_workspace("gone", &Workspace::new("Gone")).expect("save");
    storage.delete_workspace("gone").expect("delete");
    assert!(!storage.exists("gone"));
    storage.delete_workspace("gone").expect("idempotent delete");
}
