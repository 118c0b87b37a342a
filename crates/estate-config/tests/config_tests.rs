use estate_config::{Config, ConfigError, ConfigManager, Theme};
use tempfile::tempdir;

#[test]
fn missing_file_loads_defaults() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    let cfg = manager.load().expect("load");
    assert_eq!(cfg, Config::default());
    assert!(manager.config_path().ends_with("config/config.json"));
}

#[test]
fn config_manager_persists_and_loads_config() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::new(dir.path().join("config.json"), dir.path().join("backups"));

    let mut cfg = Config::default();
    cfg.set("currency", "gbp").expect("currency");
    cfg.set("theme", "plain").expect("theme");
    cfg.set("default_workspace", "harbour").expect("workspace");
    cfg.set("auth.require_device_approval", "off").expect("approval");

    manager.save(&cfg).expect("save config");
    let loaded = manager.load().expect("load config");

    assert_eq!(loaded.currency, "GBP");
    assert_eq!(loaded.theme, Theme::Plain);
    assert_eq!(loaded.default_workspace.as_deref(), Some("harbour"));
    assert!(!loaded.auth.require_device_approval);
}

#[test]
fn backups_restore_earlier_settings() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    let mut cfg = Config::default();
    let name = manager.backup(&cfg, Some("Before EUR switch")).expect("backup");
    assert!(name.starts_with("config-") && name.ends_with("-before-eur-switch.json"));

    cfg.set("currency", "EUR").expect("currency");
    manager.save(&cfg).expect("save");

    assert_eq!(manager.list_backups().expect("list"), vec![name.clone()]);
    let restored = manager.restore(&name).expect("restore");
    assert_eq!(restored.currency, "USD");
    assert!(matches!(
        manager.restore("config-missing.json"),
        Err(ConfigError::BackupNotFound(_))
    ));
}

#[test]
fn backups_are_pruned_to_retention() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");
    let mut cfg = Config::default();
    cfg.set("backup_retention", "2").expect("retention");
    for note in ["one", "two", "three"] {
        manager.backup(&cfg, Some(note)).expect("backup");
    }
    assert_eq!(manager.list_backups().expect("list").len(), 2);
}

#[test]
fn hand_edited_invalid_config_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::new(dir.path().join("config.json"), dir.path().join("backups"));
    manager.save(&Config::default()).expect("save");
    let text = std::fs::read_to_string(manager.config_path()).expect("read");
    std::fs::write(manager.config_path(), text.replace("\"USD\"", "\"DOLLARS\"")).expect("write");
    assert!(matches!(
        manager.load(),
        Err(ConfigError::InvalidValue { key, .. }) if key == "currency"
    ));
}
