#![allow(clippy::unwrap_used)]
// File-backed config and credential store tests.

use std::time::Duration;

use bambu_config::{
    Config, CredentialStore, FileCredentialStore, SecretStorage, load_config_from, save_config_to,
    to_monitor_config,
};
use bambu_core::Credentials;
use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;
use tempfile::TempDir;

#[test]
fn missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();

    assert!(cfg.printer.ip.is_none());
    assert!(cfg.printer.insecure_trust_all_certificates);
    assert_eq!(cfg.monitor.refresh_interval_secs, 15);
}

#[test]
fn reads_hand_written_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[printer]
ip = "10.0.0.7"
serial = "00M09A350100123"
access_code = "87654321"

[monitor]
refresh_interval_secs = 5
fetch_version = false
"#,
    )
    .unwrap();

    let cfg = load_config_from(&path).unwrap();
    assert_eq!(cfg.printer.ip.as_deref(), Some("10.0.0.7"));
    assert_eq!(cfg.monitor.connect_timeout_secs, 10);

    let monitor = to_monitor_config(&cfg).unwrap();
    assert_eq!(monitor.refresh_interval, Duration::from_secs(5));
    assert!(!monitor.fetch_version);
}

#[test]
fn unconfigured_store_loads_none() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::new(dir.path().join("config.toml"), SecretStorage::Plaintext);
    assert!(store.load().unwrap().is_none());
}

#[test]
fn plaintext_store_round_trips_credentials() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let store = FileCredentialStore::new(&path, SecretStorage::Plaintext);

    let creds = Credentials::new("192.168.1.50", "12345678", "01S00A123456789");
    store.save(&creds).unwrap();

    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded, creds);
    assert_eq!(loaded.access_code.expose_secret(), "12345678");
}

#[test]
fn save_preserves_unrelated_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut cfg = Config::default();
    cfg.monitor.refresh_interval_secs = 60;
    cfg.monitor.fetch_version = false;
    save_config_to(&cfg, &path).unwrap();

    let store = FileCredentialStore::new(&path, SecretStorage::Plaintext);
    store
        .save(&Credentials::new("192.168.1.50", "12345678", "01S00A123456789"))
        .unwrap();

    let reloaded = load_config_from(&path).unwrap();
    assert_eq!(reloaded.monitor.refresh_interval_secs, 60);
    assert!(!reloaded.monitor.fetch_version);
    assert_eq!(reloaded.printer.serial.as_deref(), Some("01S00A123456789"));
}

#[test]
fn saved_file_is_readable_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    FileCredentialStore::new(&path, SecretStorage::Plaintext)
        .save(&Credentials::new("192.168.1.50", "12345678", "01S00A123456789"))
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[printer]"));
    assert!(text.contains(r#"ip = "192.168.1.50""#));
    assert!(text.contains("insecure_trust_all_certificates = true"));
}
