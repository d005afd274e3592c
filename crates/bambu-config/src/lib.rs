//! Shared configuration for Bambu Lab monitor tools.
//!
//! TOML config file, access-code resolution (flag + env + keyring +
//! plaintext), and translation to `bambu_core::MonitorConfig`. The CLI
//! layers its flag overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bambu_core::{Credentials, MonitorConfig, TlsVerification};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Keyring service name for stored access codes.
pub const KEYRING_SERVICE: &str = "bambu";

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "BAMBU_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("printer {field} is not configured")]
    MissingPrinter { field: &'static str },

    #[error("no access code configured for printer '{serial}'")]
    NoCredentials { serial: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub printer: PrinterSection,

    /// Connection tuning.
    #[serde(default)]
    pub monitor: MonitorSection,
}

/// The printer to monitor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrinterSection {
    /// LAN address, e.g. "192.168.1.50".
    pub ip: Option<String>,

    /// Printer serial number.
    pub serial: Option<String>,

    /// LAN access code (plaintext; prefer keyring or env var).
    pub access_code: Option<String>,

    /// Environment variable name containing the access code.
    pub access_code_env: Option<String>,

    /// Printers ship self-signed certificates, so verification is off
    /// unless `ca_cert` is given.
    #[serde(default = "default_true")]
    pub insecure_trust_all_certificates: bool,

    /// PEM file to verify the printer certificate against.
    pub ca_cert: Option<PathBuf>,
}

impl Default for PrinterSection {
    fn default() -> Self {
        Self {
            ip: None,
            serial: None,
            access_code: None,
            access_code_env: None,
            insecure_trust_all_certificates: true,
            ca_cert: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorSection {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Ask for the firmware version alongside each status push.
    #[serde(default = "default_true")]
    pub fetch_version: bool,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            connect_timeout_secs: default_connect_timeout(),
            keep_alive_secs: default_keep_alive(),
            fetch_version: true,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_refresh_interval() -> u64 {
    15
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_keep_alive() -> u64 {
    30
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `BAMBU_CONFIG`, then platform
/// conventions.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    ProjectDirs::from("com", "bambu", "bambu").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("bambu");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from `path` layered under `BAMBU_`-prefixed env vars
/// (`BAMBU_PRINTER__IP`, `BAMBU_MONITOR__FETCH_VERSION`, ...). A missing
/// file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BAMBU_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config from the canonical path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Access code resolution ──────────────────────────────────────────

fn keyring_entry(serial: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{serial}/access-code"))
}

fn keyring_lookup(serial: &str) -> Option<String> {
    keyring_entry(serial).ok()?.get_password().ok()
}

/// Resolve the access code.
///
/// Order: explicit `flag` (`--access-code` / `BAMBU_ACCESS_CODE`), the
/// env var named by `access_code_env`, the system keyring, plaintext.
pub fn resolve_access_code(
    printer: &PrinterSection,
    flag: Option<&str>,
) -> Result<SecretString, ConfigError> {
    resolve_access_code_with(printer, flag, |name| std::env::var(name).ok(), keyring_lookup)
}

/// [`resolve_access_code`] with injectable env and keyring lookups.
pub fn resolve_access_code_with(
    printer: &PrinterSection,
    flag: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. CLI flag
    if let Some(code) = flag.filter(|c| !c.is_empty()) {
        return Ok(SecretString::from(code.to_owned()));
    }

    // 2. Named env var
    if let Some(ref env_name) = printer.access_code_env {
        if let Some(code) = env(env_name).filter(|c| !c.is_empty()) {
            return Ok(SecretString::from(code));
        }
        debug!(env = %env_name, "access code env var unset");
    }

    let serial = printer.serial.clone().unwrap_or_default();

    // 3. System keyring
    if !serial.is_empty() {
        if let Some(code) = keyring(&serial) {
            return Ok(SecretString::from(code));
        }
    }

    // 4. Plaintext in config
    if let Some(ref code) = printer.access_code {
        if !code.is_empty() {
            return Ok(SecretString::from(code.clone()));
        }
    }

    Err(ConfigError::NoCredentials { serial })
}

/// Build `Credentials` from the printer section.
pub fn resolve_credentials(
    printer: &PrinterSection,
    access_code_flag: Option<&str>,
) -> Result<Credentials, ConfigError> {
    let ip = required(printer.ip.as_deref(), "ip")?;
    let serial = required(printer.serial.as_deref(), "serial")?;
    let code = resolve_access_code(printer, access_code_flag)?;
    Ok(Credentials::new(ip, code.expose_secret(), serial))
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ConfigError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingPrinter { field })
}

/// Store the access code in the system keyring.
pub fn store_access_code_in_keyring(serial: &str, code: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(serial)?.set_password(code.expose_secret())?;
    Ok(())
}

// ── Monitor config translation ──────────────────────────────────────

/// Build a `MonitorConfig` from the file, no CLI overrides.
pub fn to_monitor_config(cfg: &Config) -> Result<MonitorConfig, ConfigError> {
    let tls = if let Some(ref ca_path) = cfg.printer.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else if cfg.printer.insecure_trust_all_certificates {
        TlsVerification::DangerAcceptInvalid
    } else {
        return Err(ConfigError::Validation {
            field: "printer.ca_cert".into(),
            reason: "required when insecure_trust_all_certificates = false".into(),
        });
    };

    if cfg.monitor.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            field: "monitor.connect_timeout_secs".into(),
            reason: "must be at least 1".into(),
        });
    }

    Ok(MonitorConfig {
        tls,
        connect_timeout: Duration::from_secs(cfg.monitor.connect_timeout_secs),
        keep_alive: Duration::from_secs(cfg.monitor.keep_alive_secs),
        refresh_interval: Duration::from_secs(cfg.monitor.refresh_interval_secs),
        fetch_version: cfg.monitor.fetch_version,
        ..MonitorConfig::default()
    })
}

// ── CredentialStore ─────────────────────────────────────────────────

/// Persistent home for the printer credentials.
pub trait CredentialStore {
    /// `Ok(None)` when no printer is configured yet.
    fn load(&self) -> Result<Option<Credentials>, ConfigError>;

    fn save(&self, credentials: &Credentials) -> Result<(), ConfigError>;
}

/// Where [`FileCredentialStore`] keeps the access code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretStorage {
    /// System keyring; the file never holds the code.
    #[default]
    Keyring,
    /// Plaintext `access_code` in the config file.
    Plaintext,
}

/// Credentials in the TOML config file, with the access code in the
/// keyring or inline.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    storage: SecretStorage,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>, storage: SecretStorage) -> Self {
        Self {
            path: path.into(),
            storage,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credentials>, ConfigError> {
        let cfg = load_config_from(&self.path)?;
        match resolve_credentials(&cfg.printer, None) {
            Ok(credentials) => Ok(Some(credentials)),
            Err(ConfigError::MissingPrinter { field }) => {
                debug!(field, path = %self.path.display(), "printer not configured");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<(), ConfigError> {
        let mut cfg = load_config_from(&self.path)?;
        cfg.printer.ip = Some(credentials.ip.clone());
        cfg.printer.serial = Some(credentials.serial.clone());

        match self.storage {
            SecretStorage::Keyring => {
                store_access_code_in_keyring(&credentials.serial, &credentials.access_code)?;
                if cfg.printer.access_code.take().is_some() {
                    warn!("removed plaintext access code from config file");
                }
            }
            SecretStorage::Plaintext => {
                cfg.printer.access_code = Some(credentials.access_code.expose_secret().to_owned());
            }
        }

        save_config_to(&cfg, &self.path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn printer() -> PrinterSection {
        PrinterSection {
            ip: Some("192.168.1.50".into()),
            serial: Some("01S00A123456789".into()),
            access_code: Some("plain".into()),
            access_code_env: Some("PRINTER_CODE".into()),
            ..PrinterSection::default()
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn flag_beats_everything() {
        let code = resolve_access_code_with(
            &printer(),
            Some("flag"),
            |_| Some("env".into()),
            |_| Some("keyring".into()),
        )
        .unwrap();
        assert_eq!(code.expose_secret(), "flag");
    }

    #[test]
    fn env_beats_keyring_and_plaintext() {
        let code = resolve_access_code_with(
            &printer(),
            None,
            |name| (name == "PRINTER_CODE").then(|| "env".into()),
            |_| Some("keyring".into()),
        )
        .unwrap();
        assert_eq!(code.expose_secret(), "env");
    }

    #[test]
    fn keyring_is_keyed_by_serial() {
        let code = resolve_access_code_with(&printer(), None, no_env, |serial| {
            (serial == "01S00A123456789").then(|| "keyring".into())
        })
        .unwrap();
        assert_eq!(code.expose_secret(), "keyring");
    }

    #[test]
    fn plaintext_is_last_resort() {
        let code = resolve_access_code_with(&printer(), None, no_env, no_env).unwrap();
        assert_eq!(code.expose_secret(), "plain");
    }

    #[test]
    fn empty_chain_reports_serial() {
        let section = PrinterSection {
            access_code: None,
            ..printer()
        };
        let err = resolve_access_code_with(&section, Some(""), no_env, no_env).unwrap_err();
        assert!(
            matches!(err, ConfigError::NoCredentials { ref serial } if serial == "01S00A123456789")
        );
    }

    #[test]
    fn default_tls_trusts_all() {
        let monitor = to_monitor_config(&Config::default()).unwrap();
        assert_eq!(monitor.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(monitor.refresh_interval, Duration::from_secs(15));
        assert!(monitor.fetch_version);
    }

    #[test]
    fn ca_cert_switches_to_verified_tls() {
        let mut cfg = Config::default();
        cfg.printer.ca_cert = Some(PathBuf::from("/etc/bambu/ca.pem"));
        let monitor = to_monitor_config(&cfg).unwrap();
        assert_eq!(
            monitor.tls,
            TlsVerification::CustomCa(PathBuf::from("/etc/bambu/ca.pem"))
        );
    }

    #[test]
    fn verification_without_ca_is_rejected() {
        let mut cfg = Config::default();
        cfg.printer.insecure_trust_all_certificates = false;
        let err = to_monitor_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "printer.ca_cert"));
    }
}
