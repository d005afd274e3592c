//! CLI configuration: thin wrapper around `bambu_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--config,
//! --ip, --serial, --access-code).

use std::path::PathBuf;

use bambu_config::{ConfigError, PrinterSection};
use bambu_core::{Credentials, MonitorConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use bambu_config::{Config, load_config_from, save_config_to};

/// `--config` / `BAMBU_CONFIG`, else the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(bambu_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config_from(&config_file(global))?)
}

/// Printer section with `--ip` / `--serial` applied.
fn printer_with_overrides(cfg: &Config, global: &GlobalOpts) -> PrinterSection {
    let mut printer = cfg.printer.clone();
    if let Some(ref ip) = global.ip {
        printer.ip = Some(ip.clone());
    }
    if let Some(ref serial) = global.serial {
        printer.serial = Some(serial.clone());
    }
    printer
}

/// Credentials from flags, env, keyring, and the config file.
pub fn resolve_credentials(cfg: &Config, global: &GlobalOpts) -> Result<Credentials, CliError> {
    let printer = printer_with_overrides(cfg, global);
    bambu_config::resolve_credentials(&printer, global.access_code.as_deref()).map_err(|e| match e {
        ConfigError::MissingPrinter { field } => CliError::NoConfig {
            field: field.into(),
            path: config_file(global).display().to_string(),
        },
        other => other.into(),
    })
}

pub fn monitor_config(cfg: &Config) -> Result<MonitorConfig, CliError> {
    Ok(bambu_config::to_monitor_config(cfg)?)
}

/// Config rendered as TOML with the access code masked.
pub fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let p = &cfg.printer;
    let m = &cfg.monitor;
    let mut out = String::new();

    let _ = writeln!(out, "[printer]");
    if let Some(ref ip) = p.ip {
        let _ = writeln!(out, "ip = \"{ip}\"");
    }
    if let Some(ref serial) = p.serial {
        let _ = writeln!(out, "serial = \"{serial}\"");
    }
    if p.access_code.is_some() {
        let _ = writeln!(out, "access_code = \"****\"");
    }
    if let Some(ref env) = p.access_code_env {
        let _ = writeln!(out, "access_code_env = \"{env}\"");
    }
    let _ = writeln!(
        out,
        "insecure_trust_all_certificates = {}",
        p.insecure_trust_all_certificates
    );
    if let Some(ref ca) = p.ca_cert {
        let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[monitor]");
    let _ = writeln!(out, "refresh_interval_secs = {}", m.refresh_interval_secs);
    let _ = writeln!(out, "connect_timeout_secs = {}", m.connect_timeout_secs);
    let _ = writeln!(out, "keep_alive_secs = {}", m.keep_alive_secs);
    let _ = write!(out, "fetch_version = {}", m.fetch_version);

    out
}

/// Config as serde data with the access code masked.
pub fn redacted(cfg: &Config) -> Config {
    let mut printer = cfg.printer.clone();
    if printer.access_code.is_some() {
        printer.access_code = Some("****".into());
    }
    Config {
        printer,
        monitor: cfg.monitor.clone(),
    }
}

