//! Config subcommand handlers.

use bambu_config::{CredentialStore, FileCredentialStore, SecretStorage};
use bambu_core::Credentials;
use dialoguer::{Input, Select};
use secrecy::{ExposeSecret, SecretString};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Text prompt seeded with `current`, rejecting blank input.
fn prompt_field(prompt: &str, current: Option<&str>) -> Result<String, CliError> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(current) = current {
        input = input.default(current.to_owned());
    }
    let value = input.interact_text().map_err(prompt_err)?;
    Ok(value.trim().to_owned())
}

/// `--access-code` if given, else a hidden prompt.
fn access_code(global: &GlobalOpts) -> Result<SecretString, CliError> {
    let code = match global.access_code {
        Some(ref code) => code.clone(),
        None => rpassword::prompt_password("Access code: ").map_err(prompt_err)?,
    };
    if code.trim().is_empty() {
        return Err(CliError::Validation {
            field: "access_code".into(),
            reason: "access code cannot be empty".into(),
        });
    }
    Ok(SecretString::from(code.trim().to_owned()))
}

fn prompt_storage() -> Result<SecretStorage, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the access code?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    Ok(if selection == 0 {
        SecretStorage::Keyring
    } else {
        SecretStorage::Plaintext
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_file(global);

    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let existing = config::load_config_from(&path)?;
            eprintln!("Bambu printer monitor: configuration wizard");
            eprintln!("   Config path: {}\n", path.display());

            let ip = prompt_field(
                "Printer IP address",
                global.ip.as_deref().or(existing.printer.ip.as_deref()),
            )?;
            let serial = prompt_field(
                "Serial number",
                global.serial.as_deref().or(existing.printer.serial.as_deref()),
            )?;
            let code = access_code(global)?;
            let credentials = Credentials {
                ip,
                access_code: code,
                serial,
            };
            if !credentials.is_complete() {
                return Err(CliError::Validation {
                    field: "printer".into(),
                    reason: "IP address and serial number cannot be empty".into(),
                });
            }

            let storage = prompt_storage()?;
            FileCredentialStore::new(&path, storage).save(&credentials)?;

            if storage == SecretStorage::Keyring {
                eprintln!("   \u{2713} Access code stored in system keyring");
            }
            eprintln!("\n\u{2713} Config saved to {}", path.display());
            eprintln!("   Try: bambu status");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let out = output::render_single(
                global.output,
                &config::redacted(&cfg),
                config::format_config_redacted,
                config::format_config_redacted,
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        // ── SetCode ─────────────────────────────────────────────────
        ConfigCommand::SetCode { plaintext } => {
            let mut cfg = config::load(global)?;
            let serial = global
                .serial
                .clone()
                .or_else(|| cfg.printer.serial.clone())
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| CliError::NoConfig {
                    field: "serial".into(),
                    path: path.display().to_string(),
                })?;
            let code = access_code(global)?;

            store_code(&mut cfg, &serial, &code, plaintext)?;
            cfg.printer.serial = Some(serial);
            config::save_config_to(&cfg, &path)?;

            if !global.quiet {
                let place = if plaintext { "config file" } else { "system keyring" };
                eprintln!("\u{2713} Access code saved to {place}");
            }
            Ok(())
        }
    }
}

fn store_code(
    cfg: &mut Config,
    serial: &str,
    code: &SecretString,
    plaintext: bool,
) -> Result<(), CliError> {
    if plaintext {
        cfg.printer.access_code = Some(code.expose_secret().to_owned());
    } else {
        bambu_config::store_access_code_in_keyring(serial, code)?;
        cfg.printer.access_code = None;
    }
    Ok(())
}
