//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use bambu_config::ConfigError;
use bambu_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to printer at {host}")]
    #[diagnostic(
        code(bambu::connection_failed),
        help(
            "Check that the printer is powered on, on the same network, and in LAN mode.\n\
             Host: {host}"
        )
    )]
    ConnectionFailed {
        host: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(
        code(bambu::tls_error),
        help(
            "Check the ca_cert path in your config, or remove it to accept the\n\
             printer's self-signed certificate."
        )
    )]
    TlsError { message: String },

    // ── Credentials ──────────────────────────────────────────────────
    #[error("No access code configured for printer '{serial}'")]
    #[diagnostic(
        code(bambu::no_credentials),
        help(
            "The access code is shown on the printer under Settings > Network.\n\
             Store it with: bambu config set-code\n\
             Or set the BAMBU_ACCESS_CODE environment variable."
        )
    )]
    NoCredentials { serial: String },

    #[error("Printer {field} is not configured")]
    #[diagnostic(
        code(bambu::no_config),
        help(
            "Create a config with: bambu config init\n\
             Or pass --ip and --serial.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { field: String, path: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("No report from the printer after {seconds}s (last status: {status})")]
    #[diagnostic(
        code(bambu::timeout),
        help(
            "A status of 'Error' usually means a wrong access code or IP.\n\
             Increase the wait with --wait, or check the printer's LAN mode."
        )
    )]
    Timeout { seconds: u64, status: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(bambu::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(bambu::config))]
    Config(Box<ConfigError>),

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(bambu::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(bambu::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(bambu::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::NoCredentials { .. } | Self::NoConfig { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { host, reason } => CliError::ConnectionFailed {
                host,
                source: reason.into(),
            },
            CoreError::Tls { message } => CliError::TlsError { message },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
                status: "unknown".into(),
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::SupervisorStopped => CliError::Internal("printer monitor stopped".into()),
            CoreError::RequestFailed { message } | CoreError::Internal(message) => {
                CliError::Internal(message)
            }
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { serial } => CliError::NoCredentials { serial },
            ConfigError::MissingPrinter { field } => CliError::NoConfig {
                field: field.into(),
                path: String::new(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}
