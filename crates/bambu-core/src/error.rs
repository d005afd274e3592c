// ── Core error types ──
//
// User-facing errors from bambu-core. Consumers never see MQTT client
// errors directly; the `From<bambu_api::Error>` impl translates them.

use thiserror::Error;

/// A status report that could not be interpreted. Always recoverable:
/// the report is dropped and the previous state stands.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("report is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("report is not a JSON object (got {kind})")]
    NotAnObject { kind: &'static str },
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to printer at {host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("TLS setup failed: {message}")]
    Tls { message: String },

    #[error("Printer monitor has shut down")]
    SupervisorStopped,

    #[error("Timed out after {timeout_secs}s waiting for printer telemetry")]
    Timeout { timeout_secs: u64 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Request to printer failed: {message}")]
    RequestFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<bambu_api::Error> for CoreError {
    fn from(err: bambu_api::Error) -> Self {
        match err {
            bambu_api::Error::Tls(message) => CoreError::Tls { message },
            bambu_api::Error::Connect { host, port, reason } => CoreError::ConnectionFailed {
                host: format!("{host}:{port}"),
                reason,
            },
            bambu_api::Error::NotConnected => CoreError::RequestFailed {
                message: "printer is not connected".into(),
            },
            bambu_api::Error::Client(e) => CoreError::RequestFailed {
                message: e.to_string(),
            },
            bambu_api::Error::Serialization(e) => CoreError::Internal(e.to_string()),
            bambu_api::Error::Teardown { grace_ms } => {
                CoreError::Internal(format!("transport teardown exceeded {grace_ms}ms"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_errors_keep_their_message() {
        let err: CoreError = bambu_api::Error::Tls("bad pem".into()).into();
        assert!(matches!(err, CoreError::Tls { ref message } if message == "bad pem"));
    }

    #[test]
    fn connect_errors_carry_endpoint() {
        let err: CoreError = bambu_api::Error::Connect {
            host: "10.0.0.9".into(),
            port: 8883,
            reason: "refused".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Cannot connect to printer at 10.0.0.9:8883: refused"
        );
    }
}
