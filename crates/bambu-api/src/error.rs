use thiserror::Error;

/// Top-level error type for the `bambu-api` crate.
///
/// Covers the transport's failure modes: building the TLS context,
/// opening the MQTT client, publish/subscribe requests, and teardown.
/// `bambu-core` maps these into session-level outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── TLS ─────────────────────────────────────────────────────────
    /// TLS context could not be built (bad CA file, protocol setup).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Connection ──────────────────────────────────────────────────
    /// The MQTT client could not be created or the broker refused us.
    #[error("Connection to {host}:{port} failed: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    /// A subscribe or publish request could not be queued.
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// The transport is not connected, so the request was not sent.
    #[error("Transport not connected")]
    NotConnected,

    // ── Teardown ────────────────────────────────────────────────────
    /// The transport did not shut down within its grace period.
    #[error("Transport teardown exceeded {grace_ms}ms grace period")]
    Teardown { grace_ms: u64 },

    // ── Data ────────────────────────────────────────────────────────
    /// A request body failed to serialize.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if retrying the same operation later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Client(_) | Self::NotConnected
        )
    }

    /// Returns `true` for teardown problems, which callers may ignore.
    pub fn is_teardown(&self) -> bool {
        matches!(self, Self::Teardown { .. })
    }
}
