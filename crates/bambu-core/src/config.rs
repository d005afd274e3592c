// ── Runtime monitor configuration ──
//
// These types describe *how* to talk to a printer: TLS policy, timing,
// and transport tuning. They never touch disk. The CLI builds a
// `MonitorConfig` (usually via bambu-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use bambu_api::{ReconnectConfig, TlsMode};

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Trust any certificate. Printers ship self-signed certs, so this is
    /// the default (`insecure_trust_all_certificates`).
    #[default]
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub(crate) fn to_transport(&self) -> TlsMode {
        match self {
            Self::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Tuning for one printer monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub tls: TlsVerification,
    /// Broker port. 8883 on every current printer.
    pub port: u16,
    /// Transport connection timeout.
    pub connect_timeout: Duration,
    /// MQTT keep-alive interval.
    pub keep_alive: Duration,
    /// How often to ask the printer for a full status push. Zero disables.
    pub refresh_interval: Duration,
    /// Grace period for closing a superseded transport.
    pub reconnect_grace: Duration,
    /// Grace period for closing the transport on shutdown.
    pub shutdown_grace: Duration,
    /// Backoff between transport-level reconnect attempts.
    pub reconnect: ReconnectConfig,
    /// Capacity of the transport → worker event queue.
    pub event_capacity: usize,
    /// Also send `get_version` with every refresh.
    pub fetch_version: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tls: TlsVerification::default(),
            port: bambu_api::wire::MQTT_PORT,
            connect_timeout: Duration::from_secs(10),
            keep_alive: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(15),
            reconnect_grace: Duration::from_millis(200),
            shutdown_grace: Duration::from_millis(500),
            reconnect: ReconnectConfig::default(),
            event_capacity: 64,
            fetch_version: true,
        }
    }
}
