// ── Printer domain types ──
//
// `PrinterState` is an immutable snapshot. Every update produces a new
// value that replaces the previous one wholesale in the StateStore.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Status strings the monitor itself publishes. Device-reported codes
/// appear capitalized alongside these (e.g. `"Finish"`, `"Pause"`).
pub mod status {
    pub const CONNECTING: &str = "Connecting...";
    pub const CONNECTED: &str = "Connected";
    pub const RUNNING: &str = "Running";
    pub const IDLE: &str = "Idle";
    pub const DISCONNECTED: &str = "Disconnected";
    pub const ERROR: &str = "Error";
    pub const OFFLINE: &str = "Offline";
}

pub const UNKNOWN_DEVICE: &str = "Unknown";
pub const DEFAULT_FILAMENT_COLOR: &str = "#00E676";

// ── PrinterState ─────────────────────────────────────────────────────

/// Normalized view of one printer.
///
/// Numeric fields are only meaningful while a job is active; consumers
/// should branch on [`status_text`](Self::status_text) and
/// [`is_idle`](Self::is_idle) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterState {
    /// Job completion, 0–100.
    pub progress: u8,
    pub remaining_time_minutes: u32,
    pub status_text: String,
    /// Driven only by machine-state codes, never by connection status.
    pub is_idle: bool,
    /// Degrees Celsius.
    pub nozzle_temp: f64,
    /// Degrees Celsius.
    pub bed_temp: f64,
    pub device_name: String,
    pub filament_color: String,
    /// Time of the last report that carried a `print` object.
    pub last_update: Option<DateTime<Utc>>,
    /// Tray colors across all AMS units, in unit then tray order.
    #[serde(default)]
    pub ams_filaments: Vec<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

impl Default for PrinterState {
    fn default() -> Self {
        Self {
            progress: 0,
            remaining_time_minutes: 0,
            status_text: status::CONNECTING.into(),
            is_idle: true,
            nozzle_temp: 0.0,
            bed_temp: 0.0,
            device_name: UNKNOWN_DEVICE.into(),
            filament_color: DEFAULT_FILAMENT_COLOR.into(),
            last_update: None,
            ams_filaments: Vec::new(),
            firmware_version: None,
        }
    }
}

impl PrinterState {
    /// Copy of this state with a different status string.
    pub fn with_status(&self, status_text: &str) -> Self {
        Self {
            status_text: status_text.into(),
            ..self.clone()
        }
    }

    pub fn is_connecting(&self) -> bool {
        self.status_text == status::CONNECTING
    }

    pub fn has_telemetry(&self) -> bool {
        self.last_update.is_some()
    }
}

// ── GcodeState ───────────────────────────────────────────────────────

/// Machine-state codes reported in `print.gcode_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum GcodeState {
    Idle,
    Prepare,
    Running,
    Pause,
    Finish,
    Failed,
    Slicing,
    Init,
    Offline,
}

impl GcodeState {
    /// The idle flag this code implies, or `None` to leave it unchanged.
    pub fn idle_transition(self) -> Option<bool> {
        match self {
            Self::Running | Self::Prepare => Some(false),
            Self::Idle | Self::Finish => Some(true),
            _ => None,
        }
    }

    /// `Some(flag)` for a recognized code with a defined transition.
    pub fn idle_transition_for(code: &str) -> Option<bool> {
        code.parse::<Self>().ok().and_then(Self::idle_transition)
    }
}

/// `"FINISH"` → `"Finish"`.
pub fn capitalize_code(code: &str) -> String {
    let lower = code.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Credentials ──────────────────────────────────────────────────────

/// Everything needed to reach one printer. Any field change means a
/// full reconnect.
#[derive(Clone)]
pub struct Credentials {
    pub ip: String,
    pub access_code: SecretString,
    pub serial: String,
}

impl Credentials {
    pub fn new(
        ip: impl Into<String>,
        access_code: impl Into<String>,
        serial: impl Into<String>,
    ) -> Self {
        Self {
            ip: ip.into(),
            access_code: SecretString::from(access_code.into()),
            serial: serial.into(),
        }
    }

    /// All three fields are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.ip.trim().is_empty()
            && !self.access_code.expose_secret().is_empty()
            && !self.serial.trim().is_empty()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.ip == other.ip
            && self.serial == other.serial
            && self.access_code.expose_secret() == other.access_code.expose_secret()
    }
}

impl Eq for Credentials {}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ip", &self.ip)
            .field("access_code", &"[REDACTED]")
            .field("serial", &self.serial)
            .finish()
    }
}
