// ── Printer wire protocol ──
//
// Topic layout, fixed credentials, and the request bodies the printer
// understands. Reports are parsed upstream in bambu-core; this module
// only knows how to address the printer and what to send it.

use serde::{Deserialize, Serialize};

/// TLS MQTT port exposed by the printer's local broker.
pub const MQTT_PORT: u16 = 8883;

/// Fixed username for LAN-mode access. The access code is the password.
pub const USERNAME: &str = "bblp";

/// Topic the printer publishes status reports on.
pub fn report_topic(serial: &str) -> String {
    format!("device/{serial}/report")
}

/// Topic the printer accepts requests on.
pub fn request_topic(serial: &str) -> String {
    format!("device/{serial}/request")
}

/// Client identifier for one connection attempt.
///
/// `BM_<last four of serial>_<four random digits>`. A fresh suffix per
/// attempt keeps a lingering session on the broker from kicking us off.
pub fn client_id(serial: &str) -> String {
    let tail_start = serial
        .char_indices()
        .rev()
        .nth(3)
        .map_or(0, |(idx, _)| idx);
    let suffix = 1000 + uuid::Uuid::new_v4().as_u128() % 9000;
    format!("BM_{}_{suffix}", &serial[tail_start..])
}

// ── Requests ─────────────────────────────────────────────────────────

/// Body of a request command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBody {
    pub sequence_id: String,
    pub command: String,
}

/// A request published on the request topic.
///
/// Serializes externally tagged, e.g.
/// `{"pushing":{"sequence_id":"0","command":"push_all"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    Pushing(CommandBody),
    Info(CommandBody),
}

impl Request {
    /// Ask the printer to publish its full state.
    pub fn push_all() -> Self {
        Self::Pushing(CommandBody {
            sequence_id: "0".into(),
            command: "push_all".into(),
        })
    }

    /// Ask the printer for its module and firmware versions.
    pub fn get_version() -> Self {
        Self::Info(CommandBody {
            sequence_id: "1".into(),
            command: "get_version".into(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
