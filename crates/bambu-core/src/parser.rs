// ── Status report parsing ──
//
// Pure function from (raw report, previous state) to the next state.
// Reports are sparse: the printer sends only what changed, so every
// field not present in the payload carries over from `previous`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::PayloadError;
use crate::model::{GcodeState, PrinterState, capitalize_code};

/// Merge one report into `previous`.
///
/// `last_update` is stamped with `now` only when the report carries a
/// `print` object.
pub fn parse_report(
    payload: &[u8],
    previous: &PrinterState,
    now: DateTime<Utc>,
) -> Result<PrinterState, PayloadError> {
    let root = match serde_json::from_slice::<Value>(payload)? {
        Value::Object(map) => map,
        other => {
            return Err(PayloadError::NotAnObject {
                kind: json_kind(&other),
            });
        }
    };

    let mut next = previous.clone();

    if let Some(name) = device_name(&root) {
        next.device_name = name.to_owned();
    }

    if let Some(print) = root.get("print").and_then(Value::as_object) {
        apply_print(&mut next, print);
        next.last_update = Some(now);
    }

    if let Some(version) = firmware_version(&root) {
        next.firmware_version = Some(version.to_owned());
    }

    Ok(next)
}

// ── Device name ──────────────────────────────────────────────────────

/// Top-level `dev_name`, else the first nested object (in sorted key
/// order) with a non-empty `dev_name` or `name`.
fn device_name(root: &Map<String, Value>) -> Option<&str> {
    if let Some(name) = non_empty_str(root.get("dev_name")) {
        return Some(name);
    }

    let mut keys: Vec<&String> = root.keys().collect();
    keys.sort();

    keys.into_iter()
        .filter_map(|key| root.get(key).and_then(Value::as_object))
        .find_map(|obj| non_empty_str(obj.get("dev_name")).or_else(|| non_empty_str(obj.get("name"))))
}

// ── Print object ─────────────────────────────────────────────────────

fn apply_print(state: &mut PrinterState, print: &Map<String, Value>) {
    let code = print
        .get("gcode_state")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if !code.is_empty() {
        if let Some(idle) = GcodeState::idle_transition_for(code) {
            state.is_idle = idle;
        }
        state.status_text = capitalize_code(code);
    }

    if let Some(percent) = lenient_f64(print.get("mc_percent")) {
        state.progress = clamp_percent(percent);
    }
    if let Some(minutes) = lenient_f64(print.get("mc_remaining_time")) {
        state.remaining_time_minutes = clamp_to_u32(minutes);
    }
    if let Some(temp) = lenient_f64(print.get("nozzle_temper")) {
        state.nozzle_temp = temp;
    }
    if let Some(temp) = lenient_f64(print.get("bed_temper")) {
        state.bed_temp = temp;
    }
    if let Some(color) = non_empty_str(print.get("filament_color")) {
        state.filament_color = color.to_owned();
    }
    if let Some(trays) = ams_tray_colors(print) {
        state.ams_filaments = trays;
    }
}

/// `print.ams.ams[*].tray[*].tray_color`, prefixed with `#`.
///
/// Returns `None` when the report has no AMS unit list, so a partial
/// report does not wipe known trays. Empty trays report no color and
/// are skipped.
fn ams_tray_colors(print: &Map<String, Value>) -> Option<Vec<String>> {
    let units = print.get("ams")?.get("ams")?.as_array()?;

    let colors = units
        .iter()
        .filter_map(|unit| unit.get("tray").and_then(Value::as_array))
        .flatten()
        .filter_map(|tray| non_empty_str(tray.get("tray_color")))
        .map(|color| {
            if color.starts_with('#') {
                color.to_owned()
            } else {
                format!("#{color}")
            }
        })
        .collect();

    Some(colors)
}

// ── Firmware version ─────────────────────────────────────────────────

/// `sw_ver` of the `ota` module from a `get_version` answer.
fn firmware_version(root: &Map<String, Value>) -> Option<&str> {
    let info = root.get("info")?.as_object()?;
    if info.get("command").and_then(Value::as_str) != Some("get_version") {
        return None;
    }

    info.get("module")?
        .as_array()?
        .iter()
        .find(|module| module.get("name").and_then(Value::as_str) == Some("ota"))
        .and_then(|module| non_empty_str(module.get("sw_ver")))
}

// ── Value helpers ────────────────────────────────────────────────────

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Numbers arrive as JSON numbers or as numeric strings depending on
/// firmware.
fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn clamp_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn clamp_to_u32(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ────────────────────────────────────────────────────────────
