// ── Presentation adapter ──
//
// Formatting helpers that turn a PrinterState into display strings, plus
// a thin adapter that maps UI lifecycle events onto supervisor requests.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local, TimeDelta, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{Credentials, PrinterState, status};
use crate::store::StateStore;
use crate::supervisor::{RequestOutcome, Supervisor};

/// Placeholder for fields that have no value while idle.
pub const PLACEHOLDER: &str = "--";

// ── Colors ───────────────────────────────────────────────────────────

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_hex()
    }
}

/// Fallback when the printer reports no usable filament color.
pub const ACCENT: Rgb = Rgb::new(0x00, 0xE6, 0x76);

/// Parse `RRGGBB` or `RRGGBBAA`, with or without a leading `#`. Alpha is
/// ignored.
pub fn parse_color(hex: &str) -> Option<Rgb> {
    let digits = hex.trim().trim_start_matches('#');
    if !matches!(digits.len(), 6 | 8) || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |at: usize| u8::from_str_radix(&digits[at..at + 2], 16).ok();
    Some(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
}

// ── Text helpers ─────────────────────────────────────────────────────

/// `125` → `"2h 5m"`, `45` → `"45m"`.
pub fn format_remaining(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}

/// Wall-clock time `minutes` from `now`, 12-hour `h:mm` without a meridiem.
pub fn finish_time(minutes: u32, now: DateTime<Local>) -> String {
    let finish = now + TimeDelta::minutes(i64::from(minutes));
    finish.format("%-I:%M").to_string()
}

pub fn format_last_update(last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = last_update else {
        return "Never".into();
    };
    let elapsed = now.signed_duration_since(at);
    if elapsed.num_seconds() < 60 {
        "Just now".into()
    } else {
        format!("{}m ago", elapsed.num_minutes())
    }
}

/// Whole degrees, truncated.
pub fn format_temperature(celsius: f64) -> String {
    format!("{}\u{00B0}C", celsius.trunc())
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Normal,
    Pending,
    Alert,
}

pub fn status_tone(status_text: &str) -> StatusTone {
    if status_text.contains("Error") || status_text == status::OFFLINE {
        StatusTone::Alert
    } else if status_text.contains("Connecting") {
        StatusTone::Pending
    } else {
        StatusTone::Normal
    }
}

pub fn connection_badge(status_text: &str) -> &'static str {
    if status_text.contains("Connecting") {
        "Connecting"
    } else if status_text.contains("Error")
        || status_text == status::DISCONNECTED
        || status_text == status::OFFLINE
    {
        "Offline"
    } else {
        "Connected"
    }
}

// ── Dial ─────────────────────────────────────────────────────────────

/// What the progress dial shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dial {
    Spinner,
    Idle,
    Progress { percent: u8, color: Rgb },
}

pub fn dial(state: &PrinterState) -> Dial {
    if state.status_text.contains("Connecting") {
        Dial::Spinner
    } else if state.is_idle {
        Dial::Idle
    } else {
        Dial::Progress {
            percent: state.progress,
            color: parse_color(&state.filament_color).unwrap_or(ACCENT),
        }
    }
}

/// AMS tray colors, unparseable entries shown in the accent color.
pub fn ams_swatches(state: &PrinterState) -> Vec<Rgb> {
    state
        .ams_filaments
        .iter()
        .map(|hex| parse_color(hex).unwrap_or(ACCENT))
        .collect()
}

// ── Notification & widget ───────────────────────────────────────────

/// Content of the ongoing status notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub text: String,
    /// 0–100; always 0 while idle.
    pub progress: u8,
    pub indeterminate: bool,
}

pub fn notification(state: &PrinterState) -> Notification {
    let (title, text, progress) = if state.is_idle {
        ("Printer idle".to_string(), "Um... Nothings printing?".to_string(), 0)
    } else {
        (
            format!("Printing {}%", state.progress),
            format!("Remaining: {}", format_remaining(state.remaining_time_minutes)),
            state.progress,
        )
    };
    Notification {
        title,
        text,
        progress,
        indeterminate: state.status_text.contains("Connecting"),
    }
}

/// `(headline, remaining)` for a home-screen widget.
pub fn widget_summary(state: &PrinterState) -> (String, String) {
    if state.is_idle {
        ("Idle".into(), PLACEHOLDER.into())
    } else {
        (
            format!("{}%", state.progress),
            format_remaining(state.remaining_time_minutes),
        )
    }
}

// ── DashboardView ────────────────────────────────────────────────────

/// Every formatted field a dashboard renders, from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub device_name: String,
    pub status: String,
    pub tone: StatusTone,
    pub badge: &'static str,
    pub dial: Dial,
    pub remaining: String,
    pub finish: String,
    pub nozzle: String,
    pub bed: String,
    pub last_update: String,
    pub ams: Vec<Rgb>,
    pub firmware: Option<String>,
}

impl DashboardView {
    pub fn render(state: &PrinterState, now: DateTime<Utc>) -> Self {
        let (remaining, finish) = if state.is_idle {
            (PLACEHOLDER.to_string(), PLACEHOLDER.to_string())
        } else {
            (
                format_remaining(state.remaining_time_minutes),
                finish_time(state.remaining_time_minutes, now.with_timezone(&Local)),
            )
        };

        Self {
            device_name: state.device_name.clone(),
            status: state.status_text.clone(),
            tone: status_tone(&state.status_text),
            badge: connection_badge(&state.status_text),
            dial: dial(state),
            remaining,
            finish,
            nozzle: format_temperature(state.nozzle_temp),
            bed: format_temperature(state.bed_temp),
            last_update: format_last_update(state.last_update, now),
            ams: ams_swatches(state),
            firmware: state.firmware_version.clone(),
        }
    }
}

// ── PresentationAdapter ──────────────────────────────────────────────

/// Maps UI lifecycle events onto supervisor requests and renders views.
#[derive(Clone)]
pub struct PresentationAdapter {
    supervisor: Supervisor,
    store: StateStore,
    credentials: Arc<Mutex<Option<Credentials>>>,
}

impl PresentationAdapter {
    pub fn new(supervisor: Supervisor) -> Self {
        let store = supervisor.store().clone();
        Self {
            supervisor,
            store,
            credentials: Arc::new(Mutex::new(None)),
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Start monitoring with `credentials`, reusing a live session.
    pub async fn connect(&self, credentials: Credentials) -> Result<RequestOutcome, CoreError> {
        self.remember(credentials.clone());
        self.supervisor.request(credentials, false).await
    }

    /// App returned to the foreground.
    pub async fn on_foreground(&self) -> Result<RequestOutcome, CoreError> {
        self.request_current(false).await
    }

    /// Drop the current connection and start over.
    pub async fn pull_to_refresh(&self) -> Result<RequestOutcome, CoreError> {
        self.request_current(true).await
    }

    /// New settings always reconnect, even if nothing changed.
    pub async fn save_settings(&self, credentials: Credentials) -> Result<RequestOutcome, CoreError> {
        self.remember(credentials.clone());
        self.supervisor.request(credentials, true).await
    }

    pub fn view(&self) -> DashboardView {
        DashboardView::render(&self.store.get(), Utc::now())
    }

    pub fn notification(&self) -> Notification {
        notification(&self.store.get())
    }

    async fn request_current(&self, force: bool) -> Result<RequestOutcome, CoreError> {
        let current = self
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match current {
            Some(credentials) => self.supervisor.request(credentials, force).await,
            None => {
                debug!("no credentials configured yet");
                Ok(RequestOutcome::Ignored)
            }
        }
    }

    fn remember(&self, credentials: Credentials) {
        *self
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(credentials);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn printing(progress: u8, remaining: u32) -> PrinterState {
        PrinterState {
            progress,
            remaining_time_minutes: remaining,
            status_text: "Running".into(),
            is_idle: false,
            ..PrinterState::default()
        }
    }

    #[test]
    fn remaining_time_formats() {
        assert_eq!(format_remaining(0), "0m");
        assert_eq!(format_remaining(45), "45m");
        assert_eq!(format_remaining(60), "1h 0m");
        assert_eq!(format_remaining(125), "2h 5m");
    }

    #[test]
    fn finish_time_is_twelve_hour_without_meridiem() {
        let now = Local.with_ymd_and_hms(2024, 5, 1, 13, 50, 0).unwrap();
        assert_eq!(finish_time(0, now), "1:50");
        assert_eq!(finish_time(75, now), "3:05");
        let morning = Local.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        assert_eq!(finish_time(180, morning), "12:00");
    }

    #[test]
    fn last_update_formats() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format_last_update(None, now), "Never");
        assert_eq!(
            format_last_update(Some(now - TimeDelta::seconds(59)), now),
            "Just now"
        );
        assert_eq!(
            format_last_update(Some(now - TimeDelta::seconds(61)), now),
            "1m ago"
        );
        assert_eq!(
            format_last_update(Some(now - TimeDelta::minutes(42)), now),
            "42m ago"
        );
    }

    #[test]
    fn tones_and_badges() {
        assert_eq!(status_tone("Connecting..."), StatusTone::Pending);
        assert_eq!(status_tone("Error"), StatusTone::Alert);
        assert_eq!(status_tone("Offline"), StatusTone::Alert);
        assert_eq!(status_tone("Running"), StatusTone::Normal);
        assert_eq!(status_tone("Disconnected"), StatusTone::Normal);

        assert_eq!(connection_badge("Connecting..."), "Connecting");
        assert_eq!(connection_badge("Error"), "Offline");
        assert_eq!(connection_badge("Disconnected"), "Offline");
        assert_eq!(connection_badge("Finish"), "Connected");
    }

    #[test]
    fn colors_parse_with_or_without_hash_and_alpha() {
        assert_eq!(parse_color("#FF8000"), Some(Rgb::new(0xFF, 0x80, 0x00)));
        assert_eq!(parse_color("ff8000"), Some(Rgb::new(0xFF, 0x80, 0x00)));
        assert_eq!(parse_color("FF8000AA"), Some(Rgb::new(0xFF, 0x80, 0x00)));
        assert_eq!(parse_color("#FFF"), None);
        assert_eq!(parse_color("zzzzzz"), None);
        assert_eq!(parse_color(""), None);
        assert_eq!(ACCENT.to_hex(), "#00E676");
    }

    #[test]
    fn dial_follows_connection_then_idle() {
        assert_eq!(dial(&PrinterState::default()), Dial::Spinner);

        let idle = PrinterState::default().with_status("Idle");
        assert_eq!(dial(&idle), Dial::Idle);

        let mut job = printing(42, 10);
        job.filament_color = "not-a-color".into();
        assert_eq!(
            dial(&job),
            Dial::Progress {
                percent: 42,
                color: ACCENT
            }
        );
    }

    #[test]
    fn idle_notification() {
        let note = notification(&PrinterState::default().with_status("Idle"));
        assert_eq!(note.title, "Printer idle");
        assert_eq!(note.text, "Um... Nothings printing?");
        assert_eq!(note.progress, 0);
        assert!(!note.indeterminate);
    }

    #[test]
    fn printing_notification_and_widget() {
        let state = printing(37, 95);
        let note = notification(&state);
        assert_eq!(note.title, "Printing 37%");
        assert_eq!(note.text, "Remaining: 1h 35m");
        assert_eq!(note.progress, 37);

        assert_eq!(widget_summary(&state), ("37%".into(), "1h 35m".into()));
        assert_eq!(
            widget_summary(&PrinterState::default()),
            ("Idle".into(), "--".into())
        );
    }

    #[test]
    fn connecting_notification_is_indeterminate() {
        assert!(notification(&PrinterState::default()).indeterminate);
    }

    #[test]
    fn dashboard_view_for_idle_printer() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let state = PrinterState {
            status_text: "Finish".into(),
            nozzle_temp: 28.9,
            bed_temp: 25.2,
            ams_filaments: vec!["#FF0000".into(), "bogus".into()],
            last_update: Some(now),
            ..PrinterState::default()
        };

        let view = DashboardView::render(&state, now);
        assert_eq!(view.remaining, "--");
        assert_eq!(view.finish, "--");
        assert_eq!(view.nozzle, "28°C");
        assert_eq!(view.bed, "25°C");
        assert_eq!(view.last_update, "Just now");
        assert_eq!(view.badge, "Connected");
        assert_eq!(view.ams, vec![Rgb::new(0xFF, 0, 0), ACCENT]);
    }
}
