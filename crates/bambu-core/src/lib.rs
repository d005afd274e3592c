//! Printer state model and connection supervision for Bambu Lab monitors.
//!
//! - **[`Supervisor`]** owns the single connection to a printer. Every
//!   connect, reconnect, and refresh runs on one worker task, driven by
//!   [`request()`](Supervisor::request) and a periodic refresh tick.
//!
//! - **[`StateStore`]** holds the current [`PrinterState`]. Async readers
//!   use [`StateStream`]; synchronous observers register callbacks.
//!
//! - **[`parse_report`]** merges one status report into the previous state.
//!
//! - **[`presentation`]** formats a snapshot for dashboards, widgets, and
//!   notifications.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod presentation;
mod session;
pub mod store;
pub mod stream;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{MonitorConfig, TlsVerification};
pub use error::{CoreError, PayloadError};
pub use model::{Credentials, GcodeState, PrinterState};
pub use parser::parse_report;
pub use presentation::{DashboardView, PresentationAdapter};
pub use session::ConnectionState;
pub use store::{NotificationHook, StateStore, Subscription};
pub use stream::StateStream;
pub use supervisor::{RequestOutcome, Supervisor};
