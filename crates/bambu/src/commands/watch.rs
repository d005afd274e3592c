//! `bambu watch`: stream state changes until Ctrl-C or `--duration`.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bambu_core::presentation::{self, Dial, Notification};
use bambu_core::{DashboardView, PrinterState, StateStore};
use chrono::{Local, Utc};
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let store = if args.notify {
        StateStore::with_hook(notifier())
    } else {
        StateStore::new()
    };
    let adapter = super::start_monitor(global, store).await?;
    let mut updates = adapter.supervisor().store().watch().into_stream();

    let color = output::should_color(global.color);
    let mut last_line = String::new();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let deadline = async {
        match args.duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let result = loop {
        tokio::select! {
            biased;

            _ = &mut ctrl_c => {
                info!("interrupted");
                break Ok(());
            }

            () = &mut deadline => {
                debug!("watch duration elapsed");
                break Ok(());
            }

            next = updates.next() => {
                let Some(state) = next else {
                    break Ok(());
                };
                let line = match render_line(global.output, &state, color) {
                    Ok(line) => line,
                    Err(e) => break Err(e),
                };
                if line != last_line {
                    output::print_output(&line, global.quiet);
                    last_line = line;
                }
            }
        }
    };

    adapter.supervisor().shutdown().await;
    result
}

/// Hook that prints the status notification to stderr whenever it changes.
fn notifier() -> impl Fn(&PrinterState) + Send + Sync + 'static {
    let shown: Mutex<Option<Notification>> = Mutex::new(None);
    move |state: &PrinterState| {
        let next = presentation::notification(state);
        let mut shown = shown.lock().unwrap_or_else(PoisonError::into_inner);
        if shown.as_ref() != Some(&next) {
            eprintln!("[{}] {}", next.title, next.text);
            *shown = Some(next);
        }
    }
}

fn render_line(format: OutputFormat, state: &PrinterState, color: bool) -> Result<String, CliError> {
    let view = DashboardView::render(state, Utc::now());
    Ok(match format {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(&view)?,
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(&view)?.trim_end()),
        OutputFormat::Plain => format!("{}\t{}", view.status, progress_label(view.dial)),
        OutputFormat::Table => format!(
            "{}  {}  {:>5}  {:>8}  nozzle {:>6}  bed {:>6}",
            Local::now().format("%H:%M:%S"),
            output::paint_status(&format!("{:<12}", view.status), view.tone, color),
            progress_label(view.dial),
            view.remaining,
            view.nozzle,
            view.bed,
        ),
    })
}

fn progress_label(dial: Dial) -> String {
    match dial {
        Dial::Spinner => "...".into(),
        Dial::Idle => "idle".into(),
        Dial::Progress { percent, .. } => format!("{percent}%"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn printing() -> PrinterState {
        PrinterState {
            progress: 42,
            remaining_time_minutes: 65,
            status_text: "Running".into(),
            is_idle: false,
            nozzle_temp: 219.6,
            bed_temp: 55.0,
            ..PrinterState::default()
        }
    }

    #[test]
    fn plain_line_is_tab_separated() {
        let line = render_line(OutputFormat::Plain, &printing(), false).unwrap();
        assert_eq!(line, "Running\t42%");
    }

    #[test]
    fn table_line_carries_temperatures() {
        let line = render_line(OutputFormat::Table, &printing(), false).unwrap();
        assert!(line.contains("Running"));
        assert!(line.contains("1h 5m"));
        assert!(line.contains("nozzle  219°C"));
        assert!(line.contains("bed   55°C"));
    }

    #[test]
    fn json_lines_are_single_line() {
        let line = render_line(OutputFormat::Json, &printing(), false).unwrap();
        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["dial"]["percent"], 42);
    }

    #[test]
    fn progress_labels() {
        assert_eq!(progress_label(Dial::Spinner), "...");
        assert_eq!(progress_label(Dial::Idle), "idle");
    }
}
