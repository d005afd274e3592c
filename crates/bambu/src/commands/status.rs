//! `bambu status`: connect, wait for the first report, print a snapshot.

use std::time::Duration;

use bambu_core::presentation::{Dial, Rgb};
use bambu_core::{CoreError, DashboardView, PresentationAdapter, StateStore};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::time::Instant;

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output::{self, Field};

pub async fn handle(args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let adapter = super::start_monitor(global, StateStore::new()).await?;

    let spinner = spinner(global.quiet);
    let waited = wait_for_report(&adapter, Duration::from_secs(args.wait), &spinner).await;
    spinner.finish_and_clear();
    adapter.supervisor().shutdown().await;
    waited?;

    let view = adapter.view();
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &view,
        |v| detail(v, color),
        |v| v.status.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Block until a report with a `print` object arrives or `wait` elapses.
async fn wait_for_report(
    adapter: &PresentationAdapter,
    wait: Duration,
    spinner: &ProgressBar,
) -> Result<(), CliError> {
    let mut stream = adapter.supervisor().store().watch();
    let deadline = Instant::now() + wait;

    loop {
        let latest = stream.latest();
        if latest.has_telemetry() {
            return Ok(());
        }
        spinner.set_message(latest.status_text.clone());

        match tokio::time::timeout_at(deadline, stream.changed()).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(CoreError::SupervisorStopped.into()),
            Err(_) => {
                return Err(CliError::Timeout {
                    seconds: wait.as_secs(),
                    status: stream.latest().status_text.clone(),
                });
            }
        }
    }
}

fn swatch(color: Rgb, enabled: bool) -> String {
    if enabled {
        format!("{} {color}", "\u{25A0}".truecolor(color.r, color.g, color.b))
    } else {
        color.to_string()
    }
}

fn detail(view: &DashboardView, color: bool) -> String {
    let progress = match view.dial {
        Dial::Spinner => "...".to_string(),
        Dial::Idle => "Idle".to_string(),
        Dial::Progress { percent, color: filament } => {
            format!("{percent}%  {}", swatch(filament, color))
        }
    };

    let mut fields = vec![
        Field::new("Printer", view.device_name.clone()),
        Field::new("Status", output::paint_status(&view.status, view.tone, color)),
        Field::new("Connection", view.badge),
        Field::new("Progress", progress),
        Field::new("Remaining", view.remaining.clone()),
        Field::new("Finish", view.finish.clone()),
        Field::new("Nozzle", view.nozzle.clone()),
        Field::new("Bed", view.bed.clone()),
        Field::new("Last Update", view.last_update.clone()),
    ];
    if !view.ams.is_empty() {
        let trays: Vec<String> = view.ams.iter().map(|c| swatch(*c, color)).collect();
        fields.push(Field::new("AMS", trays.join("  ")));
    }
    if let Some(ref firmware) = view.firmware {
        fields.push(Field::new("Firmware", firmware.clone()));
    }

    output::render_fields(&fields)
}
