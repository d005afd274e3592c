//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits bare values.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use bambu_core::presentation::StatusTone;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Paint a status string by tone.
pub fn paint_status(text: &str, tone: StatusTone, color: bool) -> String {
    if !color {
        return text.to_owned();
    }
    match tone {
        StatusTone::Alert => text.red().bold().to_string(),
        StatusTone::Pending => text.yellow().to_string(),
        StatusTone::Normal => text.green().to_string(),
    }
}

// ── Key/value detail table ───────────────────────────────────────────

#[derive(Tabled)]
pub struct Field {
    #[tabled(rename = "Field")]
    pub name: &'static str,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl Field {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

pub fn render_fields(fields: &[Field]) -> String {
    Table::new(fields).with(Style::rounded()).to_string()
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, plain uses `plain_fn`.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    plain_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => plain_fn(data),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn uncolored_status_is_untouched() {
        assert_eq!(paint_status("Error", StatusTone::Alert, false), "Error");
    }

    #[test]
    fn colored_status_carries_escape_codes() {
        let painted = paint_status("Running", StatusTone::Normal, true);
        assert!(painted.contains("Running"));
        assert!(painted.contains('\u{1b}'));
    }

    #[test]
    fn plain_and_json_dispatch() {
        let data = vec![1, 2];
        let plain = render_single(OutputFormat::Plain, &data, |_| "table".into(), |_| "plain".into())
            .unwrap();
        assert_eq!(plain, "plain");

        let compact =
            render_single(OutputFormat::JsonCompact, &data, |_| String::new(), |_| String::new())
                .unwrap();
        assert_eq!(compact, "[1,2]");
    }
}
