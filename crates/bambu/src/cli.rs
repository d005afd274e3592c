//! Clap derive structures for the `bambu` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// bambu -- watch a Bambu Lab printer from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "bambu",
    version,
    about = "Monitor Bambu Lab printers over the local network",
    long_about = "Connects to a Bambu Lab printer's local MQTT broker (LAN mode)\n\
        and reports print progress, temperatures, and filament state.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file path
    #[arg(long, env = "BAMBU_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Printer IP address (overrides config)
    #[arg(long, env = "BAMBU_IP", global = true)]
    pub ip: Option<String>,

    /// Printer serial number (overrides config)
    #[arg(long, short = 's', env = "BAMBU_SERIAL", global = true)]
    pub serial: Option<String>,

    /// LAN access code
    #[arg(long, env = "BAMBU_ACCESS_CODE", global = true, hide_env_values = true)]
    pub access_code: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "BAMBU_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "BAMBU_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connect, wait for the first report, and print the printer status
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Print a line on every status change until Ctrl-C
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Status / Watch ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Seconds to wait for the printer's first report
    #[arg(long, short = 'w', default_value = "15")]
    pub wait: u64,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Also print the notification text whenever it changes
    #[arg(long, short = 'n')]
    pub notify: bool,

    /// Stop after this many seconds (runs until Ctrl-C by default)
    #[arg(long)]
    pub duration: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with guided setup
    Init,

    /// Display the current configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// Store the printer access code
    SetCode {
        /// Save to the config file instead of the system keyring
        #[arg(long)]
        plaintext: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
