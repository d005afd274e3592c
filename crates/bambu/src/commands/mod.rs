//! Command dispatch: bridges CLI args -> supervisor -> output formatting.

pub mod config_cmd;
pub mod status;
pub mod watch;

use bambu_api::MqttConnector;
use bambu_core::{PresentationAdapter, StateStore, Supervisor};
use clap::CommandFactory;
use tracing::debug;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Status(args) => status::handle(args, global).await,
        Command::Watch(args) => watch::handle(args, global).await,
        Command::Config(args) => config_cmd::handle(args, global),
        Command::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "bambu", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Resolve config and credentials, spawn the supervisor over `store`, and
/// issue the first connect request.
pub async fn start_monitor(
    global: &GlobalOpts,
    store: StateStore,
) -> Result<PresentationAdapter, CliError> {
    let cfg = config::load(global)?;
    let credentials = config::resolve_credentials(&cfg, global)?;
    let monitor_config = config::monitor_config(&cfg)?;

    debug!(ip = %credentials.ip, serial = %credentials.serial, "starting monitor");
    let supervisor = Supervisor::spawn(MqttConnector, monitor_config, store);
    let adapter = PresentationAdapter::new(supervisor);

    if let Err(e) = adapter.connect(credentials).await {
        adapter.supervisor().shutdown().await;
        return Err(e.into());
    }
    Ok(adapter)
}
