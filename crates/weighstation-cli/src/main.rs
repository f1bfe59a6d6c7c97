//! weighstation CLI - scale kiosk for the terminal
//!
//! Runs a weighing shift against a Bluetooth or Wi-Fi scale and forwards
//! records to the sheet relay, plus diagnostics for scales and the relay.

use std::time::Duration;

use clap::Parser;
use weighstation_core::ShiftAction;

mod cli;
mod commands;
mod config_profiles;
mod error;

use cli::{Cli, Commands, ShiftCommands};
use commands::completions::run_completions;
use commands::config::run_config;
use commands::decode::run_decode;
use commands::health::run_health;
use commands::kiosk::run_kiosk;
use commands::probe::run_probe;
use commands::shift::run_shift;
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "weighstation=info"
            .parse()
            .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?,
    );
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Run(args) => run_kiosk(args, profile).await?,
        Commands::Probe {
            address,
            count,
            interval,
            timeout,
        } => {
            run_probe(
                &address,
                count,
                Duration::from_secs(interval),
                Duration::from_secs(timeout),
            )
            .await?;
        }
        Commands::Decode { payload, scheme } => run_decode(&payload, scheme.into())?,
        Commands::Shift { command } => match command {
            ShiftCommands::Start(args) => run_shift(ShiftAction::Start, args, profile).await?,
            ShiftCommands::End(args) => run_shift(ShiftAction::End, args, profile).await?,
        },
        Commands::Health { relay_url } => run_health(relay_url, profile).await?,
        Commands::Config { command } => run_config(command, profile)?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
