//! # Grpcmd Entry Point
//!
//! A command-line client for the standard gRPC health checking service, laid out the way
//! generated `grpcmd` commands are:
//!
//! 1. **Configuration**: A [`Config`] is built from the process-wide defaults plus the
//!    command's options (every configuration flag, environment variables prefixed `GRPCMD`).
//! 2. **Commands**: One subcommand per service, one nested subcommand per method, with the
//!    configuration flags bound onto each method command.
//! 3. **Execution**: The selected method runs as a single round trip; the response is
//!    written to stdout in the selected format.
//! 4. **Presentation**: Failures are printed to stderr and the process exits with status 1.
//!
//! Set `RUST_LOG=grpcmd_core=debug` to follow format selection and connection setup.

mod descriptor;
mod formatter;
mod health;
mod logging;

use clap::{ArgMatches, Command};
use formatter::FormattedString;
use grpcmd_core::Config;
use grpcmd_core::config::options;
use health::HealthCommands;
use std::process;

const ENV_PREFIX: &str = "grpcmd";

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(err) = run().await {
        eprintln!("{}", FormattedString::from(err));
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let mut config = Config::build(
        options::with_default_flags()
            .into_iter()
            .chain([options::with_env_vars(ENV_PREFIX)]),
    );
    let health = HealthCommands::new()?;

    let matches = cli(&config, &health).get_matches();
    dispatch(&matches, &mut config, &health).await
}

fn cli(config: &Config, health: &HealthCommands) -> Command {
    Command::new("grpcmd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("gRPC health checking client")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(health.command(config))
}

async fn dispatch(
    matches: &ArgMatches,
    config: &mut Config,
    health: &HealthCommands,
) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some((_, sub)) => health.run(sub, config).await,
        None => Ok(()),
    }
}
