mod cli;
mod commands;
mod config;
mod error;
mod manifest;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use zenform_core::{HttpStore, MemoryStore};

use crate::cli::{Cli, Command};
use crate::commands::Session;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Offline: never resolves a profile or touches the network
        Command::Validate(args) => commands::validate::handle(&args.manifest, &cli.global),

        Command::Plan(args) if args.dry_run => {
            let store = MemoryStore::new();
            let session = Session::new(&store, config::offline_pass_timeout(&cli.global));
            commands::plan::handle(&session, &args.manifest, &cli.global).await
        }

        Command::Destroy(ref args) if !args.yes => Err(CliError::ConfirmationRequired {
            action: "destroy".into(),
        }),

        cmd => {
            let resolved = config::resolve(&cli.global)?;
            let store = HttpStore::connect(&resolved.server)
                .await
                .map_err(|e| match CliError::from(e) {
                    CliError::AuthFailed { .. } => CliError::AuthFailed {
                        profile: resolved.profile.clone(),
                    },
                    other => other,
                })?;
            let session = Session::new(&store, resolved.pass_timeout);

            tracing::debug!(command = ?cmd, profile = %resolved.profile, "dispatching command");
            commands::dispatch(cmd, &session, &cli.global).await
        }
    }
}
