//! CLI entry point.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing::error;
use tracing_subscriber::EnvFilter;

use rigging_cli::{Cli, CliContext, Commands, exit_code_for, handlers};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before clap so env-backed args see it
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = CliContext::from_cli(&cli);
    let result = match cli.command {
        Some(Commands::Port { lower, upper, count }) => {
            handlers::port::execute(&ctx, lower, upper, count)
        }
        Some(Commands::Leases { all, json }) => handlers::leases::execute(&ctx, all, json),
        Some(Commands::Release { ports }) => handlers::release::execute(&ctx, &ports),
        Some(Commands::Paths) => handlers::paths::execute(&ctx),
        Some(Commands::Run { phases, ready }) => {
            handlers::run::execute(&ctx, &phases, ready.as_deref()).await
        }
        None => Cli::command().print_help().map_err(Into::into),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(u8::try_from(exit_code_for(&e)).unwrap_or(1))
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
