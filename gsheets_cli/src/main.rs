use clap::Parser;
use owo_colors::OwoColorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gsheets_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Authenticate { manual } => commands::authenticate::run(*manual).await,
        Commands::Exchange { code } => commands::exchange::run(code).await,
        Commands::Setup => commands::setup::run(),
        Commands::Cleanup { yes } => commands::cleanup::run(*yes),
        Commands::Status => commands::status::run(),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        process::exit(1);
    }
}
