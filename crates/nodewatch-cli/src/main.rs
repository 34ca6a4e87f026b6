use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::Cli;
use error::CliError;

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match commands::Context::from_env() {
        Ok(ctx) => commands::run(ctx, cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        match e {
            CliError::Usage(msg) => eprintln!("{msg}"),
            other => tracing::error!(error = %other, "Command failed"),
        }
        std::process::exit(1);
    }
}
