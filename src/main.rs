use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use fhir_validator_server::{ServerConfig, server};

#[derive(Parser)]
#[command(
    name = "fhir-validator-server",
    version,
    about = "HTTP validation service wrapping a FHIR conformance rule engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    config: ServerConfig,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the validator so its artifacts and caches are warm, then exit
    Prepare,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Command::Prepare) => server::prepare(cli.config).await,
        None => server::run(cli.config).await,
    };

    if let Err(err) = result {
        error!(error = %err, "startup failed");
        std::process::exit(1);
    }
}
