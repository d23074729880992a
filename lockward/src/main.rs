mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::logging::init_logging;

#[derive(clap::Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, default_value = "/etc/lockward.yaml")]
    config: PathBuf,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the signing and lockout services and the HTTP API
    Run,
    /// Validate config file
    Check,
    /// Show the lockout state of a client
    Status { identifier: String },
    /// Clear failed attempts and any lock for a client
    Unlock { identifier: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Run => crate::commands::run::command(&cli).await,
        Commands::Check => crate::commands::check::command(&cli).await,
        Commands::Status { identifier } => {
            crate::commands::status::command(&cli, identifier).await
        }
        Commands::Unlock { identifier } => {
            crate::commands::unlock::command(&cli, identifier).await
        }
    }
}
