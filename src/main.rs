mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

// Re-export from lib for internal use
use story_indexer::{config, error, index, indexer, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "story_indexer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { addr, no_watch } => {
            cli::serve(&cli.config, addr, !no_watch).await?;
        }
        Commands::Build { output } => {
            cli::build_once(&cli.config, &output).await?;
        }
    }

    Ok(())
}
