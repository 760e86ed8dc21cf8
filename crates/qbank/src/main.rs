use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let all_parsed = match cli.command {
        Commands::Parse {
            files,
            config,
            compact,
        } => cli::parse::run(&files, &config, compact).await?,
        Commands::Import { files, db, config } => {
            cli::import::run(&files, db.as_deref(), &config).await?
        }
    };

    Ok(if all_parsed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
