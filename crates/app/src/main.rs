use std::time::Duration;

use clap::Parser;
use client::{HttpRemote, RetryPolicy};
use engine::{JsonFileStore, Store};

use crate::{commands::Command, error::Result};

mod commands;
mod config;
mod error;

#[derive(Debug, Parser)]
#[command(name = "kakebo")]
#[command(about = "Household expense tracker, synced with the kakebo endpoint")]
struct Cli {
    #[command(flatten)]
    config: config::ConfigArgs,
    /// Only touch the local store, never the sync endpoint.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "kakebo={level},engine={level},client={level}",
            level = settings.log_level
        ))
        .init();

    let remote = HttpRemote::new(&settings.base_url, &settings.sync_path, settings.dev)?
        .with_retry(RetryPolicy {
            attempts: settings.retry_attempts,
            base_delay: Duration::from_millis(settings.retry_delay_ms),
        });
    tracing::debug!("sync endpoint: {}", remote.endpoint());
    let store = Store::new(JsonFileStore::new(&settings.store_path), remote);

    commands::run(&store, &settings, cli.command, !cli.offline).await
}
