use clap::Args;
use serde::Deserialize;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/kakebo.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub sync_path: String,
    /// Target the development dataset of the sync endpoint.
    pub dev: bool,
    pub store_path: String,
    pub log_level: String,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Minimum time between two syncs of `kakebo watch`.
    pub resync_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "https://kakebo.aurelienribon.repl.co".to_string(),
            sync_path: "expenses/sync".to_string(),
            dev: false,
            store_path: "config/kakebo_store.json".to_string(),
            log_level: "info".to_string(),
            retry_attempts: 3,
            retry_delay_ms: 1000,
            resync_interval_secs: 60,
        }
    }
}

/// Global flags overriding the configuration file and environment.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    config: Option<String>,
    /// Override base URL of the sync endpoint.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Override the local store file.
    #[arg(long, global = true)]
    store_path: Option<String>,
    /// Sync against the development dataset.
    #[arg(long, global = true)]
    dev: bool,
    /// Override log level (e.g. debug).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

pub fn load(args: &ConfigArgs) -> Result<AppConfig> {
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("KAKEBO"));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(base_url) = &args.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(store_path) = &args.store_path {
        settings.store_path = store_path.clone();
    }
    if args.dev {
        settings.dev = true;
    }
    if let Some(log_level) = &args.log_level {
        settings.log_level = log_level.clone();
    }

    Ok(settings)
}
