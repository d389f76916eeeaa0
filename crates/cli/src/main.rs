mod commands;

use anyhow::Result;
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::sync::Arc;

use citizen_core::{
    config::{self, AppConfig},
    FileStore,
};
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();

    config::ensure_default_config()?;
    let mut config = AppConfig::load()?;
    if let Some(dir) = cli.data_dir.clone() {
        config.data_root = dir;
    }

    let store = Arc::new(FileStore::open(&config.data_root)?);
    tracing::debug!(path = %store.path().display(), "Marketplace store opened");

    commands::run(cli, store, config.settings).await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("citizen.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
