mod app;
mod device;
mod widgets;

use std::{
    fs::{self, OpenOptions},
    path::Path,
    sync::Mutex,
};

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};
use gameshelf_core::{
    config::{self, AppConfig, Backend},
    i18n::LanguageSettings,
    store::{FirebaseStore, MemoryStore},
};

use crate::{app::GameshelfApp, device::ConfiguredGeolocator};

#[tokio::main]
async fn main() -> Result<()> {
    let written = config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config.log_dir)?;
    if let Some(path) = written {
        info!(path = %path.display(), "Wrote default configuration");
    }
    info!(
        backend = ?config.store.backend,
        language = %config.language,
        theme = ?config.theme,
        "Starting gameshelf"
    );

    let settings = LanguageSettings::new(config.language);
    let geolocator = ConfiguredGeolocator::new(config.device.position);

    match config.store.backend {
        Backend::Local => {
            let store = MemoryStore::open(config.store.data_file.clone())
                .context("failed to open local catalog")?;
            GameshelfApp::new(store, settings, geolocator, config.theme).run().await
        }
        Backend::Firebase => {
            let url = config
                .store
                .database_url
                .as_deref()
                .context("store.database_url must be set for the firebase backend")?;
            let store = FirebaseStore::new(url, config.store.reconnect_delay())?;
            GameshelfApp::new(store, settings, geolocator, config.theme).run().await
        }
    }
}

fn init_logging(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join("gameshelf.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal belongs to the UI, so only the file gets log output.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
