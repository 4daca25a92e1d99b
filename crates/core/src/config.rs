//! Application configuration.
//!
//! Settings are layered: built-in defaults, then the TOML file under the
//! user's config directory, then `GAMESHELF_*` environment variables
//! (`__` separates nested keys, e.g. `GAMESHELF_STORE__DATABASE_URL`).

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::{i18n::Language, models::Coordinates};

const APP_DIR: &str = "gameshelf";
const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "GAMESHELF";

const DEFAULT_CONFIG: &str = r#"# Gameshelf configuration

# Display language: "en" or "fi".
language = "en"

# Colour scheme: "dark" or "light".
theme = "dark"

[store]
# "local" keeps the catalog in a JSON file, "firebase" talks to a realtime database.
backend = "local"
# database_url = "https://your-project-default-rtdb.firebaseio.com/"
# data_file = "/path/to/catalog.json"
reconnect_delay_ms = 2000

# Position reported when a location form asks for the current location.
# Leave unset to treat location access as denied.
# [device.position]
# latitude = 60.1699
# longitude = 24.9384
"#;

/// Palette the terminal front-end draws with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    /// Light text on a dark terminal.
    #[default]
    Dark,
    /// Dark text on a light terminal.
    Light,
}

/// Which record store backs the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// JSON file on this machine.
    #[default]
    Local,
    /// Hosted realtime database over REST.
    Firebase,
}

/// Record store settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: Backend,
    /// Base URL of the realtime database.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Catalog file for the local backend.
    pub data_file: PathBuf,
    /// Pause before reopening a dropped stream.
    pub reconnect_delay_ms: u64,
}

impl StoreConfig {
    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Device stand-ins for a terminal session.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceConfig {
    /// Position answered to location requests.
    #[serde(default)]
    pub position: Option<Coordinates>,
}

/// Resolved application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Display language.
    #[serde(default)]
    pub language: Language,
    /// Colour scheme.
    #[serde(default)]
    pub theme: ColorScheme,
    /// Record store settings.
    pub store: StoreConfig,
    /// Device stand-ins.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Directory for log files.
    pub log_dir: PathBuf,
}

impl AppConfig {
    /// Load from the default config file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&default_path()?)
    }

    /// Load from `path` and the environment. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::build(path, None)
    }

    fn build(path: &Path, env: Option<HashMap<String, String>>) -> Result<Self> {
        let data_dir = data_dir();
        let config = Config::builder()
            .set_default("language", "en")?
            .set_default("theme", "dark")?
            .set_default("store.backend", "local")?
            .set_default(
                "store.data_file",
                data_dir.join("catalog.json").to_string_lossy().into_owned(),
            )?
            .set_default("store.reconnect_delay_ms", 2000)?
            .set_default("log_dir", data_dir.join("logs").to_string_lossy().into_owned())?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;

        let config: Self = config
            .try_deserialize()
            .context("invalid configuration")?;
        Ok(config)
    }
}

/// Location of the user's config file.
pub fn default_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("no configuration directory on this platform")?;
    Ok(base.join(APP_DIR).join(CONFIG_FILE))
}

/// Write the commented default config file unless one already exists.
///
/// Returns the path when a new file was written.
pub fn ensure_default_config() -> Result<Option<PathBuf>> {
    ensure_config_at(default_path()?)
}

fn ensure_config_at(path: PathBuf) -> Result<Option<PathBuf>> {
    Ok(write_default_config(&path)?.then_some(path))
}

fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn no_env() -> Option<HashMap<String, String>> {
        Some(HashMap::new())
    }

    #[test]
    fn defaults_apply_without_a_file() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::build(&dir.path().join("missing.toml"), no_env())?;
        assert_eq!(config.language, Language::En);
        assert_eq!(config.theme, ColorScheme::Dark);
        assert_eq!(config.store.backend, Backend::Local);
        assert_eq!(config.store.reconnect_delay(), Duration::from_secs(2));
        assert!(config.store.data_file.ends_with("catalog.json"));
        assert!(config.device.position.is_none());
        Ok(())
    }

    #[test]
    fn default_file_parses() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE);
        assert!(write_default_config(&path)?);
        assert!(!write_default_config(&path)?);

        let config = AppConfig::build(&path, no_env())?;
        assert_eq!(config.store.backend, Backend::Local);
        Ok(())
    }

    #[test]
    fn only_a_fresh_write_reports_its_path() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(APP_DIR).join(CONFIG_FILE);
        assert_eq!(ensure_config_at(path.clone())?, Some(path.clone()));
        assert_eq!(ensure_config_at(path)?, None);
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
language = "fi"
theme = "light"

[store]
backend = "firebase"
database_url = "https://shelf.example.com/"

[device.position]
latitude = 60.17
longitude = 24.94
"#,
        )?;

        let config = AppConfig::build(&path, no_env())?;
        assert_eq!(config.language, Language::Fi);
        assert_eq!(config.theme, ColorScheme::Light);
        assert_eq!(config.store.backend, Backend::Firebase);
        assert_eq!(config.store.database_url.as_deref(), Some("https://shelf.example.com/"));
        assert_eq!(config.device.position, Some(Coordinates::new(60.17, 24.94)));
        Ok(())
    }

    #[test]
    fn environment_overrides_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[store]\nreconnect_delay_ms = 500\n")?;

        let env = HashMap::from([
            ("GAMESHELF_STORE__RECONNECT_DELAY_MS".to_string(), "750".to_string()),
            ("GAMESHELF_LANGUAGE".to_string(), "fi".to_string()),
            ("GAMESHELF_THEME".to_string(), "light".to_string()),
        ]);
        let config = AppConfig::build(&path, Some(env))?;
        assert_eq!(config.store.reconnect_delay_ms, 750);
        assert_eq!(config.language, Language::Fi);
        assert_eq!(config.theme, ColorScheme::Light);
        Ok(())
    }
}
