//! Application configuration and game balance values.
//!
//! Balance values live in an immutable [`GameSettings`] that services take at
//! construction time, so tests and deployments can override them freely.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory under the platform config dir holding `config.toml`.
pub const CONFIG_DIR: &str = "citizen";

/// Prefix for environment overrides, e.g. `CITIZEN__SETTINGS__ENERGY_MAX=120`.
pub const ENV_PREFIX: &str = "CITIZEN";

const DEFAULT_CONFIG: &str = r#"# Citizen configuration.
# Every key is optional; missing keys fall back to the built-in defaults.

# data_root = "/path/to/citizen/data"

[settings]
energy_max = 100
energy_restore_max = 1000
energy_restore_rate = 1
food_energy_restore = 10
country_change_cost = "5.00"
default_money = "100.00"
"#;

/// Game balance values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Cap on spendable energy.
    pub energy_max: u32,
    /// Cap on the regeneration accumulator.
    pub energy_restore_max: u32,
    /// Accumulator units gained per tick.
    pub energy_restore_rate: u32,
    /// Spendable energy restored per unit of food eaten.
    pub food_energy_restore: u32,
    /// Fee for moving to another country.
    pub country_change_cost: Decimal,
    /// Starting cash for new accounts.
    pub default_money: Decimal,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            energy_max: 100,
            energy_restore_max: 1000,
            energy_restore_rate: 1,
            food_energy_restore: 10,
            country_change_cost: Decimal::new(500, 2),
            default_money: Decimal::new(10000, 2),
        }
    }
}

impl GameSettings {
    /// Reject values that would make the game unplayable.
    pub fn validate(&self) -> Result<()> {
        if self.energy_max == 0 {
            bail!("energy_max must be positive");
        }
        if self.energy_restore_max == 0 {
            bail!("energy_restore_max must be positive");
        }
        if self.energy_restore_rate == 0 {
            bail!("energy_restore_rate must be positive");
        }
        if self.country_change_cost.is_sign_negative() {
            bail!("country_change_cost must not be negative");
        }
        if self.default_money.is_sign_negative() {
            bail!("default_money must not be negative");
        }
        Ok(())
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the persisted marketplace snapshot.
    pub data_root: PathBuf,
    /// Game balance values.
    pub settings: GameSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            settings: GameSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load from the default config file, overlaid by environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (optional on disk), overlaid by environment variables.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config: AppConfig = raw
            .try_deserialize()
            .with_context(|| format!("failed to parse configuration {}", path.display()))?;
        config.settings.validate()?;
        Ok(config)
    }
}

/// Path of the default configuration file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join("config.toml")
}

/// Default directory for persisted game data.
pub fn default_data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
}

/// Write the commented default configuration if no file exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}
