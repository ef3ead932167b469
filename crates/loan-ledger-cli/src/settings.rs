use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;

use loan_ledger_core::config::{LedgerConfig, RateCard, ScheduleConfig};
use loan_ledger_core::EngineConfig;

const DEFAULT_CONFIG_FILE: &str = "loans.toml";
const ENV_PREFIX: &str = "LOANS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// JSON file holding the ledger
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("loans.json"),
        }
    }
}

/// Everything the CLI reads from files and the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub schedule: ScheduleConfig,
    pub ledger: LedgerConfig,
    pub rates: RateCard,
    pub store: StoreSettings,
}

impl Settings {
    /// Layer `loans.toml` (if present), then `explicit`, then `LOANS__*`
    /// environment variables, after loading `.env`.
    pub fn load(explicit: Option<&str>) -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false));
        if let Some(path) = explicit {
            builder = builder.add_source(File::with_name(path).required(true));
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            schedule: self.schedule.clone(),
            ledger: self.ledger.clone(),
            rates: self.rates.clone(),
        }
    }
}
