//! # boe-config
//!
//! Layered configuration loading for the BOE ingestion pipeline, built on
//! figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`BOE_INGEST_*`, double-underscore nesting)
//! 2. Project-level `./ingest.toml`
//! 3. User-level `~/.config/boe-ingest/config.toml`
//! 4. Built-in defaults

pub mod error;
pub mod pipeline;
pub mod source;
pub mod storage;

use std::path::PathBuf;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

pub use error::ConfigError;
pub use pipeline::PipelineConfig;
pub use source::SourceConfig;
pub use storage::StorageConfig;

const ENV_PREFIX: &str = "BOE_INGEST_";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct IngestionConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

impl IngestionConfig {
    /// Path to the user-level config file, if the platform config dir is
    /// resolvable.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("boe-ingest").join("config.toml"))
    }

    /// Load configuration from defaults, an optional project file
    /// (`./ingest.toml`), an optional user file, and environment variables,
    /// in that priority order. Loads a local `.env` file first via dotenvy
    /// so `BOE_INGEST_*` vars set there are picked up the same as real
    /// environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(user_path) = Self::user_config_path() {
            figment = figment.merge(Toml::file(user_path));
        }
        figment = figment.merge(Toml::file("ingest.toml"));
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().map_err(ConfigError::from)
    }
}
