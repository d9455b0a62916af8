//! Server configuration
//!
//! Read from the TOML file named by `ITEMDESK_CONFIG` (defaults when unset),
//! then overridden by `ITEMDESK_ADDR` and `ITEMDESK_DB`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use itemdesk_core::{ConfigError, CoreConfig};

pub const CONFIG_ENV: &str = "ITEMDESK_CONFIG";
pub const ADDR_ENV: &str = "ITEMDESK_ADDR";
pub const DB_ENV: &str = "ITEMDESK_DB";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub addr: String,
    /// SQLite database file; in-memory when absent
    pub database: Option<PathBuf>,
    /// Insert the sample records into an empty store at start-up
    pub seed_samples: bool,
    /// Actors allowed to read but not to create, update, delete or approve
    pub read_only_actors: Vec<String>,
    pub core: CoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            database: None,
            seed_samples: true,
            read_only_actors: Vec::new(),
            core: CoreConfig::default(),
        }
    }
}

/// Server configuration error
#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Core(#[from] ConfigError),
}

impl ServerConfig {
    /// Load from the environment.
    pub fn load() -> Result<Self, ServerConfigError> {
        let config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                let path = PathBuf::from(path);
                let text = std::fs::read_to_string(&path).map_err(|source| {
                    ServerConfigError::Io {
                        path: path.clone(),
                        source,
                    }
                })?;
                tracing::info!("Loaded configuration from {:?}", path);
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        let config = config.with_overrides(|key| std::env::var(key).ok());
        config.core.validate()?;
        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ServerConfigError> {
        toml::from_str(toml_str).map_err(|e| ServerConfigError::Parse(e.to_string()))
    }

    /// Apply `ITEMDESK_ADDR` / `ITEMDESK_DB` style overrides from `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup(ADDR_ENV) {
            self.addr = addr;
        }
        if let Some(db) = lookup(DB_ENV) {
            self.database = Some(PathBuf::from(db));
        }
        self
    }
}
