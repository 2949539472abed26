use berth_engine::{EngineConfig, EngineError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Contents of the optional `berth.toml`.
///
/// ```toml
/// [server]
/// bind = "0.0.0.0"
/// port = 8080
/// workers = 4
/// default_image_filter = ""
///
/// [engine]
/// backend = "docker"
/// url = "unix:///var/run/docker.sock"
/// timeout_secs = 30
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BerthConfig {
    pub server: ServerSection,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
    /// Worker threads pulling requests off the listener.
    pub workers: usize,
    /// Pattern used by `/images/filter` when `filterName` is absent.
    pub default_image_filter: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_owned(),
            port: 8080,
            workers: 4,
            default_image_filter: String::new(),
        }
    }
}

impl ServerSection {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Per-request defaults the router applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterConfig {
    pub default_image_filter: String,
}

impl BerthConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        let backend = config.engine.backend.clone();
        config.engine.set_backend(&backend);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.workers == 0 {
            return Err(ConfigError::Invalid(
                "server.workers must be at least 1".to_owned(),
            ));
        }
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind is empty".to_owned()));
        }
        self.engine.validate()?;
        Ok(())
    }

    pub fn router(&self) -> RouterConfig {
        RouterConfig {
            default_image_filter: self.server.default_image_filter.clone(),
        }
    }
}
