use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
    pub game: GameConfig,
    pub sources: SourcesConfig,
}

impl Config {
    /// Reads `config.toml` from the working directory. A missing file yields
    /// the built-in defaults so the server can start with zero setup.
    pub fn load() -> AnyResult<Self> {
        let config_str = std::fs::read_to_string("config.toml").unwrap_or_default();
        if config_str.is_empty() {
            return Ok(Self::default());
        }
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }
}
