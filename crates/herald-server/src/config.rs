use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use herald_core::{LogConfig, PollConfig, ProducerConfig};

use crate::error::ServerResult;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)),
        }
    }
}

/// Full configuration file: one section per component.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub poll: PollConfig,
    pub producer: ProducerConfig,
}

impl HeraldConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(raw: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ServerResult<()> {
        self.poll.validate()?;
        self.producer.validate()?;
        Ok(())
    }
}
