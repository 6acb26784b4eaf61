use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Broker-wide knobs every consumer session inherits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Max unacknowledged deliveries per consumer session before the broker
    /// holds further pushes back. 0 means unlimited, matching AMQP's default
    /// basic.qos.
    pub prefetch_limit: usize,

    /// Emit a warning for every publish that matches no binding.
    pub log_unroutable: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            prefetch_limit: 0,
            log_unroutable: true,
        }
    }
}

impl BrokerConfig {
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::read_from_file(p), // propagate errors unchanged
            None => Ok(Self::default()),
        }
    }

    fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading {:?}", path.as_ref()))?;
        let cfg: BrokerConfig = toml::from_str(&raw)
            .with_context(|| "parsing broker config TOML")?;
        Ok(cfg)
    }
}
