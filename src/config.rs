//! Service configuration
//!
//! Defaults live in code. A TOML file may override any subset of them, and
//! `DENSIM_*` environment variables override the file.

use crate::symbolic::DerivationLimits;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Request defaults and caps for the Gibbs sampler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    /// `n_samples` when a request omits it
    pub default_n_samples: usize,
    /// `burn_in` when a request omits it
    pub default_burn_in: usize,
    /// Upper bound on `n_samples + burn_in` per request
    pub max_iterations: usize,
    /// Bins per axis of the plotted histogram
    pub histogram_bins: usize,
    /// Seed for the process-wide generator; entropy when absent
    pub seed: Option<u64>,
    /// Longest accepted expression, in characters
    pub max_expression_len: usize,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            default_n_samples: 1000,
            default_burn_in: 500,
            max_iterations: 200_000,
            histogram_bins: 20,
            seed: None,
            max_expression_len: 512,
        }
    }
}

/// Budget for the symbolic derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationSettings {
    pub max_degree: u32,
    pub max_terms: usize,
    /// Wall-clock limit per request, derivation and sampling included
    pub timeout_ms: u64,
}

impl Default for DerivationSettings {
    fn default() -> Self {
        let limits = DerivationLimits::default();
        Self {
            max_degree: limits.max_degree,
            max_terms: limits.max_terms,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sampler: SamplerSettings,
    pub derivation: DerivationSettings,
}

impl Config {
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, falling back to defaults for missing values
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        fs::write(path.as_ref(), toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("DENSIM_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse("DENSIM_PORT") {
            self.server.port = port;
        }
        if let Some(seed) = env_parse("DENSIM_SEED") {
            self.sampler.seed = Some(seed);
        }
        if let Some(max) = env_parse("DENSIM_MAX_ITERATIONS") {
            self.sampler.max_iterations = max;
        }
        if let Some(timeout) = env_parse("DENSIM_TIMEOUT_MS") {
            self.derivation.timeout_ms = timeout;
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.sampler.default_n_samples == 0 {
            return Err(ConfigError::Validation(
                "Default sample count must be greater than 0".to_string(),
            ));
        }
        let defaults = self.sampler.default_n_samples + self.sampler.default_burn_in;
        if defaults > self.sampler.max_iterations {
            return Err(ConfigError::Validation(format!(
                "Default samples plus burn-in exceed max_iterations ({})",
                self.sampler.max_iterations
            )));
        }
        if self.sampler.histogram_bins == 0 {
            return Err(ConfigError::Validation(
                "Histogram bins must be greater than 0".to_string(),
            ));
        }
        if self.derivation.max_degree == 0 || self.derivation.max_terms == 0 {
            return Err(ConfigError::Validation(
                "Derivation limits must be greater than 0".to_string(),
            ));
        }
        if self.derivation.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "Derivation timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Validation(format!("Invalid listen address: {}", e)))
    }

    pub fn limits(&self) -> DerivationLimits {
        DerivationLimits {
            max_degree: self.derivation.max_degree,
            max_terms: self.derivation.max_terms,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.derivation.timeout_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|val| val.parse().ok())
}
