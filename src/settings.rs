// src/settings.rs
//! Runtime configuration.
//!
//! Sources, lowest to highest precedence:
//! 1. built-in defaults
//! 2. optional `digital_id.toml` (or `.json`/`.yaml`) in the working directory
//! 3. environment variables prefixed with `DIGITAL_ID_`
//!
//! `main` loads a `.env` file first, so the variables can live there too.
//!
//! ## Keys
//! - `secret_key` (`DIGITAL_ID_SECRET_KEY`): shared QR passphrase, required
//! - `lookup_base_url`: identity service root (default `http://localhost:8000/api`)
//! - `bind_addr`: API listen address (default `127.0.0.1:3000`)
//! - `request_timeout_secs`: lookup request timeout (default 15)

use crate::utils::crypto::Passphrase;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

pub const CONFIG_FILE: &str = "digital_id";
pub const ENV_PREFIX: &str = "DIGITAL_ID";

pub const DEFAULT_LOOKUP_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Application settings.
///
/// `Debug` is safe to log: the passphrase redacts itself.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub secret_key: Passphrase,
    pub lookup_base_url: String,
    pub bind_addr: String,
    pub request_timeout_secs: u64,
}

impl Settings {
    /// Loads settings from defaults, the optional config file and the
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Self::from_config(config)
    }

    /// Builder pre-populated with the default values.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("lookup_base_url", DEFAULT_LOOKUP_BASE_URL)?
            .set_default("bind_addr", DEFAULT_BIND_ADDR)?
            .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    /// Deserializes and validates an already-built configuration.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.is_empty() {
            return Err(ConfigError::Message(format!(
                "secret_key must be set (e.g. {}_SECRET_KEY)",
                ENV_PREFIX
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Message("request_timeout_secs must be positive".into()));
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|e| ConfigError::Message(format!("invalid bind_addr {:?}: {}", self.bind_addr, e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
