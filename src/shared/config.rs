//! Configuration loading from Config.toml

use serde::Deserialize;
use solana_sdk::commitment_config::CommitmentConfig;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::asset::{AssetCfg, AssetRegistry};
use crate::domain::execution::BroadcastConfig;
use crate::domain::quote::QuoteEngineConfig;
use crate::domain::reward::RewardConfig;
use crate::shared::errors::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "Config.toml";

/// Environment variable holding the base58 custodial secret key
pub const SECRET_KEY_ENV: &str = "WALLET_SECRET_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    pub commitment: String,
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            commitment: "confirmed".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    pub base_url: String,
    pub slippage_bps: u16,
    pub debounce_ms: u64,
    pub quote_ttl_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://quote-api.jup.ag/v6".to_string(),
            slippage_bps: 50,
            debounce_ms: 500,
            quote_ttl_secs: 30,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BroadcastSection {
    pub skip_preflight: bool,
    pub max_send_attempts: u32,
    pub rpc_max_retries: Option<usize>,
    pub retry_delay_ms: u64,
    pub confirm_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for BroadcastSection {
    fn default() -> Self {
        Self {
            skip_preflight: true,
            max_send_attempts: 2,
            rpc_max_retries: Some(2),
            retry_delay_ms: 500,
            confirm_timeout_secs: 60,
            poll_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcConfig,
    pub quote: QuoteConfig,
    pub broadcast: BroadcastSection,
    pub reward: RewardConfig,
    pub server: ServerConfig,
    /// Replaces the built-in registry when non-empty
    pub assets: Vec<AssetCfg>,
}

impl Config {
    /// Load from `path`, or from `Config.toml` if present, or fall back to defaults.
    /// An explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.commitment()?;
        if self.broadcast.max_send_attempts == 0 {
            return Err(ConfigError::Invalid("broadcast.max_send_attempts must be at least 1".to_string()));
        }
        if self.broadcast.poll_interval_ms == 0 || self.broadcast.confirm_timeout_secs == 0 {
            return Err(ConfigError::Invalid("broadcast timings must be positive".to_string()));
        }
        if self.quote.slippage_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "quote.slippage_bps {} exceeds 10000",
                self.quote.slippage_bps
            )));
        }
        Ok(())
    }

    pub fn commitment(&self) -> Result<CommitmentConfig, ConfigError> {
        CommitmentConfig::from_str(&self.rpc.commitment)
            .map_err(|_| ConfigError::Invalid(format!("unknown commitment {}", self.rpc.commitment)))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn registry(&self) -> Result<AssetRegistry, ConfigError> {
        if self.assets.is_empty() {
            AssetRegistry::mainnet()
        } else {
            AssetRegistry::from_config(&self.assets)
        }
    }

    pub fn quote_engine(&self) -> QuoteEngineConfig {
        QuoteEngineConfig {
            slippage_bps: self.quote.slippage_bps,
            quote_ttl: Duration::from_secs(self.quote.quote_ttl_secs),
            request_timeout: Duration::from_secs(self.quote.request_timeout_secs),
        }
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.quote.debounce_ms)
    }

    pub fn broadcast(&self) -> BroadcastConfig {
        BroadcastConfig {
            skip_preflight: self.broadcast.skip_preflight,
            max_send_attempts: self.broadcast.max_send_attempts,
            rpc_max_retries: self.broadcast.rpc_max_retries,
            retry_delay: Duration::from_millis(self.broadcast.retry_delay_ms),
            confirm_timeout: Duration::from_secs(self.broadcast.confirm_timeout_secs),
            poll_interval: Duration::from_millis(self.broadcast.poll_interval_ms),
            call_timeout: self.rpc_timeout(),
        }
    }
}
