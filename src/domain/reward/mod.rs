//! Reward selection - random whole-token amount within configured bounds

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::Deserialize;
use std::sync::Mutex;
use tracing::debug;

use crate::domain::asset::{Asset, AssetRegistry};
use crate::domain::execution::TransferIntent;
use crate::shared::errors::{BuilderError, ConfigError};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Reward asset, fixed per deployment
    pub asset: String,
    pub min_amount: u64,
    pub max_amount: u64,
    /// Raw amount is `whole * 10^decimals / scale_divisor`
    pub scale_divisor: u64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            asset: "BONK".to_string(),
            min_amount: 10,
            max_amount: 600,
            scale_divisor: 1,
        }
    }
}

pub struct RewardSelector {
    asset: Asset,
    config: RewardConfig,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl RewardSelector {
    pub fn new(registry: &AssetRegistry, config: RewardConfig) -> Result<Self, ConfigError> {
        Self::with_rng(registry, config, Box::new(StdRng::from_entropy()))
    }

    pub fn with_rng(
        registry: &AssetRegistry,
        config: RewardConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self, ConfigError> {
        let asset = registry
            .by_symbol(&config.asset)
            .cloned()
            .ok_or_else(|| ConfigError::Invalid(format!("unknown reward asset {}", config.asset)))?;
        if config.min_amount == 0 || config.min_amount > config.max_amount {
            return Err(ConfigError::Invalid(format!(
                "reward bounds [{}, {}] are invalid",
                config.min_amount, config.max_amount
            )));
        }
        if config.scale_divisor == 0 {
            return Err(ConfigError::Invalid("reward scale_divisor must be positive".to_string()));
        }

        let selector = Self {
            asset,
            config,
            rng: Mutex::new(rng),
        };
        // Both ends of the range must produce a positive raw amount that fits in u64
        for whole in [selector.config.min_amount, selector.config.max_amount] {
            match selector.scale(whole) {
                Some(raw) if raw > 0 => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "reward amount {} {} does not scale to a valid raw amount",
                        whole, selector.asset.symbol
                    )))
                }
            }
        }
        Ok(selector)
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn bounds(&self) -> (u64, u64) {
        (self.config.min_amount, self.config.max_amount)
    }

    pub fn in_bounds(&self, whole: u64) -> bool {
        (self.config.min_amount..=self.config.max_amount).contains(&whole)
    }

    /// Uniform whole-token amount in `[min_amount, max_amount]`
    pub fn draw(&self) -> u64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(self.config.min_amount..=self.config.max_amount)
    }

    /// Draw an amount and build the transfer intent for `recipient`.
    pub fn select_reward(&self, recipient: &str) -> Result<TransferIntent, BuilderError> {
        let whole = self.draw();
        debug!("Selected reward of {} {}", whole, self.asset.symbol);
        self.intent_for(recipient, whole)
    }

    /// Transfer intent for an explicit whole-token amount
    pub fn intent_for(&self, recipient: &str, whole: u64) -> Result<TransferIntent, BuilderError> {
        if !self.in_bounds(whole) {
            return Err(BuilderError::InvalidAmount(format!(
                "reward amount {} is outside [{}, {}]",
                whole, self.config.min_amount, self.config.max_amount
            )));
        }
        let raw = self
            .scale(whole)
            .filter(|raw| *raw > 0)
            .ok_or_else(|| BuilderError::InvalidAmount(format!("cannot scale {}", whole)))?;
        TransferIntent::new(recipient, self.asset.clone(), raw)
    }

    fn scale(&self, whole: u64) -> Option<u64> {
        self.asset
            .whole_to_raw(whole)
            .map(|raw| raw / self.config.scale_divisor)
    }
}
