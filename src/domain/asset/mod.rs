//! Asset domain - static registry of tradable tokens

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::str::FromStr;

use crate::shared::errors::ConfigError;
use crate::shared::utils::{format_amount, parse_ui_amount, MAX_DECIMALS};

/// Known mainnet tokens: (symbol, mint, decimals)
const KNOWN_ASSETS: &[(&str, &str, u8)] = &[
    ("SOL", "So11111111111111111111111111111111111111112", 9),
    ("CTOAD", "Mse6hcdxMWgQgEW7AcidAYw2G5ucW5fC8XK3NWYpump", 6),
    ("USDC", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 6),
    ("BONK", "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263", 5),
    ("WIF", "EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm", 6),
];

/// Token representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub mint: Pubkey,
    pub decimals: u8,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, mint: Pubkey, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            mint,
            decimals,
        }
    }

    /// Human-readable decimal string to raw units.
    pub fn to_raw(&self, ui_amount: &str) -> Result<u64, String> {
        parse_ui_amount(ui_amount, self.decimals)
    }

    /// Whole token count to raw units; `None` on overflow.
    pub fn whole_to_raw(&self, whole: u64) -> Option<u64> {
        10u64
            .checked_pow(self.decimals as u32)
            .and_then(|scale| whole.checked_mul(scale))
    }

    pub fn to_ui(&self, raw: u64) -> String {
        format_amount(raw, self.decimals)
    }
}

/// Asset entry as written in the config file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetCfg {
    pub symbol: String,
    pub mint: String,
    pub decimals: u8,
}

/// Immutable registry built once at process start
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    assets: Vec<Asset>,
}

impl AssetRegistry {
    /// Build from explicit entries, validating mints, precision and uniqueness.
    pub fn new(assets: Vec<Asset>) -> Result<Self, ConfigError> {
        if assets.is_empty() {
            return Err(ConfigError::Invalid("asset registry is empty".to_string()));
        }

        let mut symbols = HashSet::new();
        let mut mints = HashSet::new();
        for asset in &assets {
            if asset.decimals > MAX_DECIMALS {
                return Err(ConfigError::Invalid(format!(
                    "asset {} declares {} decimals",
                    asset.symbol, asset.decimals
                )));
            }
            if !symbols.insert(asset.symbol.to_ascii_uppercase()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate asset symbol: {}",
                    asset.symbol
                )));
            }
            if !mints.insert(asset.mint) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate asset mint: {}",
                    asset.mint
                )));
            }
        }

        Ok(Self { assets })
    }

    pub fn from_config(entries: &[AssetCfg]) -> Result<Self, ConfigError> {
        let assets = entries
            .iter()
            .map(|entry| {
                let mint = Pubkey::from_str(&entry.mint).map_err(|e| {
                    ConfigError::Invalid(format!("invalid mint for {}: {}", entry.symbol, e))
                })?;
                Ok(Asset::new(entry.symbol.clone(), mint, entry.decimals))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Self::new(assets)
    }

    /// Registry of the built-in mainnet tokens
    pub fn mainnet() -> Result<Self, ConfigError> {
        let entries: Vec<AssetCfg> = KNOWN_ASSETS
            .iter()
            .map(|(symbol, mint, decimals)| AssetCfg {
                symbol: symbol.to_string(),
                mint: mint.to_string(),
                decimals: *decimals,
            })
            .collect();
        Self::from_config(&entries)
    }

    /// Case-insensitive lookup by symbol
    pub fn by_symbol(&self, symbol: &str) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|asset| asset.symbol.eq_ignore_ascii_case(symbol.trim()))
    }

    pub fn by_mint(&self, mint: &Pubkey) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.mint == *mint)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
