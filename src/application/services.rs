//! Composition root: wires configuration to the network adapters and pipelines

use std::sync::Arc;
use tracing::info;

use super::reward::RewardDispatcher;
use super::swap::SwapPipeline;
use crate::domain::asset::AssetRegistry;
use crate::domain::execution::{Broadcaster, CustodialKey, TransactionBuilder};
use crate::domain::quote::QuoteEngine;
use crate::domain::reward::RewardSelector;
use crate::infrastructure::api_clients::JupiterClient;
use crate::infrastructure::blockchain::SolanaRpcClient;
use crate::shared::config::{Config, SECRET_KEY_ENV};
use crate::shared::errors::PipelineError;

pub struct Services {
    pub config: Config,
    pub registry: Arc<AssetRegistry>,
    pub engine: Arc<QuoteEngine>,
    pub builder: Arc<TransactionBuilder>,
    pub broadcaster: Arc<Broadcaster>,
}

impl Services {
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        let registry = Arc::new(config.registry()?);
        let chain = Arc::new(SolanaRpcClient::new(
            config.rpc.url.clone(),
            config.rpc_timeout(),
            config.commitment()?,
        ));
        let jupiter = Arc::new(
            JupiterClient::new(
                Some(config.quote.base_url.clone()),
                std::time::Duration::from_secs(config.quote.request_timeout_secs),
            )
            .map_err(|e| PipelineError::Fatal(format!("cannot build HTTP client: {}", e)))?,
        );

        let engine = Arc::new(QuoteEngine::new(
            jupiter.clone(),
            registry.clone(),
            config.quote_engine(),
        ));
        let builder = Arc::new(TransactionBuilder::new(chain.clone(), jupiter, registry.clone()));
        let broadcaster = Arc::new(Broadcaster::new(chain.clone(), config.broadcast()));

        info!(
            "Using RPC {} with {} registered assets",
            chain.url(),
            registry.len()
        );
        Ok(Self {
            config,
            registry,
            engine,
            builder,
            broadcaster,
        })
    }

    /// Fresh swap session; must be called inside the runtime.
    pub fn swap_pipeline(&self) -> SwapPipeline {
        SwapPipeline::new(
            self.engine.clone(),
            self.config.debounce_window(),
            self.builder.clone(),
            self.broadcaster.clone(),
        )
    }

    /// Reward pipeline. Fails without a usable custodial key.
    pub fn reward_dispatcher(&self) -> Result<RewardDispatcher, PipelineError> {
        let key = CustodialKey::from_env(SECRET_KEY_ENV)?;
        let selector = RewardSelector::new(&self.registry, self.config.reward.clone())?;
        Ok(RewardDispatcher::new(
            selector,
            self.builder.clone(),
            self.broadcaster.clone(),
            key,
        ))
    }
}
