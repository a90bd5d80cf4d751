//! Quoting and execution service interfaces

use async_trait::async_trait;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;

use super::Quote;
use crate::shared::errors::{BuilderError, QuoteError};

/// Parameters sent to the quoting service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteParams {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage_bps: u16,
}

/// Serialized unsigned swap returned by the execution service
#[derive(Debug, Clone)]
pub struct SwapTransaction {
    pub transaction: VersionedTransaction,
    pub last_valid_block_height: Option<u64>,
}

/// Quoting service. Returns the raw response body; shape validation happens in the engine.
#[async_trait]
pub trait QuoteApi: Send + Sync {
    async fn fetch_quote(&self, params: &QuoteParams) -> Result<Value, QuoteError>;
}

/// Execution service turning a quote into an unsigned transaction for `user`
#[async_trait]
pub trait SwapExecutionApi: Send + Sync {
    async fn swap_transaction(
        &self,
        quote: &Quote,
        user: &Pubkey,
    ) -> Result<SwapTransaction, BuilderError>;
}
