//! Chain RPC interface

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use crate::shared::errors::ChainError;

/// Broadcast options passed through to the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    /// Node-side rebroadcast bound
    pub max_retries: Option<usize>,
}

/// What the chain currently reports for a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    /// Not seen by the node (yet)
    Unknown,
    /// Seen but below the confirmation commitment
    Processed { slot: u64 },
    Confirmed { slot: u64 },
    Failed { slot: u64, reason: String },
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn account_exists(&self, address: &Pubkey) -> Result<bool, ChainError>;

    /// Recent blockhash and the last block height at which it is still valid
    async fn latest_blockhash(&self) -> Result<(Hash, u64), ChainError>;

    async fn block_height(&self) -> Result<u64, ChainError>;

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        options: SendOptions,
    ) -> Result<Signature, ChainError>;

    async fn signature_status(&self, signature: &Signature) -> Result<ChainStatus, ChainError>;
}
