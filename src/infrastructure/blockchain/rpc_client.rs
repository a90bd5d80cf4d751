//! Solana RPC client backing the chain interface

use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_client::rpc_custom_error::{
    JSON_RPC_SERVER_ERROR_BLOCK_NOT_AVAILABLE, JSON_RPC_SERVER_ERROR_MIN_CONTEXT_SLOT_NOT_REACHED,
    JSON_RPC_SERVER_ERROR_NODE_UNHEALTHY,
};
use solana_client::rpc_request::RpcError;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{TransactionError, VersionedTransaction};
use solana_transaction_status::{TransactionStatus, UiTransactionEncoding};
use std::time::Duration;
use tracing::debug;

use crate::domain::execution::{ChainClient, ChainStatus, SendOptions};
use crate::shared::errors::ChainError;

/// Nonblocking Solana RPC client wrapper
pub struct SolanaRpcClient {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaRpcClient {
    pub fn new(rpc_url: String, timeout: Duration, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(rpc_url, timeout, commitment),
            commitment,
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

/// RPC server errors that say nothing about the request itself
const TRANSIENT_RPC_CODES: [i64; 3] = [
    JSON_RPC_SERVER_ERROR_NODE_UNHEALTHY,
    JSON_RPC_SERVER_ERROR_BLOCK_NOT_AVAILABLE,
    JSON_RPC_SERVER_ERROR_MIN_CONTEXT_SLOT_NOT_REACHED,
];

/// Transport failures (HTTP 429 included) and unhealthy-node answers are
/// transient; anything else the node answered is a rejection.
fn classify(err: ClientError) -> ChainError {
    match err.kind() {
        ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => ChainError::Connection(err.to_string()),
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. })
            if TRANSIENT_RPC_CODES.contains(code) =>
        {
            ChainError::Connection(err.to_string())
        }
        _ => ChainError::Rejected(err.to_string()),
    }
}

/// A retransmission the node has already executed
fn already_processed(err: &ClientError) -> bool {
    matches!(err.get_transaction_error(), Some(TransactionError::AlreadyProcessed))
}

fn chain_status(status: Option<TransactionStatus>, commitment: CommitmentConfig) -> ChainStatus {
    match status {
        None => ChainStatus::Unknown,
        Some(status) => {
            if let Some(err) = &status.err {
                ChainStatus::Failed {
                    slot: status.slot,
                    reason: err.to_string(),
                }
            } else if status.satisfies_commitment(commitment) {
                ChainStatus::Confirmed { slot: status.slot }
            } else {
                ChainStatus::Processed { slot: status.slot }
            }
        }
    }
}

#[async_trait]
impl ChainClient for SolanaRpcClient {
    async fn account_exists(&self, address: &Pubkey) -> Result<bool, ChainError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(classify)?;
        Ok(response.value.is_some())
    }

    async fn latest_blockhash(&self) -> Result<(Hash, u64), ChainError> {
        self.client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(classify)
    }

    async fn block_height(&self) -> Result<u64, ChainError> {
        self.client
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(classify)
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        options: SendOptions,
    ) -> Result<Signature, ChainError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: Some(self.commitment.commitment),
            encoding: Some(UiTransactionEncoding::Base64),
            max_retries: options.max_retries,
            min_context_slot: None,
        };
        let expected = transaction.signatures.first().copied().unwrap_or_default();
        debug!("sendTransaction {}", expected);
        match self.client.send_transaction_with_config(transaction, config).await {
            Ok(signature) => Ok(signature),
            Err(err) if already_processed(&err) => {
                debug!("{} already processed", expected);
                Ok(expected)
            }
            Err(err) => Err(classify(err)),
        }
    }

    async fn signature_status(&self, signature: &Signature) -> Result<ChainStatus, ChainError> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(classify)?;
        let status = response.value.into_iter().next().flatten();
        Ok(chain_status(status, self.commitment))
    }
}
