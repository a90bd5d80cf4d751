//! Execution domain - building, signing, broadcasting and confirming transactions

mod broadcaster;
mod chain;
mod keyed_lock;
mod signer;
mod transaction_builder;

pub use broadcaster::{BroadcastConfig, Broadcaster, Sent};
pub use chain::{ChainClient, ChainStatus, SendOptions};
pub use keyed_lock::{KeyedGuard, KeyedLocks};
pub use signer::{CustodialKey, InteractiveWallet, KeySource, TransactionSigner};
pub use transaction_builder::{TransactionBuilder, TransferIntent};

use chrono::{DateTime, Utc};
use serde::Serialize;
use solana_sdk::hash::Hash;
use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

/// Solana transaction size limit
pub const MAX_TRANSACTION_SIZE: usize = 1232;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Swap,
    Transfer,
}

/// Compiled message awaiting signatures.
///
/// Instruction order is fixed at build time: account bootstrap first, then the
/// value-moving instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransaction {
    message: VersionedMessage,
    kind: TransactionKind,
    last_valid_block_height: Option<u64>,
}

impl UnsignedTransaction {
    pub fn new(
        message: VersionedMessage,
        kind: TransactionKind,
        last_valid_block_height: Option<u64>,
    ) -> Self {
        Self {
            message,
            kind,
            last_valid_block_height,
        }
    }

    pub fn message(&self) -> &VersionedMessage {
        &self.message
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn last_valid_block_height(&self) -> Option<u64> {
        self.last_valid_block_height
    }

    pub fn fee_payer(&self) -> Option<Pubkey> {
        self.message.static_account_keys().first().copied()
    }

    pub fn recent_blockhash(&self) -> &Hash {
        self.message.recent_blockhash()
    }

    pub fn instruction_count(&self) -> usize {
        self.message.instructions().len()
    }

    /// Program invoked by each instruction, in execution order
    pub fn instruction_programs(&self) -> Vec<Pubkey> {
        let keys = self.message.static_account_keys();
        self.message
            .instructions()
            .iter()
            .filter_map(|ix| keys.get(ix.program_id_index as usize).copied())
            .collect()
    }

    /// Accounts whose signatures the message requires
    pub fn required_signers(&self) -> &[Pubkey] {
        let keys = self.message.static_account_keys();
        let required = self.message.header().num_required_signatures as usize;
        &keys[..required.min(keys.len())]
    }
}

/// Fully signed transaction. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    transaction: VersionedTransaction,
    kind: TransactionKind,
    last_valid_block_height: Option<u64>,
}

impl SignedTransaction {
    pub(crate) fn new(
        transaction: VersionedTransaction,
        kind: TransactionKind,
        last_valid_block_height: Option<u64>,
    ) -> Self {
        Self {
            transaction,
            kind,
            last_valid_block_height,
        }
    }

    /// The fee payer's signature, which is the transaction id on chain
    pub fn signature(&self) -> Signature {
        self.transaction
            .signatures
            .first()
            .copied()
            .unwrap_or_default()
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.transaction
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn last_valid_block_height(&self) -> Option<u64> {
        self.last_valid_block_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Confirmed,
    Failed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Confirmed => "confirmed",
            SubmissionStatus::Failed => "failed",
        }
    }
}

/// Outcome of a submission or status query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResult {
    pub signature: Signature,
    pub status: SubmissionStatus,
    pub slot: Option<u64>,
    pub error: Option<String>,
    pub send_attempts: u32,
    pub reported_at: DateTime<Utc>,
}

impl SubmissionResult {
    pub fn new(signature: Signature, status: SubmissionStatus) -> Self {
        Self {
            signature,
            status,
            slot: None,
            error: None,
            send_attempts: 0,
            reported_at: Utc::now(),
        }
    }
}
