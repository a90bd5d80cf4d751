//! Turns quotes and transfer intents into unsigned, chain-native transactions

use solana_sdk::instruction::Instruction;
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ChainClient, TransactionKind, UnsignedTransaction, MAX_TRANSACTION_SIZE};
use crate::domain::asset::{Asset, AssetRegistry};
use crate::domain::quote::{Quote, SwapExecutionApi};
use crate::shared::errors::BuilderError;
use crate::shared::utils::{format_address, parse_address};

/// Reward transfer of `raw_amount` units of `asset` to `recipient`
#[derive(Debug, Clone, PartialEq)]
pub struct TransferIntent {
    pub recipient: Pubkey,
    pub asset: Asset,
    pub raw_amount: u64,
}

impl TransferIntent {
    pub fn new(recipient: &str, asset: Asset, raw_amount: u64) -> Result<Self, BuilderError> {
        let recipient = parse_address(recipient).map_err(BuilderError::RecipientInvalid)?;
        if !recipient.is_on_curve() {
            return Err(BuilderError::RecipientInvalid(format!(
                "{} is not a wallet address",
                recipient
            )));
        }
        if raw_amount == 0 {
            return Err(BuilderError::InvalidAmount("transfer amount must be positive".to_string()));
        }
        Ok(Self {
            recipient,
            asset,
            raw_amount,
        })
    }
}

pub struct TransactionBuilder {
    chain: Arc<dyn ChainClient>,
    swap_api: Arc<dyn SwapExecutionApi>,
    registry: Arc<AssetRegistry>,
}

impl TransactionBuilder {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        swap_api: Arc<dyn SwapExecutionApi>,
        registry: Arc<AssetRegistry>,
    ) -> Self {
        Self {
            chain,
            swap_api,
            registry,
        }
    }

    /// Build a reward transfer paid and authorized by `payer`.
    ///
    /// The recipient's holding account is derived from (recipient, mint). When it
    /// does not exist yet an idempotent create instruction is placed first, so a
    /// concurrent duplicate create cannot abort the transfer.
    pub async fn build_transfer(
        &self,
        intent: &TransferIntent,
        payer: &Pubkey,
    ) -> Result<UnsignedTransaction, BuilderError> {
        let asset = self.registered(&intent.asset)?;
        if intent.raw_amount == 0 {
            return Err(BuilderError::InvalidAmount("transfer amount must be positive".to_string()));
        }
        if intent.recipient == *payer {
            return Err(BuilderError::RecipientInvalid(
                "recipient is the paying wallet".to_string(),
            ));
        }

        let source = get_associated_token_address(payer, &asset.mint);
        let destination = get_associated_token_address(&intent.recipient, &asset.mint);

        let mut instructions: Vec<Instruction> = Vec::with_capacity(2);
        if !self.chain.account_exists(&destination).await? {
            debug!(
                "Holding account {} missing for {}, adding create instruction",
                format_address(&destination),
                format_address(&intent.recipient)
            );
            instructions.push(create_associated_token_account_idempotent(
                payer,
                &intent.recipient,
                &asset.mint,
                &spl_token::id(),
            ));
        }
        instructions.push(
            spl_token::instruction::transfer_checked(
                &spl_token::id(),
                &source,
                &asset.mint,
                &destination,
                payer,
                &[],
                intent.raw_amount,
                asset.decimals,
            )
            .map_err(|e| BuilderError::InvalidAmount(e.to_string()))?,
        );

        let (blockhash, last_valid_block_height) = self.chain.latest_blockhash().await?;
        let message = Message::new_with_blockhash(&instructions, Some(payer), &blockhash);
        let unsigned = UnsignedTransaction::new(
            VersionedMessage::Legacy(message),
            TransactionKind::Transfer,
            Some(last_valid_block_height),
        );
        validate_size(&unsigned)?;

        info!(
            "Built transfer of {} {} to {} ({} instructions)",
            asset.to_ui(intent.raw_amount),
            asset.symbol,
            format_address(&intent.recipient),
            unsigned.instruction_count()
        );
        Ok(unsigned)
    }

    /// Materialize a quote into an unsigned swap for `payer` via the execution service.
    pub async fn build_swap(
        &self,
        quote: &Quote,
        payer: &Pubkey,
    ) -> Result<UnsignedTransaction, BuilderError> {
        self.registered(&quote.request.input)?;
        self.registered(&quote.request.output)?;

        let swap = self.swap_api.swap_transaction(quote, payer).await?;
        let unsigned = UnsignedTransaction::new(
            swap.transaction.message,
            TransactionKind::Swap,
            swap.last_valid_block_height,
        );

        if unsigned.fee_payer() != Some(*payer) {
            warn!("Execution service returned a swap paid by {:?}", unsigned.fee_payer());
            return Err(BuilderError::Upstream(format!(
                "swap transaction fee payer is not {}",
                payer
            )));
        }
        if unsigned.instruction_count() == 0 {
            return Err(BuilderError::Upstream("swap transaction has no instructions".to_string()));
        }
        validate_size(&unsigned)?;

        info!(
            "Built swap {} {} -> {} {} ({} instructions)",
            quote.request.input.to_ui(quote.request.raw_input_amount),
            quote.request.input.symbol,
            quote.output_ui(),
            quote.request.output.symbol,
            unsigned.instruction_count()
        );
        Ok(unsigned)
    }

    fn registered(&self, asset: &Asset) -> Result<&Asset, BuilderError> {
        self.registry
            .by_mint(&asset.mint)
            .ok_or_else(|| BuilderError::UnknownAsset(format!("{} ({})", asset.symbol, asset.mint)))
    }
}

/// Reject messages that would not fit in a packet once signed
fn validate_size(unsigned: &UnsignedTransaction) -> Result<(), BuilderError> {
    let signatures = unsigned.required_signers().len();
    // compact-u16 signature count plus 64 bytes per signature
    let size = unsigned.message().serialize().len() + 1 + signatures * 64;
    if size > MAX_TRANSACTION_SIZE {
        return Err(BuilderError::Upstream(format!("transaction too large: {} bytes", size)));
    }
    Ok(())
}
