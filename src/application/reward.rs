//! Reward dispatch: select -> lock recipient -> build -> custodial sign -> broadcast -> confirm

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, info_span, warn, Instrument};

use crate::domain::execution::{
    Broadcaster, CustodialKey, KeySource, KeyedLocks, SubmissionResult, TransactionBuilder,
    TransactionSigner, TransferIntent,
};
use crate::domain::reward::RewardSelector;
use crate::shared::errors::PipelineError;
use crate::shared::utils::{format_address, generate_id};

#[derive(Debug, Clone)]
pub struct RewardReceipt {
    pub request_id: String,
    pub recipient: Pubkey,
    pub asset: String,
    /// Transferred amount in token units
    pub amount: String,
    pub raw_amount: u64,
    pub result: SubmissionResult,
}

pub struct RewardDispatcher {
    selector: RewardSelector,
    builder: Arc<TransactionBuilder>,
    broadcaster: Arc<Broadcaster>,
    key: CustodialKey,
    recipients: KeyedLocks<(Pubkey, Pubkey)>,
    /// One build+sign+send in flight per custodial key
    custodial_queue: Mutex<()>,
}

impl RewardDispatcher {
    pub fn new(
        selector: RewardSelector,
        builder: Arc<TransactionBuilder>,
        broadcaster: Arc<Broadcaster>,
        key: CustodialKey,
    ) -> Self {
        let (min, max) = selector.bounds();
        info!(
            "Reward dispatcher paying {}-{} {} from {}",
            min,
            max,
            selector.asset().symbol,
            key.pubkey()
        );
        Self {
            selector,
            builder,
            broadcaster,
            key,
            recipients: KeyedLocks::new(),
            custodial_queue: Mutex::new(()),
        }
    }

    pub fn payer(&self) -> Pubkey {
        self.key.pubkey()
    }

    /// Send a randomly drawn reward to `recipient`.
    pub async fn airdrop(&self, recipient: &str) -> Result<RewardReceipt, PipelineError> {
        let intent = self.selector.select_reward(recipient)?;
        self.dispatch(intent).await
    }

    /// Send an explicit whole-token amount, which must lie within the reward bounds.
    pub async fn send(&self, recipient: &str, amount: u64) -> Result<RewardReceipt, PipelineError> {
        let intent = self.selector.intent_for(recipient, amount)?;
        self.dispatch(intent).await
    }

    pub async fn status(&self, signature: &Signature) -> Result<SubmissionResult, PipelineError> {
        Ok(self.broadcaster.status(signature).await?)
    }

    async fn dispatch(&self, intent: TransferIntent) -> Result<RewardReceipt, PipelineError> {
        let request_id = generate_id();
        let span = info_span!(
            "reward",
            request_id = %request_id,
            recipient = %format_address(&intent.recipient)
        );
        self.dispatch_inner(request_id, intent).instrument(span).await
    }

    async fn dispatch_inner(
        &self,
        request_id: String,
        intent: TransferIntent,
    ) -> Result<RewardReceipt, PipelineError> {
        // Held until confirmation so the next build for this pair sees the created account.
        let _recipient = self
            .recipients
            .lock((intent.recipient, intent.asset.mint))
            .await;

        let payer = self.payer();
        let (signed, sent) = {
            let _queue = self.custodial_queue.lock().await;
            let unsigned = self.builder.build_transfer(&intent, &payer).await?;
            let signed = TransactionSigner::sign(&unsigned, KeySource::Custodial(&self.key)).await?;
            let sent = self.broadcaster.send(&signed).await?;
            (signed, sent)
        };

        // Unacknowledged sends may still have landed; only their status decides.
        let mut result = match self
            .broadcaster
            .confirm(&sent.signature, signed.last_valid_block_height())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("Reward {} not confirmed: {}", sent.signature, e);
                return Err(e.into());
            }
        };
        result.send_attempts = sent.attempts;

        let amount = intent.asset.to_ui(intent.raw_amount);
        info!(
            "Transferred {} {} to {} in {}",
            amount,
            intent.asset.symbol,
            intent.recipient,
            result.signature
        );
        Ok(RewardReceipt {
            request_id,
            recipient: intent.recipient,
            asset: intent.asset.symbol,
            amount,
            raw_amount: intent.raw_amount,
            result,
        })
    }
}
