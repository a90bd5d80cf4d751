//! Swap pipeline: debounced quote -> build -> wallet signature -> broadcast -> confirm

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::execution::{
    Broadcaster, InteractiveWallet, KeySource, SubmissionResult, TransactionBuilder,
    TransactionSigner,
};
use crate::domain::quote::{Quote, QuoteEngine, QuoteSession};
use crate::shared::errors::{PipelineError, SignError};
use crate::shared::utils::explorer_url;

#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub quote: Quote,
    pub result: SubmissionResult,
    pub explorer_url: String,
}

/// One user's swap session. Owns the current quote; nothing is shared across sessions.
pub struct SwapPipeline {
    session: QuoteSession,
    builder: Arc<TransactionBuilder>,
    broadcaster: Arc<Broadcaster>,
}

impl SwapPipeline {
    pub fn new(
        engine: Arc<QuoteEngine>,
        debounce: Duration,
        builder: Arc<TransactionBuilder>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            session: QuoteSession::spawn(engine, debounce),
            builder,
            broadcaster,
        }
    }

    pub fn session(&self) -> &QuoteSession {
        &self.session
    }

    /// Feed one input change. Returns the request's sequence number.
    pub fn update_input(
        &self,
        input_symbol: &str,
        output_symbol: &str,
        ui_amount: &str,
    ) -> Result<u64, PipelineError> {
        Ok(self
            .session
            .submit_input(input_symbol, output_symbol, ui_amount)?)
    }

    /// Submit input and wait for the debounced quote that answers it (or a newer one).
    pub async fn quote(
        &self,
        input_symbol: &str,
        output_symbol: &str,
        ui_amount: &str,
    ) -> Result<Quote, PipelineError> {
        let sequence = self.update_input(input_symbol, output_symbol, ui_amount)?;
        let update = self
            .session
            .wait_for(sequence)
            .await
            .ok_or_else(|| PipelineError::Fatal("quote session closed".to_string()))?;
        Ok(update.result?)
    }

    /// Execute the session's current quote with the connected wallet.
    ///
    /// A rejected signature leaves nothing broadcast. A `PipelineError::Ambiguous`
    /// means the swap may still land; poll its status instead of swapping again.
    pub async fn execute(
        &self,
        wallet: Option<&dyn InteractiveWallet>,
    ) -> Result<SwapOutcome, PipelineError> {
        let wallet = wallet.ok_or(SignError::NoWallet)?;
        let quote = self.session.quote_for_execution()?;

        let unsigned = self.builder.build_swap(&quote, &wallet.pubkey()).await?;
        let signed = TransactionSigner::sign(&unsigned, KeySource::Wallet(Some(wallet))).await?;

        let result = match self.broadcaster.submit(&signed).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Swap {} did not confirm: {}", signed.signature(), e);
                return Err(e.into());
            }
        };
        let explorer_url = explorer_url(&result.signature.to_string());
        info!(
            "Swapped {} {} for {} {}: {}",
            quote.request.input.to_ui(quote.request.raw_input_amount),
            quote.request.input.symbol,
            quote.output_ui(),
            quote.request.output.symbol,
            explorer_url
        );

        Ok(SwapOutcome {
            quote,
            result,
            explorer_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::AssetRegistry;
    use crate::domain::execution::{BroadcastConfig, SubmissionStatus};
    use crate::domain::quote::QuoteEngineConfig;
    use crate::shared::errors::QuoteError;
    use crate::shared::testing::{ChainBehavior, MockChain, MockQuoteApi, MockSwapApi, MockWallet};
    use serde_json::json;

    struct Fixture {
        quotes: Arc<MockQuoteApi>,
        swaps: Arc<MockSwapApi>,
        chain: Arc<MockChain>,
        pipeline: SwapPipeline,
    }

    fn fixture() -> Fixture {
        let quotes = Arc::new(MockQuoteApi::new());
        quotes.respond_with(Ok(json!({"outAmount": "4500000000", "slippageBps": 50})));
        let swaps = Arc::new(MockSwapApi::new());
        let chain = Arc::new(MockChain::new());
        let registry = Arc::new(AssetRegistry::mainnet().unwrap());

        let engine = Arc::new(QuoteEngine::new(
            quotes.clone(),
            registry.clone(),
            QuoteEngineConfig::default(),
        ));
        let builder = Arc::new(TransactionBuilder::new(chain.clone(), swaps.clone(), registry));
        let broadcaster = Arc::new(Broadcaster::new(chain.clone(), BroadcastConfig::default()));
        let pipeline = SwapPipeline::new(engine, Duration::from_millis(500), builder, broadcaster);

        Fixture {
            quotes,
            swaps,
            chain,
            pipeline,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_then_swap_confirms() {
        let f = fixture();
        let wallet = MockWallet::approving();

        let quote = f.pipeline.quote("USDC", "BONK", "1.5").await.unwrap();
        assert_eq!(quote.request.raw_input_amount, 1_500_000);
        assert_eq!(quote.raw_output_amount, 4_500_000_000);

        let outcome = f.pipeline.execute(Some(&wallet)).await.unwrap();
        assert_eq!(outcome.result.status, SubmissionStatus::Confirmed);
        assert_eq!(f.chain.landed(), vec![outcome.result.signature]);
        assert!(outcome.explorer_url.starts_with("https://solscan.io/tx/"));
        assert_eq!(f.swaps.requested_users(), vec![wallet.pubkey()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_route_builds_nothing() {
        let f = fixture();
        f.quotes.respond_with(Ok(json!({"routePlan": []})));
        let wallet = MockWallet::approving();

        let err = f.pipeline.quote("USDC", "BONK", "1").await.unwrap_err();
        assert_eq!(err, PipelineError::from(QuoteError::NoRoute));

        assert!(f.pipeline.execute(Some(&wallet)).await.is_err());
        assert!(f.swaps.requested_users().is_empty());
        assert_eq!(wallet.requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_amount_fails_before_network() {
        let f = fixture();
        let err = f.pipeline.quote("USDC", "BONK", "-3").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(f.quotes.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_signature_broadcasts_nothing() {
        let f = fixture();
        f.pipeline.quote("USDC", "BONK", "1").await.unwrap();

        let err = f
            .pipeline
            .execute(Some(&MockWallet::rejecting()))
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::from(SignError::UserRejected));
        assert_eq!(f.chain.send_count(), 0);

        let err = f.pipeline.execute(None).await.unwrap_err();
        assert_eq!(err, PipelineError::from(SignError::NoWallet));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_quote_is_not_executed() {
        let f = fixture();
        f.pipeline.quote("USDC", "BONK", "1").await.unwrap();
        // New input arrives; its quote has not been published yet.
        f.pipeline.update_input("USDC", "BONK", "2").unwrap();

        let err = f
            .pipeline
            .execute(Some(&MockWallet::approving()))
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::from(QuoteError::Stale));
        assert!(f.swaps.requested_users().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_deadline_is_ambiguous() {
        let f = fixture();
        f.chain.set_behavior(ChainBehavior::NeverConfirm);
        f.pipeline.quote("USDC", "BONK", "1").await.unwrap();

        let err = f
            .pipeline
            .execute(Some(&MockWallet::approving()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Ambiguous { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_send_responses_do_not_hide_the_swap() {
        let f = fixture();
        f.pipeline.quote("USDC", "BONK", "1").await.unwrap();

        // Delivered but unacknowledged: the swap confirms from its status.
        f.chain.drop_next_sends(5, true);
        let outcome = f
            .pipeline
            .execute(Some(&MockWallet::approving()))
            .await
            .unwrap();
        assert_eq!(f.chain.landed(), vec![outcome.result.signature]);

        // Never delivered: the caller gets the signature to poll, not a retry hint.
        f.pipeline.quote("USDC", "BONK", "2").await.unwrap();
        f.chain.drop_next_sends(5, false);
        let err = f
            .pipeline
            .execute(Some(&MockWallet::approving()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Ambiguous { .. }));
    }
}
