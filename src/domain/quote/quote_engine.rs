//! Quote engine - validates input, calls the quoting service, checks the response shape

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{parse_quote_response, Quote, QuoteApi, QuoteParams, QuoteRequest};
use crate::domain::asset::AssetRegistry;
use crate::shared::errors::QuoteError;

#[derive(Debug, Clone)]
pub struct QuoteEngineConfig {
    pub slippage_bps: u16,
    pub quote_ttl: Duration,
    pub request_timeout: Duration,
}

impl Default for QuoteEngineConfig {
    fn default() -> Self {
        Self {
            slippage_bps: 50,
            quote_ttl: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct QuoteEngine {
    api: Arc<dyn QuoteApi>,
    registry: Arc<AssetRegistry>,
    config: QuoteEngineConfig,
}

impl QuoteEngine {
    pub fn new(api: Arc<dyn QuoteApi>, registry: Arc<AssetRegistry>, config: QuoteEngineConfig) -> Self {
        Self {
            api,
            registry,
            config,
        }
    }

    /// Build a request from user-facing symbols and a decimal amount string.
    pub fn request(
        &self,
        input_symbol: &str,
        output_symbol: &str,
        ui_amount: &str,
    ) -> Result<QuoteRequest, QuoteError> {
        let input = self
            .registry
            .by_symbol(input_symbol)
            .ok_or_else(|| QuoteError::UnknownAsset(input_symbol.to_string()))?;
        let output = self
            .registry
            .by_symbol(output_symbol)
            .ok_or_else(|| QuoteError::UnknownAsset(output_symbol.to_string()))?;
        let raw = input.to_raw(ui_amount).map_err(QuoteError::InvalidAmount)?;
        QuoteRequest::new(input.clone(), output.clone(), raw)
    }

    /// Fetch a priced route. Errors are reported, never retried here.
    pub async fn get_quote(&self, request: &QuoteRequest) -> Result<Quote, QuoteError> {
        if request.raw_input_amount == 0 {
            return Err(QuoteError::InvalidAmount("amount must be positive".to_string()));
        }
        if request.input.mint == request.output.mint {
            return Err(QuoteError::SameAsset(request.input.symbol.clone()));
        }

        let params = QuoteParams {
            input_mint: request.input.mint,
            output_mint: request.output.mint,
            amount: request.raw_input_amount,
            slippage_bps: self.config.slippage_bps,
        };
        debug!(
            "Requesting quote {} {} -> {}",
            request.input.to_ui(request.raw_input_amount),
            request.input.symbol,
            request.output.symbol
        );

        let response = tokio::time::timeout(self.config.request_timeout, self.api.fetch_quote(&params))
            .await
            .map_err(|_| {
                QuoteError::Unavailable(format!(
                    "quote request timed out after {:?}",
                    self.config.request_timeout
                ))
            })??;

        match parse_quote_response(request, response, self.config.slippage_bps, self.config.quote_ttl) {
            Ok(quote) => {
                info!(
                    "Quote: {} {} -> {} {} via [{}]",
                    request.input.to_ui(request.raw_input_amount),
                    request.input.symbol,
                    quote.output_ui(),
                    request.output.symbol,
                    quote.route_labels.join(", ")
                );
                Ok(quote)
            }
            Err(e) => {
                warn!("Quote {} -> {} failed: {}", request.input.symbol, request.output.symbol, e);
                Err(e)
            }
        }
    }
}
