use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::quote::{Quote, QuoteApi, QuoteParams, SwapExecutionApi, SwapTransaction};
use crate::shared::errors::{BuilderError, QuoteError};

pub const JUPITER_API_URL: &str = "https://quote-api.jup.ag/v6";

/// Error codes the quote endpoint uses when no route exists
const NO_ROUTE_CODES: &[&str] = &["COULD_NOT_FIND_ANY_ROUTE", "NO_ROUTES_FOUND", "TOKEN_NOT_TRADABLE"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequest<'a> {
    quote_response: &'a Value,
    user_public_key: String,
    wrap_and_unwrap_sol: bool,
    dynamic_compute_unit_limit: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
    last_valid_block_height: Option<u64>,
}

/// Jupiter v6 quote and swap API client
pub struct JupiterClient {
    http_client: Client,
    base_url: String,
}

impl JupiterClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url
                .unwrap_or_else(|| JUPITER_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

fn quote_failure(status: StatusCode, body: &str) -> QuoteError {
    if NO_ROUTE_CODES.iter().any(|code| body.contains(code)) {
        return QuoteError::NoRoute;
    }
    QuoteError::Unavailable(format!("quote request failed with status {}: {}", status, body))
}

/// base64 of a bincode-serialized versioned transaction
fn decode_swap_transaction(encoded: &str) -> Result<VersionedTransaction, BuilderError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| BuilderError::Upstream(format!("swap transaction is not base64: {}", e)))?;
    bincode::deserialize(&bytes)
        .map_err(|e| BuilderError::Upstream(format!("swap transaction is malformed: {}", e)))
}

#[async_trait]
impl QuoteApi for JupiterClient {
    async fn fetch_quote(&self, params: &QuoteParams) -> Result<Value, QuoteError> {
        let query = [
            ("inputMint", params.input_mint.to_string()),
            ("outputMint", params.output_mint.to_string()),
            ("amount", params.amount.to_string()),
            ("slippageBps", params.slippage_bps.to_string()),
        ];
        debug!("GET {}/quote {:?}", self.base_url, query);

        let response = self
            .http_client
            .get(format!("{}/quote", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| QuoteError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Quote API returned {}: {}", status, body);
            return Err(quote_failure(status, &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| QuoteError::Unavailable(format!("malformed quote response: {}", e)))
    }
}

#[async_trait]
impl SwapExecutionApi for JupiterClient {
    async fn swap_transaction(
        &self,
        quote: &Quote,
        user: &Pubkey,
    ) -> Result<SwapTransaction, BuilderError> {
        let request = SwapRequest {
            quote_response: &quote.route,
            user_public_key: user.to_string(),
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: true,
        };

        let response = self
            .http_client
            .post(format!("{}/swap", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| BuilderError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Swap API returned {}: {}", status, body);
            return Err(BuilderError::Upstream(format!(
                "swap request failed with status {}: {}",
                status, body
            )));
        }

        let swap: SwapResponse = response
            .json()
            .await
            .map_err(|e| BuilderError::Upstream(format!("malformed swap response: {}", e)))?;

        Ok(SwapTransaction {
            transaction: decode_swap_transaction(&swap.swap_transaction)?,
            last_valid_block_height: swap.last_valid_block_height,
        })
    }
}
