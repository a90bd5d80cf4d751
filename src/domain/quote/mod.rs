//! Quote domain - priced routes from the external quoting service

mod quote_api;
mod quote_engine;
mod quote_session;

pub use quote_api::{QuoteApi, QuoteParams, SwapExecutionApi, SwapTransaction};
pub use quote_engine::{QuoteEngine, QuoteEngineConfig};
pub use quote_session::{QuoteSession, QuoteUpdate};

use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::asset::Asset;
use crate::shared::errors::QuoteError;

/// Validated request for a priced route
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub input: Asset,
    pub output: Asset,
    pub raw_input_amount: u64,
}

impl QuoteRequest {
    pub fn new(input: Asset, output: Asset, raw_input_amount: u64) -> Result<Self, QuoteError> {
        if input.mint == output.mint {
            return Err(QuoteError::SameAsset(input.symbol));
        }
        if raw_input_amount == 0 {
            return Err(QuoteError::InvalidAmount("amount must be positive".to_string()));
        }
        Ok(Self {
            input,
            output,
            raw_input_amount,
        })
    }
}

/// Priced, short-lived route
#[derive(Debug, Clone)]
pub struct Quote {
    pub request: QuoteRequest,
    pub raw_output_amount: u64,
    /// Minimum output after slippage, when the service reports it
    pub other_amount_threshold: Option<u64>,
    pub slippage_bps: u16,
    pub price_impact_pct: Option<f64>,
    pub route_labels: Vec<String>,
    pub context_slot: Option<u64>,
    /// Service response kept verbatim for the execution call
    pub route: Value,
    pub fetched_at: Instant,
    pub ttl: Duration,
    /// Session sequence number; zero when issued outside a session
    pub sequence: u64,
}

impl Quote {
    pub fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() >= self.ttl
    }

    pub fn output_ui(&self) -> String {
        self.request.output.to_ui(self.raw_output_amount)
    }
}

/// Validate a quoting-service response against the shape the execution call needs.
///
/// A missing, empty or zero `outAmount` means the service found no route.
pub(crate) fn parse_quote_response(
    request: &QuoteRequest,
    response: Value,
    slippage_bps: u16,
    ttl: Duration,
) -> Result<Quote, QuoteError> {
    let object = response
        .as_object()
        .ok_or_else(|| QuoteError::Unavailable("quote response is not an object".to_string()))?;

    let raw_output_amount = match object.get("outAmount") {
        None | Some(Value::Null) => return Err(QuoteError::NoRoute),
        Some(value) => amount_field(value)
            .ok_or_else(|| QuoteError::Unavailable(format!("malformed outAmount: {}", value)))?,
    };
    if raw_output_amount == 0 {
        return Err(QuoteError::NoRoute);
    }

    for (field, expected) in [
        ("inputMint", &request.input.mint),
        ("outputMint", &request.output.mint),
    ] {
        if let Some(value) = object.get(field) {
            let mint = value
                .as_str()
                .and_then(|s| Pubkey::from_str(s).ok())
                .ok_or_else(|| QuoteError::Unavailable(format!("malformed {}", field)))?;
            if mint != *expected {
                return Err(QuoteError::Unavailable(format!(
                    "{} mismatch: expected {}, got {}",
                    field, expected, mint
                )));
            }
        }
    }

    let other_amount_threshold = object.get("otherAmountThreshold").and_then(amount_field);
    let slippage_bps = object
        .get("slippageBps")
        .and_then(Value::as_u64)
        .and_then(|v| u16::try_from(v).ok())
        .unwrap_or(slippage_bps);
    let price_impact_pct = object.get("priceImpactPct").and_then(|v| match v {
        Value::String(s) => s.parse::<f64>().ok(),
        other => other.as_f64(),
    });
    let route_labels = object
        .get("routePlan")
        .and_then(Value::as_array)
        .map(|steps| {
            steps
                .iter()
                .filter_map(|step| step.pointer("/swapInfo/label").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let context_slot = object.get("contextSlot").and_then(Value::as_u64);

    Ok(Quote {
        request: request.clone(),
        raw_output_amount,
        other_amount_threshold,
        slippage_bps,
        price_impact_pct,
        route_labels,
        context_slot,
        route: response,
        fetched_at: Instant::now(),
        ttl,
        sequence: 0,
    })
}

/// Amounts arrive as decimal strings, occasionally as bare integers.
fn amount_field(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
