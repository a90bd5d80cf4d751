//! HTTP surface for reward dispatch

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::reward::{RewardDispatcher, RewardReceipt};
use crate::domain::execution::SubmissionResult;
use crate::shared::errors::PipelineError;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<RewardDispatcher>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendTokenRequest {
    recipient_address: Option<String>,
    amount: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AirdropRequest {
    recipient_address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferResponse {
    message: String,
    tx_id: String,
    amount: String,
    request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    tx_id: String,
    status: String,
    slot: Option<u64>,
    error: Option<String>,
}

type ApiResult<T> = Result<Json<T>, Response>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/send_token",
            post(send_token).fallback(method_not_allowed),
        )
        .route("/api/airdrop", post(airdrop).fallback(method_not_allowed))
        .route("/api/status/:signature", get(status))
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(json!({ "message": text.into() }))).into_response()
}

fn invalid_request() -> Response {
    message(StatusCode::BAD_REQUEST, "Invalid request data")
}

async fn method_not_allowed() -> Response {
    message(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// The only place pipeline errors become HTTP responses.
fn error_response(err: PipelineError) -> Response {
    match err {
        PipelineError::InvalidInput(reason) => message(StatusCode::BAD_REQUEST, reason),
        PipelineError::UpstreamUnavailable(reason) => {
            warn!("Upstream unavailable: {}", reason);
            message(StatusCode::BAD_GATEWAY, reason)
        }
        PipelineError::Ambiguous { signature } => (
            StatusCode::ACCEPTED,
            Json(json!({
                "message": "Transfer submitted but not yet confirmed; query its status before retrying",
                "txId": signature.to_string(),
                "status": "pending",
            })),
        )
            .into_response(),
        PipelineError::ChainRejected { signature, reason } => {
            error!("Transfer rejected ({:?}): {}", signature, reason);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "message": "Failed to transfer SPL tokens",
                    "error": reason,
                    "txId": signature.map(|s| s.to_string()),
                })),
            )
                .into_response()
        }
        PipelineError::Fatal(reason) => {
            error!("Transfer pipeline failure: {}", reason);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Failed to transfer SPL tokens", "error": reason })),
            )
                .into_response()
        }
    }
}

fn transfer_response(receipt: RewardReceipt) -> Json<TransferResponse> {
    Json(TransferResponse {
        message: format!("SPL tokens ({}) transferred successfully", receipt.asset),
        tx_id: receipt.result.signature.to_string(),
        amount: receipt.amount,
        request_id: receipt.request_id,
    })
}

fn required(field: Option<String>) -> Result<String, Response> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(invalid_request)
}

/// POST /api/send_token - transfer an explicit amount
async fn send_token(
    State(state): State<AppState>,
    body: Result<Json<SendTokenRequest>, JsonRejection>,
) -> ApiResult<TransferResponse> {
    let Json(request) = body.map_err(|_| invalid_request())?;
    let recipient = required(request.recipient_address)?;
    let amount = request.amount.filter(|a| *a > 0).ok_or_else(invalid_request)?;

    info!("send_token request for {} ({} units)", recipient, amount);
    let receipt = state
        .dispatcher
        .send(&recipient, amount)
        .await
        .map_err(error_response)?;
    Ok(transfer_response(receipt))
}

/// POST /api/airdrop - transfer a randomly selected reward
async fn airdrop(
    State(state): State<AppState>,
    body: Result<Json<AirdropRequest>, JsonRejection>,
) -> ApiResult<TransferResponse> {
    let Json(request) = body.map_err(|_| invalid_request())?;
    let recipient = required(request.recipient_address)?;

    info!("airdrop request for {}", recipient);
    let receipt = state
        .dispatcher
        .airdrop(&recipient)
        .await
        .map_err(error_response)?;
    Ok(transfer_response(receipt))
}

/// GET /api/status/:signature
async fn status(
    State(state): State<AppState>,
    Path(signature): Path<String>,
) -> ApiResult<StatusResponse> {
    let signature = Signature::from_str(&signature)
        .map_err(|_| message(StatusCode::BAD_REQUEST, "Invalid transaction signature"))?;
    let result: SubmissionResult = state
        .dispatcher
        .status(&signature)
        .await
        .map_err(error_response)?;

    Ok(Json(StatusResponse {
        tx_id: result.signature.to_string(),
        status: result.status.as_str().to_string(),
        slot: result.slot,
        error: result.error,
    }))
}
