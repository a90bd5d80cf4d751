//! Broadcast and confirmation.
//!
//! `Built -> Submitted -> {Confirmed | Failed | TimedOut}`. Only the same signed
//! bytes are ever retransmitted; a timeout stops waiting but does not cancel the
//! submission, so callers must query status before building anything new.

use solana_sdk::signature::Signature;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{ChainClient, ChainStatus, SendOptions, SignedTransaction, SubmissionResult, SubmissionStatus};
use crate::shared::errors::{ChainError, SubmitError};

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub skip_preflight: bool,
    /// Client-side sends of the same bytes, first attempt included
    pub max_send_attempts: u32,
    pub rpc_max_retries: Option<usize>,
    pub retry_delay: Duration,
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
    /// Bound on any single RPC call
    pub call_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            skip_preflight: true,
            max_send_attempts: 2,
            rpc_max_retries: Some(2),
            retry_delay: Duration::from_millis(500),
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// A transaction handed to the network, acknowledged or not
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sent {
    pub signature: Signature,
    pub attempts: u32,
    /// False when every attempt lost its connection before the node answered
    pub acknowledged: bool,
}

pub struct Broadcaster {
    chain: Arc<dyn ChainClient>,
    config: BroadcastConfig,
}

impl Broadcaster {
    pub fn new(chain: Arc<dyn ChainClient>, config: BroadcastConfig) -> Self {
        Self { chain, config }
    }

    /// Send and wait for confirmation.
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<SubmissionResult, SubmitError> {
        let sent = self.send(signed).await?;
        let mut result = self
            .confirm(&sent.signature, signed.last_valid_block_height())
            .await?;
        result.send_attempts = sent.attempts;
        Ok(result)
    }

    /// Hand the signed bytes to the network. Connection failures retransmit the
    /// identical transaction, bounded by `max_send_attempts`.
    ///
    /// Running out of attempts is not an error: the bytes may have reached the
    /// node before the connection dropped, so the caller still has to confirm
    /// the returned signature. Only an explicit refusal fails here.
    pub async fn send(&self, signed: &SignedTransaction) -> Result<Sent, SubmitError> {
        let options = SendOptions {
            skip_preflight: self.config.skip_preflight,
            max_retries: self.config.rpc_max_retries,
        };
        let expected = signed.signature();
        let max_attempts = self.config.max_send_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let sent = self
                .bounded(self.chain.send_transaction(signed.transaction(), options))
                .await;
            match sent {
                Ok(signature) => {
                    if signature != expected {
                        warn!("Node reported signature {} for {}", signature, expected);
                    }
                    info!("Submitted {} (attempt {}/{})", expected, attempts, max_attempts);
                    return Ok(Sent {
                        signature: expected,
                        attempts,
                        acknowledged: true,
                    });
                }
                Err(ChainError::Rejected(reason)) => {
                    warn!("Transaction {} rejected: {}", expected, reason);
                    return Err(SubmitError::RejectedByNetwork {
                        signature: Some(expected),
                        reason,
                    });
                }
                Err(ChainError::Connection(reason)) => {
                    warn!(
                        "Send attempt {}/{} for {} failed: {}",
                        attempts, max_attempts, expected, reason
                    );
                    if attempts >= max_attempts {
                        warn!("No acknowledgement for {}; waiting on its status", expected);
                        return Ok(Sent {
                            signature: expected,
                            attempts,
                            acknowledged: false,
                        });
                    }
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// Poll until the signature is confirmed, fails, expires, or the deadline passes.
    pub async fn confirm(
        &self,
        signature: &Signature,
        last_valid_block_height: Option<u64>,
    ) -> Result<SubmissionResult, SubmitError> {
        let deadline = Instant::now() + self.config.confirm_timeout;

        loop {
            match self.bounded(self.chain.signature_status(signature)).await {
                Ok(status) => {
                    if let Some(outcome) = settled(signature, status) {
                        return outcome;
                    }
                }
                Err(e) => debug!("Status poll for {} failed: {}", signature, e),
            }

            if let Some(last_valid) = last_valid_block_height {
                if let Ok(height) = self.bounded(self.chain.block_height()).await {
                    if height > last_valid {
                        // It may have landed in the last valid blocks since the poll above.
                        match self.bounded(self.chain.signature_status(signature)).await {
                            Ok(ChainStatus::Unknown) => {
                                warn!(
                                    "Blockhash for {} expired at height {} (now {})",
                                    signature, last_valid, height
                                );
                                return Err(SubmitError::Expired {
                                    signature: *signature,
                                });
                            }
                            Ok(status) => {
                                if let Some(outcome) = settled(signature, status) {
                                    return outcome;
                                }
                            }
                            Err(e) => debug!("Status recheck for {} failed: {}", signature, e),
                        }
                    }
                }
            }

            if Instant::now() >= deadline {
                warn!(
                    "Confirmation of {} timed out after {:?}; it may still land",
                    signature, self.config.confirm_timeout
                );
                return Err(SubmitError::TimedOut {
                    signature: *signature,
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// One-shot status query, for callers following up on a timeout.
    pub async fn status(&self, signature: &Signature) -> Result<SubmissionResult, SubmitError> {
        let status = self
            .bounded(self.chain.signature_status(signature))
            .await
            .map_err(|e| SubmitError::ConnectionError(e.to_string()))?;

        let result = match status {
            ChainStatus::Unknown => SubmissionResult::new(*signature, SubmissionStatus::Pending),
            ChainStatus::Processed { slot } => {
                let mut result = SubmissionResult::new(*signature, SubmissionStatus::Pending);
                result.slot = Some(slot);
                result
            }
            ChainStatus::Confirmed { slot } => {
                let mut result = SubmissionResult::new(*signature, SubmissionStatus::Confirmed);
                result.slot = Some(slot);
                result
            }
            ChainStatus::Failed { slot, reason } => {
                let mut result = SubmissionResult::new(*signature, SubmissionStatus::Failed);
                result.slot = Some(slot);
                result.error = Some(reason);
                result
            }
        };
        Ok(result)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ChainError>>,
    ) -> Result<T, ChainError> {
        tokio::time::timeout(self.config.call_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(ChainError::Connection(format!(
                    "RPC call timed out after {:?}",
                    self.config.call_timeout
                )))
            })
    }
}

/// Terminal outcome for a polled status, `None` while still settling.
fn settled(
    signature: &Signature,
    status: ChainStatus,
) -> Option<Result<SubmissionResult, SubmitError>> {
    match status {
        ChainStatus::Confirmed { slot } => {
            info!("Transaction {} confirmed in slot {}", signature, slot);
            let mut result = SubmissionResult::new(*signature, SubmissionStatus::Confirmed);
            result.slot = Some(slot);
            Some(Ok(result))
        }
        ChainStatus::Failed { slot, reason } => {
            warn!("Transaction {} failed in slot {}: {}", signature, slot, reason);
            Some(Err(SubmitError::RejectedByNetwork {
                signature: Some(*signature),
                reason,
            }))
        }
        status => {
            debug!("Transaction {} status: {:?}", signature, status);
            None
        }
    }
}
