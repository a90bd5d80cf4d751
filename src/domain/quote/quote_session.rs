//! Per-session quote coalescing.
//!
//! Every submitted request gets a monotonically increasing sequence number. A
//! single actor task waits for a quiet window after the last submission, fetches
//! only the newest request, and publishes the result only if no newer request
//! was issued in the meantime. Everything else is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{Quote, QuoteEngine, QuoteRequest};
use crate::shared::errors::QuoteError;

/// Latest published quote outcome for a session
#[derive(Debug, Clone)]
pub struct QuoteUpdate {
    pub sequence: u64,
    pub result: Result<Quote, QuoteError>,
}

pub struct QuoteSession {
    engine: Arc<QuoteEngine>,
    requests: mpsc::UnboundedSender<(u64, QuoteRequest)>,
    issued: Arc<AtomicU64>,
    publisher: Arc<watch::Sender<Option<QuoteUpdate>>>,
    updates: watch::Receiver<Option<QuoteUpdate>>,
    worker: JoinHandle<()>,
}

impl QuoteSession {
    /// Start the coalescing worker. Must be called inside a tokio runtime.
    pub fn spawn(engine: Arc<QuoteEngine>, quiet_window: Duration) -> Self {
        let (requests, inbox) = mpsc::unbounded_channel();
        let (publisher, updates) = watch::channel(None);
        let publisher = Arc::new(publisher);
        let issued = Arc::new(AtomicU64::new(0));

        let worker = tokio::spawn(run_worker(
            engine.clone(),
            inbox,
            issued.clone(),
            publisher.clone(),
            quiet_window,
        ));

        Self {
            engine,
            requests,
            issued,
            publisher,
            updates,
            worker,
        }
    }

    /// Queue a request; returns its sequence number.
    pub fn submit(&self, request: QuoteRequest) -> u64 {
        let sequence = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        if self.requests.send((sequence, request)).is_err() {
            publish(
                &self.publisher,
                &self.issued,
                QuoteUpdate {
                    sequence,
                    result: Err(QuoteError::Unavailable("quote session closed".to_string())),
                },
            );
        }
        sequence
    }

    /// Queue a request from user input. Invalid input still supersedes older quotes
    /// and is published immediately without touching the network.
    pub fn submit_input(
        &self,
        input_symbol: &str,
        output_symbol: &str,
        ui_amount: &str,
    ) -> Result<u64, QuoteError> {
        match self.engine.request(input_symbol, output_symbol, ui_amount) {
            Ok(request) => Ok(self.submit(request)),
            Err(e) => {
                let sequence = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                publish(
                    &self.publisher,
                    &self.issued,
                    QuoteUpdate {
                        sequence,
                        result: Err(e.clone()),
                    },
                );
                Err(e)
            }
        }
    }

    pub fn latest_issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<QuoteUpdate> {
        self.updates.borrow().clone()
    }

    /// Wait until an update at or after `sequence` is published.
    pub async fn wait_for(&self, sequence: u64) -> Option<QuoteUpdate> {
        let mut updates = self.updates.clone();
        loop {
            if let Some(update) = updates.borrow_and_update().as_ref() {
                if update.sequence >= sequence {
                    return Some(update.clone());
                }
            }
            if updates.changed().await.is_err() {
                return None;
            }
        }
    }

    /// The quote that may be signed: the newest issued request's result, still fresh.
    pub fn quote_for_execution(&self) -> Result<Quote, QuoteError> {
        let update = self.current().ok_or(QuoteError::Stale)?;
        if update.sequence != self.latest_issued() {
            return Err(QuoteError::Stale);
        }
        let quote = update.result?;
        if quote.is_expired() {
            return Err(QuoteError::Stale);
        }
        Ok(quote)
    }
}

impl Drop for QuoteSession {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker(
    engine: Arc<QuoteEngine>,
    mut inbox: mpsc::UnboundedReceiver<(u64, QuoteRequest)>,
    issued: Arc<AtomicU64>,
    publisher: Arc<watch::Sender<Option<QuoteUpdate>>>,
    quiet_window: Duration,
) {
    let mut carried = None;
    loop {
        let mut pending = match carried.take() {
            Some(pending) => pending,
            None => match inbox.recv().await {
                Some(pending) => pending,
                None => return,
            },
        };

        // Keep replacing the pending request until input goes quiet.
        loop {
            match tokio::time::timeout(quiet_window, inbox.recv()).await {
                Ok(Some(next)) => {
                    debug!("Coalesced quote request #{} into #{}", pending.0, next.0);
                    pending = next;
                }
                Ok(None) => return,
                Err(_) => break,
            }
        }

        let (sequence, request) = pending;
        if sequence != issued.load(Ordering::SeqCst) {
            // A newer request bypassed the queue (invalid input), nothing to fetch.
            continue;
        }

        // New input abandons the in-flight fetch instead of waiting it out.
        tokio::select! {
            result = engine.get_quote(&request) => {
                let result = result.map(|mut quote| {
                    quote.sequence = sequence;
                    quote
                });
                if !publish(&publisher, &issued, QuoteUpdate { sequence, result }) {
                    debug!("Discarded superseded quote #{}", sequence);
                }
            }
            next = inbox.recv() => match next {
                Some(next) => {
                    debug!("Abandoned in-flight quote #{} for #{}", sequence, next.0);
                    carried = Some(next);
                }
                None => return,
            },
        }
    }
}

/// Publish only if `update` is the newest issued request and newer than what is shown.
fn publish(
    publisher: &watch::Sender<Option<QuoteUpdate>>,
    issued: &AtomicU64,
    update: QuoteUpdate,
) -> bool {
    publisher.send_if_modified(|current| {
        let newer = current
            .as_ref()
            .map_or(true, |shown| update.sequence > shown.sequence);
        if newer && update.sequence == issued.load(Ordering::SeqCst) {
            *current = Some(update.clone());
            true
        } else {
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::AssetRegistry;
    use crate::domain::quote::QuoteEngineConfig;
    use crate::shared::testing::MockQuoteApi;
    use serde_json::json;

    fn session(api: Arc<MockQuoteApi>) -> QuoteSession {
        let engine = QuoteEngine::new(
            api,
            Arc::new(AssetRegistry::mainnet().unwrap()),
            QuoteEngineConfig::default(),
        );
        QuoteSession::spawn(Arc::new(engine), Duration::from_millis(500))
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_inputs_executes_one_call_for_last_input() {
        let api = Arc::new(MockQuoteApi::new());
        api.respond_with(Ok(json!({"outAmount": "1000"})));
        let session = session(api.clone());

        let mut last = 0;
        for amount in ["1", "12", "123", "1234", "12345"] {
            last = session.submit_input("USDC", "BONK", amount).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let update = session.wait_for(last).await.unwrap();
        assert_eq!(update.sequence, last);
        assert_eq!(api.call_count(), 1);
        assert_eq!(api.last_params().unwrap().amount, 12_345_000_000);
        assert_eq!(update.result.unwrap().sequence, last);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inputs_separated_by_quiet_window_each_execute() {
        let api = Arc::new(MockQuoteApi::new());
        api.respond_with(Ok(json!({"outAmount": "1000"})));
        let session = session(api.clone());

        let first = session.submit_input("USDC", "BONK", "1").unwrap();
        session.wait_for(first).await.unwrap();
        let second = session.submit_input("USDC", "BONK", "2").unwrap();
        session.wait_for(second).await.unwrap();

        assert_eq!(api.call_count(), 2);
        assert!(session.quote_for_execution().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_of_superseded_in_flight_request_is_discarded() {
        let api = Arc::new(MockQuoteApi::new());
        api.respond_with(Ok(json!({"outAmount": "1000"})));
        api.set_delay(Duration::from_secs(2));
        let session = session(api.clone());

        let first = session.submit_input("USDC", "BONK", "1").unwrap();
        // Let the first request start its slow fetch, then supersede it.
        tokio::time::sleep(Duration::from_millis(600)).await;
        let second = session.submit_input("USDC", "BONK", "2").unwrap();

        let update = session.wait_for(first).await.unwrap();
        assert_eq!(update.sequence, second);
        assert_eq!(api.call_count(), 2);
        assert_eq!(session.quote_for_execution().unwrap().request.raw_input_amount, 2_000_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_input_does_not_wait_for_superseded_fetch() {
        let api = Arc::new(MockQuoteApi::new());
        api.respond_with(Ok(json!({"outAmount": "1000"})));
        api.set_delay(Duration::from_secs(3));
        let session = session(api.clone());
        let started = tokio::time::Instant::now();

        session.submit_input("USDC", "BONK", "1").unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        let second = session.submit_input("USDC", "BONK", "2").unwrap();

        let update = session.wait_for(second).await.unwrap();
        assert_eq!(update.result.unwrap().request.raw_input_amount, 2_000_000);
        // Quiet window plus one fetch after the second input, not two fetches back to back.
        assert!(started.elapsed() < Duration::from_millis(4_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_input_supersedes_previous_quote() {
        let api = Arc::new(MockQuoteApi::new());
        api.respond_with(Ok(json!({"outAmount": "1000"})));
        let session = session(api.clone());

        let first = session.submit_input("USDC", "BONK", "1").unwrap();
        session.wait_for(first).await.unwrap();
        assert!(session.quote_for_execution().is_ok());

        assert!(session.submit_input("USDC", "BONK", "abc").is_err());
        assert!(matches!(
            session.quote_for_execution(),
            Err(QuoteError::InvalidAmount(_))
        ));
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_quote_is_not_executable() {
        let api = Arc::new(MockQuoteApi::new());
        api.respond_with(Ok(json!({"outAmount": "1000"})));
        let session = session(api.clone());

        let seq = session.submit_input("USDC", "BONK", "1").unwrap();
        session.wait_for(seq).await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert!(matches!(session.quote_for_execution(), Err(QuoteError::Stale)));
    }
}
