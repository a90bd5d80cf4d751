//! In-memory doubles for the network seams, used by unit tests

use async_trait::async_trait;
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::asset::AssetRegistry;
use crate::domain::execution::{ChainClient, ChainStatus, InteractiveWallet, SendOptions};
use crate::domain::quote::{Quote, QuoteApi, QuoteParams, QuoteRequest, SwapExecutionApi, SwapTransaction};
use crate::shared::errors::{BuilderError, ChainError, QuoteError, SignError};

pub fn sample_quote(
    registry: &AssetRegistry,
    input: &str,
    output: &str,
    raw_in: u64,
    raw_out: u64,
) -> Quote {
    let request = QuoteRequest::new(
        registry.by_symbol(input).unwrap().clone(),
        registry.by_symbol(output).unwrap().clone(),
        raw_in,
    )
    .unwrap();
    Quote {
        route: json!({
            "inputMint": request.input.mint.to_string(),
            "outputMint": request.output.mint.to_string(),
            "inAmount": raw_in.to_string(),
            "outAmount": raw_out.to_string(),
        }),
        request,
        raw_output_amount: raw_out,
        other_amount_threshold: None,
        slippage_bps: 50,
        price_impact_pct: None,
        route_labels: vec!["Whirlpool".to_string()],
        context_slot: None,
        fetched_at: Instant::now(),
        ttl: Duration::from_secs(30),
        sequence: 0,
    }
}

// ---------------------------------------------------------------------------
// Quote service

pub struct MockQuoteApi {
    response: Mutex<Result<Value, QuoteError>>,
    calls: Mutex<Vec<QuoteParams>>,
    delay: Mutex<Duration>,
}

impl MockQuoteApi {
    pub fn new() -> Self {
        Self {
            response: Mutex::new(Ok(json!({"outAmount": "1"}))),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn respond_with(&self, response: Result<Value, QuoteError>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn hang(&self) {
        self.set_delay(Duration::from_secs(3600));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_params(&self) -> Option<QuoteParams> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl QuoteApi for MockQuoteApi {
    async fn fetch_quote(&self, params: &QuoteParams) -> Result<Value, QuoteError> {
        self.calls.lock().unwrap().push(params.clone());
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.response.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// Execution service

pub struct MockSwapApi {
    fee_payer: Mutex<Option<Pubkey>>,
    users: Mutex<Vec<Pubkey>>,
}

impl MockSwapApi {
    pub fn new() -> Self {
        Self {
            fee_payer: Mutex::new(None),
            users: Mutex::new(Vec::new()),
        }
    }

    /// Return swaps paid by `payer` instead of the requesting user
    pub fn pay_with(&self, payer: Pubkey) {
        *self.fee_payer.lock().unwrap() = Some(payer);
    }

    pub fn requested_users(&self) -> Vec<Pubkey> {
        self.users.lock().unwrap().clone()
    }
}

#[async_trait]
impl SwapExecutionApi for MockSwapApi {
    async fn swap_transaction(
        &self,
        _quote: &Quote,
        user: &Pubkey,
    ) -> Result<SwapTransaction, BuilderError> {
        self.users.lock().unwrap().push(*user);
        let payer = self.fee_payer.lock().unwrap().unwrap_or(*user);
        let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 1);
        let message = Message::new_with_blockhash(&[ix], Some(&payer), &Hash::new_unique());
        Ok(SwapTransaction {
            transaction: VersionedTransaction {
                signatures: vec![Signature::default()],
                message: VersionedMessage::Legacy(message),
            },
            last_valid_block_height: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Chain

#[derive(Debug, Clone, PartialEq)]
pub enum ChainBehavior {
    /// Land and confirm every send
    Confirm,
    /// Accept sends but never report them
    NeverConfirm,
    /// Accept the send, then fail during execution
    FailOnChain(String),
    /// Refuse at submission
    RejectSend(String),
    /// Accept the send and lose it
    Drop,
    /// Never answer sends
    HangSend,
}

struct ChainState {
    behavior: ChainBehavior,
    accounts: HashSet<Pubkey>,
    balances: HashMap<Pubkey, u64>,
    landed: Vec<Signature>,
    pending: Vec<VersionedTransaction>,
    failed: HashMap<Signature, String>,
    account_creations: usize,
    blockhash: Hash,
    last_valid_block_height: u64,
    block_height: u64,
    sends: usize,
    drops_remaining: usize,
    deliver_dropped: bool,
    fail_reads: bool,
    send_delay: Duration,
    in_flight: usize,
    max_in_flight: usize,
}

/// Simulated cluster that dedups by signature and applies token effects on landing.
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                behavior: ChainBehavior::Confirm,
                accounts: HashSet::new(),
                balances: HashMap::new(),
                landed: Vec::new(),
                pending: Vec::new(),
                failed: HashMap::new(),
                account_creations: 0,
                blockhash: Hash::new_unique(),
                last_valid_block_height: 250,
                block_height: 100,
                sends: 0,
                drops_remaining: 0,
                deliver_dropped: false,
                fail_reads: false,
                send_delay: Duration::ZERO,
                in_flight: 0,
                max_in_flight: 0,
            }),
        }
    }

    pub fn set_behavior(&self, behavior: ChainBehavior) {
        self.state.lock().unwrap().behavior = behavior;
    }

    pub fn add_account(&self, address: Pubkey) {
        self.state.lock().unwrap().accounts.insert(address);
    }

    /// Fail the next `count` sends with a connection error. With `delivered`,
    /// the transaction reaches the node before the connection drops.
    pub fn drop_next_sends(&self, count: usize, delivered: bool) {
        let mut state = self.state.lock().unwrap();
        state.drops_remaining = count;
        state.deliver_dropped = delivered;
    }

    pub fn fail_reads(&self) {
        self.state.lock().unwrap().fail_reads = true;
    }

    pub fn set_send_delay(&self, delay: Duration) {
        self.state.lock().unwrap().send_delay = delay;
    }

    pub fn set_block_height(&self, height: u64) {
        self.state.lock().unwrap().block_height = height;
    }

    /// Land every transaction that was accepted but never reported
    pub fn confirm_pending(&self) {
        let mut state = self.state.lock().unwrap();
        let pending = std::mem::take(&mut state.pending);
        for tx in pending {
            land(&mut state, &tx);
        }
    }

    pub fn blockhash(&self) -> Hash {
        self.state.lock().unwrap().blockhash
    }

    pub fn last_valid_block_height(&self) -> u64 {
        self.state.lock().unwrap().last_valid_block_height
    }

    pub fn landed(&self) -> Vec<Signature> {
        self.state.lock().unwrap().landed.clone()
    }

    pub fn send_count(&self) -> usize {
        self.state.lock().unwrap().sends
    }

    pub fn balance(&self, holding_account: &Pubkey) -> u64 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(holding_account)
            .copied()
            .unwrap_or(0)
    }

    pub fn account_creations(&self) -> usize {
        self.state.lock().unwrap().account_creations
    }

    pub fn max_concurrent_sends(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }
}

/// Apply a transaction once: idempotent account creation and token transfers.
fn land(state: &mut ChainState, tx: &VersionedTransaction) {
    let signature = tx.signatures[0];
    if state.landed.contains(&signature) {
        return;
    }
    state.landed.push(signature);

    let keys = tx.message.static_account_keys();
    for ix in tx.message.instructions() {
        let program = keys[ix.program_id_index as usize];
        let account = |i: usize| keys[ix.accounts[i] as usize];
        if program == spl_associated_token_account::id() {
            if state.accounts.insert(account(1)) {
                state.account_creations += 1;
            }
        } else if program == spl_token::id() {
            if let Ok(spl_token::instruction::TokenInstruction::TransferChecked { amount, .. }) =
                spl_token::instruction::TokenInstruction::unpack(&ix.data)
            {
                *state.balances.entry(account(2)).or_insert(0) += amount;
            }
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn account_exists(&self, address: &Pubkey) -> Result<bool, ChainError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(ChainError::Connection("connection reset".to_string()));
        }
        Ok(state.accounts.contains(address))
    }

    async fn latest_blockhash(&self) -> Result<(Hash, u64), ChainError> {
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            return Err(ChainError::Connection("connection reset".to_string()));
        }
        Ok((state.blockhash, state.last_valid_block_height))
    }

    async fn block_height(&self) -> Result<u64, ChainError> {
        Ok(self.state.lock().unwrap().block_height)
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
        _options: SendOptions,
    ) -> Result<Signature, ChainError> {
        let (behavior, delay) = {
            let mut state = self.state.lock().unwrap();
            state.sends += 1;
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            (state.behavior.clone(), state.send_delay)
        };
        if behavior == ChainBehavior::HangSend {
            std::future::pending::<()>().await;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        let signature = transaction.signatures[0];

        if state.drops_remaining > 0 {
            state.drops_remaining -= 1;
            if state.deliver_dropped {
                land(&mut state, transaction);
            }
            return Err(ChainError::Connection("connection closed before response".to_string()));
        }

        match behavior {
            ChainBehavior::Confirm | ChainBehavior::HangSend => land(&mut state, transaction),
            ChainBehavior::NeverConfirm => {
                if !state.pending.iter().any(|tx| tx.signatures[0] == signature) {
                    state.pending.push(transaction.clone());
                }
            }
            ChainBehavior::FailOnChain(reason) => {
                state.failed.insert(signature, reason);
            }
            ChainBehavior::RejectSend(reason) => return Err(ChainError::Rejected(reason)),
            ChainBehavior::Drop => {}
        }
        Ok(signature)
    }

    async fn signature_status(&self, signature: &Signature) -> Result<ChainStatus, ChainError> {
        let state = self.state.lock().unwrap();
        if state.landed.contains(signature) {
            return Ok(ChainStatus::Confirmed { slot: 1 });
        }
        if let Some(reason) = state.failed.get(signature) {
            return Ok(ChainStatus::Failed {
                slot: 1,
                reason: reason.clone(),
            });
        }
        Ok(ChainStatus::Unknown)
    }
}

// ---------------------------------------------------------------------------
// Wallet

pub struct MockWallet {
    keypair: Keypair,
    approve: bool,
    requests: Mutex<usize>,
}

impl MockWallet {
    pub fn approving() -> Self {
        Self {
            keypair: Keypair::new(),
            approve: true,
            requests: Mutex::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            keypair: Keypair::new(),
            approve: false,
            requests: Mutex::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

#[async_trait]
impl InteractiveWallet for MockWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_message(&self, message: &VersionedMessage) -> Result<Signature, SignError> {
        *self.requests.lock().unwrap() += 1;
        if !self.approve {
            return Err(SignError::UserRejected);
        }
        Ok(self.keypair.sign_message(&message.serialize()))
    }
}
