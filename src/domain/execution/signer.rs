//! Transaction signing with either an interactive wallet or the custodial key

use async_trait::async_trait;
use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use std::fmt;
use tracing::{debug, info};

use super::{SignedTransaction, UnsignedTransaction};
use crate::shared::errors::SignError;

/// A user-held wallet that may prompt its owner and may refuse.
#[async_trait]
pub trait InteractiveWallet: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    /// Sign the serialized message. Returns `SignError::UserRejected` if the owner declines.
    async fn sign_message(&self, message: &VersionedMessage) -> Result<Signature, SignError>;
}

/// Operator-held reward key. Never printed, never returned.
pub struct CustodialKey {
    keypair: Keypair,
}

impl CustodialKey {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Decode a base58 64-byte secret key
    pub fn from_base58(secret: &str) -> Result<Self, SignError> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .map_err(|e| SignError::KeyUnavailable(format!("secret is not valid base58: {}", e)))?;
        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| SignError::KeyUnavailable(format!("secret is not a valid keypair: {}", e)))?;
        Ok(Self::new(keypair))
    }

    /// Load from an environment variable; absence is a startup error.
    pub fn from_env(var: &str) -> Result<Self, SignError> {
        let secret = std::env::var(var)
            .map_err(|_| SignError::KeyUnavailable(format!("{} is not set", var)))?;
        let key = Self::from_base58(&secret)?;
        info!("Loaded custodial key {}", key.pubkey());
        Ok(key)
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn sign(&self, bytes: &[u8]) -> Signature {
        self.keypair.sign_message(bytes)
    }
}

impl fmt::Debug for CustodialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodialKey")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

/// Where the signature comes from
pub enum KeySource<'a> {
    /// Interactive wallet session; `None` when no wallet is connected
    Wallet(Option<&'a dyn InteractiveWallet>),
    Custodial(&'a CustodialKey),
}

pub struct TransactionSigner;

impl TransactionSigner {
    /// Produce a signed transaction. The unsigned message is left untouched.
    pub async fn sign(
        unsigned: &UnsignedTransaction,
        key: KeySource<'_>,
    ) -> Result<SignedTransaction, SignError> {
        let message = unsigned.message().clone();
        let bytes = message.serialize();

        let (signer, signature) = match key {
            KeySource::Wallet(None) => return Err(SignError::NoWallet),
            KeySource::Wallet(Some(wallet)) => {
                let signer = wallet.pubkey();
                let signature = wallet.sign_message(&message).await?;
                if !signature.verify(signer.as_ref(), &bytes) {
                    return Err(SignError::Signing(format!(
                        "wallet {} returned an invalid signature",
                        signer
                    )));
                }
                (signer, signature)
            }
            KeySource::Custodial(key) => (key.pubkey(), key.sign(&bytes)),
        };

        let required = unsigned.required_signers();
        let position = required.iter().position(|k| *k == signer).ok_or_else(|| {
            SignError::Signing(format!("{} is not a required signer", signer))
        })?;
        if required.len() != 1 {
            return Err(SignError::Signing(format!(
                "transaction requires {} signatures",
                required.len()
            )));
        }

        let mut signatures = vec![Signature::default(); required.len()];
        signatures[position] = signature;
        debug!("Signed {:?} transaction {}", unsigned.kind(), signature);

        Ok(SignedTransaction::new(
            VersionedTransaction {
                signatures,
                message,
            },
            unsigned.kind(),
            unsigned.last_valid_block_height(),
        ))
    }
}
