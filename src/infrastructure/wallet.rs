//! Terminal wallet session: a local keypair file plus a y/N prompt per signature

use async_trait::async_trait;
use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signature, Signer};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;

use crate::domain::execution::InteractiveWallet;
use crate::shared::errors::SignError;

pub struct TerminalWallet {
    keypair: Keypair,
    auto_approve: bool,
}

impl TerminalWallet {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SignError> {
        let keypair = read_keypair_file(path.as_ref()).map_err(|e| {
            SignError::KeyUnavailable(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Ok(Self {
            keypair,
            auto_approve: false,
        })
    }

    /// Skip the confirmation prompt
    pub fn auto_approve(mut self, yes: bool) -> Self {
        self.auto_approve = yes;
        self
    }
}

fn is_approval(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn prompt(summary: String) -> io::Result<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "{}\nSign this transaction? [y/N] ", summary)?;
    stderr.flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_approval(&answer))
}

#[async_trait]
impl InteractiveWallet for TerminalWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_message(&self, message: &VersionedMessage) -> Result<Signature, SignError> {
        if !self.auto_approve {
            let summary = format!(
                "Wallet {} is asked to sign a transaction with {} instruction(s)",
                self.pubkey(),
                message.instructions().len()
            );
            let approved = tokio::task::spawn_blocking(move || prompt(summary))
                .await
                .map_err(|e| SignError::Signing(e.to_string()))?
                .map_err(|e| SignError::Signing(format!("prompt failed: {}", e)))?;
            if !approved {
                info!("User declined to sign");
                return Err(SignError::UserRejected);
            }
        }
        Ok(self.keypair.sign_message(&message.serialize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::hash::Hash;
    use solana_sdk::message::Message;
    use solana_sdk::signature::write_keypair_file;
    use solana_sdk::system_instruction;

    #[test]
    fn test_answers() {
        assert!(is_approval("y\n"));
        assert!(is_approval(" YES "));
        assert!(!is_approval("\n"));
        assert!(!is_approval("nope"));
    }

    #[tokio::test]
    async fn test_auto_approved_signature_verifies() {
        let keypair = Keypair::new();
        let path = std::env::temp_dir().join(format!("rewardswap-wallet-{}.json", keypair.pubkey()));
        write_keypair_file(&keypair, &path).unwrap();

        let wallet = TerminalWallet::from_file(&path).unwrap().auto_approve(true);
        let _ = std::fs::remove_file(&path);
        assert_eq!(wallet.pubkey(), keypair.pubkey());

        let ix = system_instruction::transfer(&keypair.pubkey(), &Pubkey::new_unique(), 1);
        let message = VersionedMessage::Legacy(Message::new_with_blockhash(
            &[ix],
            Some(&keypair.pubkey()),
            &Hash::new_unique(),
        ));
        let signature = wallet.sign_message(&message).await.unwrap();
        assert!(signature.verify(keypair.pubkey().as_ref(), &message.serialize()));
    }

    #[test]
    fn test_missing_key_file() {
        assert!(matches!(
            TerminalWallet::from_file("/nonexistent/id.json"),
            Err(SignError::KeyUnavailable(_))
        ));
    }
}
