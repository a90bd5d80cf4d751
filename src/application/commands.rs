//! CLI commands and handlers
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use solana_sdk::signature::Signature;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use super::server::{self, AppState};
use super::services::Services;
use crate::domain::execution::{InteractiveWallet, SubmissionResult};
use crate::infrastructure::wallet::TerminalWallet;
use crate::shared::config::Config;
use crate::shared::errors::PipelineError;
use crate::shared::utils::explorer_url;

#[derive(Parser)]
#[command(name = "rewardswap", version)]
#[command(about = "Token swaps and reward transfers on Solana")]
pub struct Cli {
    /// Path to config file (defaults to ./Config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// RPC endpoint URL (overrides config)
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the reward dispatch HTTP endpoint
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Price a swap without executing it
    Quote {
        /// Input asset symbol
        from: String,
        /// Output asset symbol
        to: String,
        /// Input amount in token units, e.g. 1.5
        amount: String,
    },

    /// Quote, sign with a local wallet, and execute a swap
    Swap {
        from: String,
        to: String,
        amount: String,

        /// Wallet keypair file
        #[arg(long)]
        keypair: PathBuf,

        /// Sign without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Send a reward from the custodial wallet
    Airdrop {
        /// Recipient wallet address
        recipient: String,

        /// Whole-token amount; drawn at random when omitted
        #[arg(long)]
        amount: Option<u64>,
    },

    /// Query the status of a submitted transaction
    Status {
        /// Transaction signature
        signature: String,
    },
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute the selected command
    pub async fn execute(cli: Cli) -> Result<()> {
        let mut config = Config::load(cli.config.as_deref())?;
        if let Some(url) = cli.rpc_url {
            config.rpc.url = url;
        }

        match cli.command {
            Commands::Serve { bind } => {
                if let Some(bind) = bind {
                    config.server.bind = bind;
                }
                Self::execute_serve(config).await
            }
            Commands::Quote { from, to, amount } => Self::execute_quote(config, &from, &to, &amount).await,
            Commands::Swap {
                from,
                to,
                amount,
                keypair,
                yes,
            } => Self::execute_swap(config, &from, &to, &amount, keypair, yes).await,
            Commands::Airdrop { recipient, amount } => {
                Self::execute_airdrop(config, &recipient, amount).await
            }
            Commands::Status { signature } => Self::execute_status(config, &signature).await,
        }
    }

    async fn execute_serve(config: Config) -> Result<()> {
        let bind = config.server.bind.clone();
        let services = Services::new(config).map_err(report)?;
        let dispatcher = services.reward_dispatcher().map_err(report)?;
        server::serve(
            &bind,
            AppState {
                dispatcher: Arc::new(dispatcher),
            },
        )
        .await
    }

    async fn execute_quote(config: Config, from: &str, to: &str, amount: &str) -> Result<()> {
        let services = Services::new(config).map_err(report)?;
        let pipeline = services.swap_pipeline();
        let quote = pipeline.quote(from, to, amount).await.map_err(report)?;

        println!(
            "{} {} -> {} {}",
            quote.request.input.to_ui(quote.request.raw_input_amount),
            quote.request.input.symbol,
            quote.output_ui(),
            quote.request.output.symbol
        );
        if let Some(threshold) = quote.other_amount_threshold {
            println!(
                "  minimum received: {} {} ({} bps slippage)",
                quote.request.output.to_ui(threshold),
                quote.request.output.symbol,
                quote.slippage_bps
            );
        }
        if let Some(impact) = quote.price_impact_pct {
            println!("  price impact: {:.4}%", impact * 100.0);
        }
        if !quote.route_labels.is_empty() {
            println!("  route: {}", quote.route_labels.join(" -> "));
        }
        Ok(())
    }

    async fn execute_swap(
        config: Config,
        from: &str,
        to: &str,
        amount: &str,
        keypair: PathBuf,
        yes: bool,
    ) -> Result<()> {
        let wallet = TerminalWallet::from_file(&keypair)
            .map_err(|e| report(e.into()))?
            .auto_approve(yes);
        let services = Services::new(config).map_err(report)?;
        let pipeline = services.swap_pipeline();

        let quote = pipeline.quote(from, to, amount).await.map_err(report)?;
        println!(
            "Quote: {} {} -> {} {}",
            quote.request.input.to_ui(quote.request.raw_input_amount),
            quote.request.input.symbol,
            quote.output_ui(),
            quote.request.output.symbol
        );

        let wallet: &dyn InteractiveWallet = &wallet;
        let outcome = pipeline.execute(Some(wallet)).await.map_err(report)?;
        println!("Swap confirmed: {}", outcome.explorer_url);
        Ok(())
    }

    async fn execute_airdrop(config: Config, recipient: &str, amount: Option<u64>) -> Result<()> {
        let services = Services::new(config).map_err(report)?;
        let dispatcher = services.reward_dispatcher().map_err(report)?;

        let receipt = match amount {
            Some(amount) => dispatcher.send(recipient, amount).await,
            None => dispatcher.airdrop(recipient).await,
        }
        .map_err(report)?;

        info!("Reward request {} complete", receipt.request_id);
        println!(
            "Sent {} {} to {}: {}",
            receipt.amount,
            receipt.asset,
            receipt.recipient,
            explorer_url(&receipt.result.signature.to_string())
        );
        Ok(())
    }

    async fn execute_status(config: Config, signature: &str) -> Result<()> {
        let signature = Signature::from_str(signature.trim())
            .map_err(|e| anyhow!("invalid signature {}: {}", signature, e))?;
        let services = Services::new(config).map_err(report)?;
        let result = services
            .broadcaster
            .status(&signature)
            .await
            .map_err(|e| report(e.into()))?;
        print_status(&result);
        Ok(())
    }
}

fn print_status(result: &SubmissionResult) {
    println!("{}: {}", result.signature, result.status.as_str());
    if let Some(slot) = result.slot {
        println!("  slot: {}", slot);
    }
    if let Some(error) = &result.error {
        println!("  error: {}", error);
    }
}

/// Turn a pipeline error into the message shown to the operator.
fn report(err: PipelineError) -> anyhow::Error {
    match err {
        PipelineError::InvalidInput(reason) => anyhow!("invalid input: {}", reason),
        PipelineError::UpstreamUnavailable(reason) => {
            anyhow!("service unavailable, try again: {}", reason)
        }
        PipelineError::ChainRejected { signature, reason } => match signature {
            Some(signature) => anyhow!("transaction {} rejected: {}", signature, reason),
            None => anyhow!("transaction rejected: {}", reason),
        },
        PipelineError::Ambiguous { signature } => anyhow!(
            "transaction {} was sent but not confirmed in time; run `rewardswap status {}` before retrying",
            signature,
            signature
        ),
        PipelineError::Fatal(reason) => anyhow!("configuration error: {}", reason),
    }
}
