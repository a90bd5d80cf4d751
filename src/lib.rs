//! RewardSwap - token swaps and custodial reward transfers on Solana

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::{RewardDispatcher, Services, SwapPipeline};
pub use domain::asset::{Asset, AssetRegistry};
pub use domain::execution::{Broadcaster, TransactionBuilder, TransactionSigner};
pub use domain::quote::{QuoteEngine, QuoteSession};
pub use domain::reward::RewardSelector;
pub use shared::errors::PipelineError;
