//! Application layer - pipelines and entry points

pub mod commands;
pub mod reward;
pub mod server;
pub mod services;
pub mod swap;

pub use commands::{Cli, CommandExecutor, Commands};
pub use reward::{RewardDispatcher, RewardReceipt};
pub use services::Services;
pub use swap::{SwapOutcome, SwapPipeline};
