//! Domain layer - assets, quotes, transaction execution and rewards

pub mod asset;
pub mod execution;
pub mod quote;
pub mod reward;
