//! Shared components - errors, configuration, and utilities

pub mod config;
pub mod errors;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;
