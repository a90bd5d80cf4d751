//! Infrastructure layer - network adapters for the domain interfaces

pub mod api_clients;
pub mod blockchain;
pub mod wallet;
