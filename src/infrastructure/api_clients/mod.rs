pub mod jupiter_client;

pub use jupiter_client::{JupiterClient, JUPITER_API_URL};
