//! Error handling for the application

use solana_sdk::signature::Signature;
use thiserror::Error;

/// Quote-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Input and output asset are the same: {0}")]
    SameAsset(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Quote service unavailable: {0}")]
    Unavailable(String),

    #[error("No route found for the requested pair")]
    NoRoute,

    #[error("Quote is stale or superseded")]
    Stale,
}

/// Transaction builder errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuilderError {
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Invalid recipient address: {0}")]
    RecipientInvalid(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Execution service error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Signing errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignError {
    #[error("No wallet session connected")]
    NoWallet,

    #[error("Signature request rejected by the user")]
    UserRejected,

    #[error("Custodial key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Submission and confirmation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    #[error("Transaction rejected by network: {reason}")]
    RejectedByNetwork {
        signature: Option<Signature>,
        reason: String,
    },

    #[error("Confirmation deadline elapsed for {signature}; query status before retrying")]
    TimedOut { signature: Signature },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Blockhash expired before {signature} landed")]
    Expired { signature: Signature },
}

/// Chain RPC errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("RPC connection error: {0}")]
    Connection(String),

    #[error("RPC rejected request: {0}")]
    Rejected(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Pipeline-level error taxonomy.
///
/// Entry points (HTTP handlers, CLI) are the only layer that turns these into
/// user-facing messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Bad amount or address, rejected before any network call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Quoting/execution service or RPC unreachable or malformed. Caller may retry.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Network refused the transaction. Rebuild before retrying.
    #[error("Rejected by chain: {reason}")]
    ChainRejected {
        signature: Option<Signature>,
        reason: String,
    },

    /// Broadcast happened but finality is unknown. Query status before any retry.
    #[error("Outcome unknown for {signature}; poll status before resubmitting")]
    Ambiguous { signature: Signature },

    /// Misconfiguration that halts the pipeline.
    #[error("Fatal: {0}")]
    Fatal(String),
}

impl From<QuoteError> for PipelineError {
    fn from(err: QuoteError) -> Self {
        match err {
            QuoteError::InvalidAmount(_)
            | QuoteError::SameAsset(_)
            | QuoteError::UnknownAsset(_)
            | QuoteError::Stale => PipelineError::InvalidInput(err.to_string()),
            QuoteError::Unavailable(_) | QuoteError::NoRoute => {
                PipelineError::UpstreamUnavailable(err.to_string())
            }
        }
    }
}

impl From<BuilderError> for PipelineError {
    fn from(err: BuilderError) -> Self {
        match err {
            BuilderError::UnknownAsset(_)
            | BuilderError::RecipientInvalid(_)
            | BuilderError::InvalidAmount(_) => PipelineError::InvalidInput(err.to_string()),
            BuilderError::Upstream(_) => PipelineError::UpstreamUnavailable(err.to_string()),
            BuilderError::Chain(chain) => chain.into(),
        }
    }
}

impl From<ChainError> for PipelineError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Connection(_) => PipelineError::UpstreamUnavailable(err.to_string()),
            ChainError::Rejected(reason) => PipelineError::ChainRejected {
                signature: None,
                reason,
            },
        }
    }
}

impl From<SignError> for PipelineError {
    fn from(err: SignError) -> Self {
        match err {
            SignError::NoWallet | SignError::UserRejected => {
                PipelineError::InvalidInput(err.to_string())
            }
            SignError::KeyUnavailable(_) | SignError::Signing(_) => {
                PipelineError::Fatal(err.to_string())
            }
        }
    }
}

impl From<SubmitError> for PipelineError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::RejectedByNetwork { signature, reason } => {
                PipelineError::ChainRejected { signature, reason }
            }
            SubmitError::Expired { signature } => PipelineError::ChainRejected {
                signature: Some(signature),
                reason: "blockhash expired before the transaction landed".to_string(),
            },
            SubmitError::TimedOut { signature } => PipelineError::Ambiguous { signature },
            SubmitError::ConnectionError(_) => PipelineError::UpstreamUnavailable(err.to_string()),
        }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::Fatal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_ambiguous_not_rejected() {
        let signature = Signature::default();
        let err: PipelineError = SubmitError::TimedOut { signature }.into();
        assert_eq!(err, PipelineError::Ambiguous { signature });
    }

    #[test]
    fn test_quote_errors_map_to_taxonomy() {
        assert!(matches!(
            PipelineError::from(QuoteError::NoRoute),
            PipelineError::UpstreamUnavailable(_)
        ));
        assert!(matches!(
            PipelineError::from(QuoteError::InvalidAmount("-1".into())),
            PipelineError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let err: PipelineError = SignError::KeyUnavailable("WALLET_SECRET_KEY".into()).into();
        assert!(matches!(err, PipelineError::Fatal(_)));
    }
}
