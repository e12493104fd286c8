//! Error types for the epik-wallet library

use thiserror::Error;

/// Custom error type for wallet operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Derivation error: {0}")]
    Derivation(String),

    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No default address configured")]
    NoDefault,

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: String, available: String },

    #[error("Transport error: {0}")]
    Transport(String),

    /// The node rejected a fully built signed message; the reason is the node's own text.
    #[error("Submission rejected: {0}")]
    Submission(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Signature type already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Mnemonic error: {0}")]
    Mnemonic(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type for wallet operations
pub type Result<T> = std::result::Result<T, Error>;
