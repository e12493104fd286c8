//! EpiK Wallet Core - multi-scheme key management and message signing
//!
//! This library holds private keys for an account-based chain (BLS and
//! secp256k1 signature schemes) and an Ethereum-compatible chain, derives
//! keys from a root seed along hierarchical paths, and turns a logical intent
//! into a nonced, fee-estimated, content-addressed, signed message that is
//! pushed to a remote node.
//!
//! Concurrent submissions from the same sending address through independent
//! pipeline invocations are not safe: both may read the same next nonce from
//! the node and only one will be accepted. Callers that need concurrency must
//! serialize submissions per address in front of the pipeline.

pub mod error;
pub mod config;
pub mod address;
pub mod crypto;
pub mod account;
pub mod transaction;

mod serde_helpers;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use address::{Address, Network, Protocol};
pub use account::{KeyInfo, KeyStore, Wallet};
pub use config::{EvmConfig, NodeConfig};
pub use crypto::sigs::{SigType, Signature, SignatureRegistry, SignatureScheme};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
