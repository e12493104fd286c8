//! Cryptographic primitives and operations
//!
//! Hashing, hierarchical derivation, mnemonic seeds and the pluggable
//! signature schemes used by the wallet.

pub mod hash;
pub mod derivation;
pub mod mnemonic;
pub mod sigs;

pub use derivation::{derive_seed, fit_seed, DerivationPath, ExtendedKey};
pub use mnemonic::*;
