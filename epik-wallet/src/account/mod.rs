//! Account management functionality
//!
//! Key records, the address-indexed key store and the wallet that
//! orchestrates key generation, signing and message submission.

mod keystore;
mod wallet;

pub use keystore::*;
pub use wallet::*;
