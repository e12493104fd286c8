//! Signature schemes and the registry that maps a type tag to a scheme

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{Error, Result};

pub mod bls;
pub mod secp;

pub use bls::BlsScheme;
pub use secp::Secp256k1Scheme;

/// Signature type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigType {
    /// ECDSA over secp256k1, big-endian keys, recoverable signatures
    Secp256k1,
    /// BLS over BLS12-381, little-endian keys, aggregatable signatures
    Bls,
}

impl SigType {
    /// Tag byte used in the binary signature form
    pub fn as_byte(self) -> u8 {
        match self {
            SigType::Secp256k1 => 1,
            SigType::Bls => 2,
        }
    }

    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(SigType::Secp256k1),
            2 => Ok(SigType::Bls),
            _ => Err(Error::InvalidInput(format!("unknown signature type {}", b))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SigType::Secp256k1 => "secp256k1",
            SigType::Bls => "bls",
        }
    }
}

impl fmt::Display for SigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "secp256k1" => Ok(SigType::Secp256k1),
            "bls" => Ok(SigType::Bls),
            other => Err(Error::NotFound(format!("signature type not supported: {}", other))),
        }
    }
}

/// A signature tagged with the scheme that produced it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(rename = "Type", with = "sig_type_byte")]
    pub sig_type: SigType,
    #[serde(rename = "Data", with = "crate::serde_helpers::base64_bytes")]
    pub data: Vec<u8>,
}

impl Signature {
    pub fn new(sig_type: SigType, data: Vec<u8>) -> Self {
        Self { sig_type, data }
    }

    /// Binary form: type byte followed by the signature data
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.data.len());
        out.push(self.sig_type.as_byte());
        out.extend_from_slice(&self.data);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (&tag, data) = bytes
            .split_first()
            .ok_or_else(|| Error::InvalidInput("empty signature".to_string()))?;
        Ok(Self::new(SigType::from_byte(tag)?, data.to_vec()))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}, 0x{})", self.sig_type, hex::encode(&self.data))
    }
}

mod sig_type_byte {
    use super::SigType;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(sig_type: &SigType, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(sig_type.as_byte())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SigType, D::Error> {
        SigType::from_byte(u8::deserialize(deserializer)?).map_err(serde::de::Error::custom)
    }
}

/// One signature algorithm family: key format, sign/verify math and address rule
pub trait SignatureScheme: Send + Sync {
    /// The tag this scheme is registered under
    fn sig_type(&self) -> SigType;

    /// Generate a fresh private key from the operating system's RNG
    fn generate(&self) -> Result<Vec<u8>>;

    /// Deterministically generate a private key from a seed of at least 32 bytes
    fn generate_from_seed(&self, seed: &[u8]) -> Result<Vec<u8>>;

    /// Public key bytes for a private key
    fn to_public(&self, private_key: &[u8]) -> Result<Vec<u8>>;

    /// Address for a public key produced by [`SignatureScheme::to_public`]
    fn address(&self, public_key: &[u8]) -> Result<Address>;

    /// Sign `msg`; fails with `InvalidKey` instead of signing with a bad key
    fn sign(&self, private_key: &[u8], msg: &[u8]) -> Result<Vec<u8>>;

    /// Check `signature` over `msg` against `address`. Malformed input or a
    /// signature from a different scheme yields `false`.
    fn verify(&self, signature: &[u8], address: &Address, msg: &[u8]) -> bool;
}

/// Registry of signature schemes, built once and shared read-only afterwards
pub struct SignatureRegistry {
    schemes: HashMap<SigType, Box<dyn SignatureScheme>>,
}

impl SignatureRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self { schemes: HashMap::new() }
    }

    /// A registry with the BLS and secp256k1 schemes
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.schemes.insert(SigType::Bls, Box::new(BlsScheme));
        registry.schemes.insert(SigType::Secp256k1, Box::new(Secp256k1Scheme));
        registry
    }

    /// Register a scheme under its own tag; a tag can only be registered once
    pub fn register(&mut self, scheme: Box<dyn SignatureScheme>) -> Result<()> {
        let sig_type = scheme.sig_type();
        if self.schemes.contains_key(&sig_type) {
            return Err(Error::AlreadyRegistered(sig_type.to_string()));
        }
        self.schemes.insert(sig_type, scheme);
        Ok(())
    }

    pub fn get(&self, sig_type: SigType) -> Result<&dyn SignatureScheme> {
        self.schemes
            .get(&sig_type)
            .map(|scheme| scheme.as_ref())
            .ok_or_else(|| Error::NotFound(format!("signature scheme not registered: {}", sig_type)))
    }

    pub fn contains(&self, sig_type: SigType) -> bool {
        self.schemes.contains_key(&sig_type)
    }

    /// Derive the address for a private key of the given type
    pub fn address_for(&self, sig_type: SigType, private_key: &[u8]) -> Result<Address> {
        let scheme = self.get(sig_type)?;
        let public_key = scheme.to_public(private_key)?;
        scheme.address(&public_key)
    }
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for SignatureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.schemes.keys().map(|t| t.as_str()).collect();
        types.sort_unstable();
        f.debug_struct("SignatureRegistry").field("schemes", &types).finish()
    }
}
