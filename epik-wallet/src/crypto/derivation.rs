//! Hierarchical deterministic derivation over secp256k1
//!
//! The derivation tree is always BIP-32 over secp256k1, whatever curve the
//! resulting key is later used with. [`derive_seed`] walks a path from a root
//! seed and fits the final node's scalar into a 32-byte seed for the target
//! signature scheme.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::Sha512;

use crate::error::{Error, Result};

/// First hardened child index
pub const HARDENED_OFFSET: u32 = 0x8000_0000;
/// Size of a derived seed
pub const DERIVED_SEED_LEN: usize = 32;
/// Accepted root seed lengths, in bytes
pub const MIN_ROOT_SEED_LEN: usize = 16;
pub const MAX_ROOT_SEED_LEN: usize = 64;

/// A parsed BIP-32 derivation path such as `m/44'/1'/0'/0/0`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    pub fn new(indices: Vec<u32>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    /// Extend the path by one index
    pub fn child(&self, index: u32) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    fn from_str(path: &str) -> Result<Self> {
        let mut components = path.trim().split('/');
        if components.next().map(str::trim) != Some("m") {
            return Err(Error::Derivation(format!("Invalid derivation path: {}", path)));
        }

        let mut components = components.peekable();
        if components.peek().is_none() {
            return Err(Error::Derivation("empty derivation path".to_string()));
        }

        let mut result = Vec::new();
        for component in components {
            let component = component.trim();
            if component.is_empty() {
                return Err(Error::Derivation(format!("Empty derivation path component: {}", path)));
            }

            let (digits, hardened) = match component.strip_suffix('\'') {
                Some(digits) => (digits.trim(), true),
                None => (component, false),
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::Derivation(format!("Invalid derivation path component: {}", component)));
            }
            let index = digits
                .parse::<u32>()
                .ok()
                .filter(|index| *index < HARDENED_OFFSET)
                .ok_or_else(|| Error::Derivation(format!("Derivation index out of range: {}", component)))?;

            result.push(if hardened { index + HARDENED_OFFSET } else { index });
        }

        Ok(Self(result))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for index in &self.0 {
            if *index >= HARDENED_OFFSET {
                write!(f, "/{}'", index - HARDENED_OFFSET)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}

/// An extended private key: scalar plus chain code
#[derive(Clone)]
pub struct ExtendedKey {
    secret: SecretKey,
    chain_code: [u8; 32],
}

impl ExtendedKey {
    /// Derive the master node from a root seed
    pub fn master(seed: &[u8]) -> Result<Self> {
        if seed.len() < MIN_ROOT_SEED_LEN || seed.len() > MAX_ROOT_SEED_LEN {
            return Err(Error::Derivation(format!(
                "Root seed must be between {} and {} bytes, got {}",
                MIN_ROOT_SEED_LEN,
                MAX_ROOT_SEED_LEN,
                seed.len()
            )));
        }

        let (left, chain_code) = hmac_sha512(b"Bitcoin seed", &[seed])?;
        let secret = SecretKey::from_slice(&left)
            .map_err(|e| Error::Derivation(format!("Unusable root seed: {}", e)))?;

        Ok(Self { secret, chain_code })
    }

    /// Derive a child node; indices at or above [`HARDENED_OFFSET`] are hardened
    pub fn derive_child(&self, index: u32) -> Result<Self> {
        let secp = Secp256k1::signing_only();
        self.derive_child_with(&secp, index)
    }

    /// Walk every index of `path` starting at this node
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self> {
        let secp = Secp256k1::signing_only();
        let mut key = self.clone();
        for &index in path.indices() {
            key = key.derive_child_with(&secp, index)?;
        }
        Ok(key)
    }

    fn derive_child_with<C: secp256k1::Signing>(&self, secp: &Secp256k1<C>, index: u32) -> Result<Self> {
        let parent_key = self.secret.secret_bytes();
        let index_bytes = index.to_be_bytes();

        let (left, chain_code) = if index >= HARDENED_OFFSET {
            hmac_sha512(&self.chain_code, &[&[0u8], &parent_key, &index_bytes])?
        } else {
            let parent_public_key = PublicKey::from_secret_key(secp, &self.secret);
            hmac_sha512(&self.chain_code, &[&parent_public_key.serialize(), &index_bytes])?
        };

        // IL >= n or a zero child both make this index unusable.
        let secret = SecretKey::from_slice(&left)
            .and_then(|child| child.add_tweak(&Scalar::from(self.secret)))
            .map_err(|e| Error::Derivation(format!("Invalid child key at index {}: {}", index, e)))?;

        Ok(Self { secret, chain_code })
    }

    /// The private scalar, big-endian, always 32 bytes
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    /// The private scalar as a minimal big-endian integer (leading zeros stripped)
    pub fn key_material(&self) -> Vec<u8> {
        let bytes = self.secret.secret_bytes();
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        bytes[start..].to_vec()
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey").finish_non_exhaustive()
    }
}

/// Derive a 32-byte seed for key generation from a root seed and path
pub fn derive_seed(root_seed: &[u8], path: &str) -> Result<[u8; DERIVED_SEED_LEN]> {
    let path: DerivationPath = path.parse()?;
    let node = ExtendedKey::master(root_seed)?.derive_path(&path)?;
    Ok(fit_seed(&node.key_material()))
}

/// Fit raw key material into exactly 32 bytes.
///
/// Material of 32 bytes or fewer is right-aligned (zero-padded on the left);
/// longer material keeps its leading 32 bytes. Every derived address depends
/// on this rule.
pub fn fit_seed(raw: &[u8]) -> [u8; DERIVED_SEED_LEN] {
    let mut seed = [0u8; DERIVED_SEED_LEN];
    if raw.len() <= DERIVED_SEED_LEN {
        seed[DERIVED_SEED_LEN - raw.len()..].copy_from_slice(raw);
    } else {
        seed.copy_from_slice(&raw[..DERIVED_SEED_LEN]);
    }
    seed
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Result<([u8; 32], [u8; 32])> {
    let mut hmac = Hmac::<Sha512>::new_from_slice(key)
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;
    for part in parts {
        hmac.update(part);
    }
    let result = hmac.finalize().into_bytes();

    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&result[0..32]);
    right.copy_from_slice(&result[32..64]);

    Ok((left, right))
}
