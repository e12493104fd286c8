//! secp256k1 signature scheme
//!
//! Private keys are 32-byte big-endian scalars. Messages are hashed with
//! blake2b-256 and signed into a 65-byte recoverable signature `r || s || v`.
//! Verification recovers the public key and compares its address.

use rand::{rngs::OsRng, RngCore};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use super::{SigType, SignatureScheme};
use crate::address::{Address, Protocol};
use crate::crypto::hash::blake2b_256;
use crate::error::{Error, Result};

/// Private key length
pub const PRIVATE_KEY_LEN: usize = 32;
/// Minimum seed length for deterministic generation
pub const SEED_LEN: usize = 32;
/// Recoverable signature length
pub const SIGNATURE_LEN: usize = 65;

/// The secp256k1 scheme
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Scheme;

fn secret_key(private_key: &[u8]) -> Result<SecretKey> {
    if private_key.len() != PRIVATE_KEY_LEN {
        return Err(Error::InvalidKey(format!(
            "secp256k1 private key must be {} bytes, got {}",
            PRIVATE_KEY_LEN,
            private_key.len()
        )));
    }
    SecretKey::from_slice(private_key)
        .map_err(|e| Error::InvalidKey(format!("secp256k1 private key: {}", e)))
}

fn message_digest(msg: &[u8]) -> Result<Message> {
    Message::from_digest_slice(&blake2b_256(msg))
        .map_err(|e| Error::InvalidInput(format!("secp256k1 digest: {}", e)))
}

impl SignatureScheme for Secp256k1Scheme {
    fn sig_type(&self) -> SigType {
        SigType::Secp256k1
    }

    fn generate(&self) -> Result<Vec<u8>> {
        let mut bytes = [0u8; PRIVATE_KEY_LEN];
        loop {
            OsRng.fill_bytes(&mut bytes);
            if let Ok(key) = SecretKey::from_slice(&bytes) {
                return Ok(key.secret_bytes().to_vec());
            }
        }
    }

    fn generate_from_seed(&self, seed: &[u8]) -> Result<Vec<u8>> {
        if seed.len() < SEED_LEN {
            return Err(Error::InvalidSeed(format!(
                "secp256k1 seed must be at least {} bytes, got {}",
                SEED_LEN,
                seed.len()
            )));
        }
        let key = SecretKey::from_slice(&seed[..SEED_LEN])
            .map_err(|e| Error::InvalidSeed(format!("seed is not a valid secp256k1 scalar: {}", e)))?;
        Ok(key.secret_bytes().to_vec())
    }

    fn to_public(&self, private_key: &[u8]) -> Result<Vec<u8>> {
        let key = secret_key(private_key)?;
        let secp = Secp256k1::signing_only();
        Ok(PublicKey::from_secret_key(&secp, &key).serialize_uncompressed().to_vec())
    }

    fn address(&self, public_key: &[u8]) -> Result<Address> {
        Address::new_secp256k1(public_key)
    }

    fn sign(&self, private_key: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
        let key = secret_key(private_key)?;
        let message = message_digest(msg)?;
        let secp = Secp256k1::signing_only();
        let (recovery_id, compact) = secp.sign_ecdsa_recoverable(&message, &key).serialize_compact();

        let mut signature = Vec::with_capacity(SIGNATURE_LEN);
        signature.extend_from_slice(&compact);
        signature.push(recovery_id.to_i32() as u8);
        Ok(signature)
    }

    fn verify(&self, signature: &[u8], address: &Address, msg: &[u8]) -> bool {
        if signature.len() != SIGNATURE_LEN || address.protocol() != Protocol::Secp256k1 {
            return false;
        }
        let Ok(recovery_id) = RecoveryId::from_i32(i32::from(signature[64])) else {
            return false;
        };
        let Ok(recoverable) = RecoverableSignature::from_compact(&signature[..64], recovery_id) else {
            return false;
        };
        let Ok(message) = message_digest(msg) else {
            return false;
        };

        let secp = Secp256k1::verification_only();
        match secp.recover_ecdsa(&message, &recoverable) {
            Ok(public_key) => Address::new_secp256k1(&public_key.serialize_uncompressed())
                .map(|recovered| recovered == *address)
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}
