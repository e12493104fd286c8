//! BLS signature scheme over BLS12-381
//!
//! Public keys live in G1 (48 bytes compressed), signatures in G2 (96 bytes
//! compressed). Private keys are stored little-endian, which is the reverse
//! of the big-endian scalar encoding used by `blst`.

use blst::min_pk::{AggregateSignature, PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;
use rand::{rngs::OsRng, RngCore};

use super::{SigType, SignatureScheme};
use crate::address::{Address, Protocol};
use crate::error::{Error, Result};

/// Hash-to-curve domain separation tag
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";
/// Private key length
pub const PRIVATE_KEY_LEN: usize = 32;
/// Minimum seed length for deterministic generation
pub const SEED_LEN: usize = 32;
/// Compressed public key length
pub const PUBLIC_KEY_LEN: usize = 48;
/// Compressed signature length
pub const SIGNATURE_LEN: usize = 96;

/// The BLS scheme
#[derive(Debug, Clone, Copy, Default)]
pub struct BlsScheme;

fn to_little_endian(key: &SecretKey) -> Vec<u8> {
    let mut bytes = key.to_bytes();
    bytes.reverse();
    bytes.to_vec()
}

fn secret_key(private_key: &[u8]) -> Result<SecretKey> {
    if private_key.len() != PRIVATE_KEY_LEN {
        return Err(Error::InvalidKey(format!(
            "BLS private key must be {} bytes, got {}",
            PRIVATE_KEY_LEN,
            private_key.len()
        )));
    }
    let mut big_endian = [0u8; PRIVATE_KEY_LEN];
    big_endian.copy_from_slice(private_key);
    big_endian.reverse();
    SecretKey::from_bytes(&big_endian)
        .map_err(|e| Error::InvalidKey(format!("BLS private key: {:?}", e)))
}

fn public_key_of(address: &Address) -> Option<PublicKey> {
    if address.protocol() != Protocol::Bls {
        return None;
    }
    PublicKey::from_bytes(address.payload()).ok()
}

impl SignatureScheme for BlsScheme {
    fn sig_type(&self) -> SigType {
        SigType::Bls
    }

    fn generate(&self) -> Result<Vec<u8>> {
        let mut ikm = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut ikm);
        self.generate_from_seed(&ikm)
    }

    fn generate_from_seed(&self, seed: &[u8]) -> Result<Vec<u8>> {
        if seed.len() < SEED_LEN {
            return Err(Error::InvalidSeed(format!(
                "BLS seed must be at least {} bytes, got {}",
                SEED_LEN,
                seed.len()
            )));
        }
        let key = SecretKey::key_gen(&seed[..SEED_LEN], &[])
            .map_err(|e| Error::InvalidSeed(format!("BLS key generation failed: {:?}", e)))?;
        Ok(to_little_endian(&key))
    }

    fn to_public(&self, private_key: &[u8]) -> Result<Vec<u8>> {
        Ok(secret_key(private_key)?.sk_to_pk().compress().to_vec())
    }

    fn address(&self, public_key: &[u8]) -> Result<Address> {
        Address::new_bls(public_key)
    }

    fn sign(&self, private_key: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
        let key = secret_key(private_key)?;
        Ok(key.sign(msg, DST, &[]).compress().to_vec())
    }

    fn verify(&self, signature: &[u8], address: &Address, msg: &[u8]) -> bool {
        if signature.len() != SIGNATURE_LEN {
            return false;
        }
        let Some(public_key) = public_key_of(address) else {
            return false;
        };
        let Ok(signature) = Signature::from_bytes(signature) else {
            return false;
        };
        signature.verify(true, msg, DST, &[], &public_key, true) == BLST_ERROR::BLST_SUCCESS
    }
}

/// Aggregate several BLS signatures into one
pub fn aggregate(signatures: &[&[u8]]) -> Result<Vec<u8>> {
    if signatures.is_empty() {
        return Err(Error::InvalidInput("nothing to aggregate".to_string()));
    }
    let parsed = signatures
        .iter()
        .map(|bytes| {
            Signature::from_bytes(bytes)
                .map_err(|e| Error::InvalidInput(format!("BLS signature: {:?}", e)))
        })
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&Signature> = parsed.iter().collect();

    let aggregated = AggregateSignature::aggregate(&refs, true)
        .map_err(|e| Error::InvalidInput(format!("BLS aggregation failed: {:?}", e)))?;
    Ok(aggregated.to_signature().compress().to_vec())
}

/// Verify an aggregate signature; `addresses[i]` signed `messages[i]`
pub fn verify_aggregate(signature: &[u8], addresses: &[Address], messages: &[&[u8]]) -> bool {
    if addresses.is_empty() || addresses.len() != messages.len() {
        return false;
    }
    let Some(public_keys) = addresses.iter().map(public_key_of).collect::<Option<Vec<_>>>() else {
        return false;
    };
    let Ok(signature) = Signature::from_bytes(signature) else {
        return false;
    };
    let key_refs: Vec<&PublicKey> = public_keys.iter().collect();
    signature.aggregate_verify(true, messages, DST, &key_refs, true) == BLST_ERROR::BLST_SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(fill: u8) -> (Vec<u8>, Address) {
        let scheme = BlsScheme;
        let key = scheme.generate_from_seed(&[fill; 32]).unwrap();
        let address = scheme.address(&scheme.to_public(&key).unwrap()).unwrap();
        (key, address)
    }

    #[test]
    fn test_sign_and_verify() {
        let scheme = BlsScheme;
        let (key, address) = keypair(3);
        assert_eq!(address.payload().len(), PUBLIC_KEY_LEN);

        let signature = scheme.sign(&key, b"payload").unwrap();
        assert_eq!(signature.len(), SIGNATURE_LEN);
        assert!(scheme.verify(&signature, &address, b"payload"));
        assert!(!scheme.verify(&signature, &address, b"tampered"));
    }

    #[test]
    fn test_private_key_is_little_endian() {
        let key = BlsScheme.generate_from_seed(&[4u8; 32]).unwrap();
        let expected = SecretKey::key_gen(&[4u8; 32], &[]).unwrap().to_bytes();
        let mut reversed = key.clone();
        reversed.reverse();
        assert_eq!(reversed, expected.to_vec());
    }

    #[test]
    fn test_seed_too_short() {
        assert!(matches!(BlsScheme.generate_from_seed(&[1u8; 16]), Err(Error::InvalidSeed(_))));
    }

    #[test]
    fn test_wrong_protocol_address_fails() {
        let (key, _) = keypair(5);
        let signature = BlsScheme.sign(&key, b"m").unwrap();
        assert!(!BlsScheme.verify(&signature, &Address::new_id(1), b"m"));
    }

    #[test]
    fn test_aggregate_round_trip() {
        let (k1, a1) = keypair(6);
        let (k2, a2) = keypair(7);
        let s1 = BlsScheme.sign(&k1, b"first").unwrap();
        let s2 = BlsScheme.sign(&k2, b"second").unwrap();

        let aggregated = aggregate(&[&s1, &s2]).unwrap();
        assert_eq!(aggregated.len(), SIGNATURE_LEN);
        let messages: [&[u8]; 2] = [b"first", b"second"];
        assert!(verify_aggregate(&aggregated, &[a1.clone(), a2.clone()], &messages));

        let swapped: [&[u8]; 2] = [b"second", b"first"];
        assert!(!verify_aggregate(&aggregated, &[a1, a2], &swapped));
        assert!(aggregate(&[]).is_err());
    }
}
