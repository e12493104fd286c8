//! Hash helpers shared by addresses, signatures and content addresses

use blake2::digest::consts::{U20, U32, U4};
use blake2::{Blake2b, Digest};

/// blake2b with a 32-byte digest
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Blake2b::<U32>::digest(data));
    out
}

/// blake2b with a 20-byte digest, used for hashed address payloads
pub fn blake2b_160(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Blake2b::<U20>::digest(data));
    out
}

/// blake2b with a 4-byte digest, used for address checksums
pub fn blake2b_32(data: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&Blake2b::<U4>::digest(data));
    out
}
