//! Content addresses of encoded messages
//!
//! A content address is a CIDv1 with the dag-cbor codec and a blake2b-256
//! multihash. Its string form is multibase base32 (`b` prefix).

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::hash::blake2b_256;
use crate::error::{Error, Result};

/// `version 1 || dag-cbor || blake2b-256 (varint 0xb220) || digest length 32`
const PREFIX: [u8; 6] = [0x01, 0x71, 0xa0, 0xe4, 0x02, 0x20];
const DIGEST_LEN: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid {
    digest: [u8; DIGEST_LEN],
}

impl Cid {
    /// Address a canonical CBOR encoding
    pub fn from_cbor(encoded: &[u8]) -> Self {
        Self { digest: blake2b_256(encoded) }
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Binary CID; these are the bytes a signer signs
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PREFIX.len() + DIGEST_LEN);
        out.extend_from_slice(&PREFIX);
        out.extend_from_slice(&self.digest);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let digest = bytes
            .strip_prefix(&PREFIX[..])
            .filter(|digest| digest.len() == DIGEST_LEN)
            .ok_or_else(|| Error::InvalidInput("not a dag-cbor blake2b-256 CID".to_string()))?;
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(digest);
        Ok(Self { digest: out })
    }
}

impl FromStr for Cid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let encoded = s
            .trim()
            .strip_prefix('b')
            .ok_or_else(|| Error::InvalidInput(format!("unsupported CID encoding: {}", s)))?;
        let bytes = BASE32_NOPAD
            .decode(encoded.to_ascii_uppercase().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid CID {}: {}", s, e)))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", BASE32_NOPAD.encode(&self.to_bytes()).to_ascii_lowercase())
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self)
    }
}

/// JSON form used by the node: `{"/": "bafy..."}`
#[derive(Serialize, Deserialize)]
struct CidLink {
    #[serde(rename = "/")]
    link: String,
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        CidLink { link: self.to_string() }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let link = CidLink::deserialize(deserializer)?;
        link.link.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_form() {
        let cid = Cid::from_cbor(&[0x80]);
        let rendered = cid.to_string();
        assert!(rendered.starts_with("bafy2bzace"), "{}", rendered);
        assert_eq!(rendered.parse::<Cid>().unwrap(), cid);
    }

    #[test]
    fn test_binary_form() {
        let cid = Cid::from_cbor(b"x");
        let bytes = cid.to_bytes();
        assert_eq!(bytes.len(), 38);
        assert_eq!(&bytes[..6], &PREFIX);
        assert_eq!(Cid::from_bytes(&bytes).unwrap(), cid);
        assert!(Cid::from_bytes(&bytes[..20]).is_err());
    }

    #[test]
    fn test_json_link() {
        let cid = Cid::from_cbor(&[]);
        let json = serde_json::to_value(cid).unwrap();
        assert_eq!(json["/"], cid.to_string());
        assert_eq!(serde_json::from_value::<Cid>(json).unwrap(), cid);
    }

    #[test]
    fn test_rejects_other_encodings() {
        assert!("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".parse::<Cid>().is_err());
        assert!("b!!".parse::<Cid>().is_err());
    }
}
