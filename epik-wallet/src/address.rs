//! Account-chain addresses
//!
//! An address is a protocol byte followed by a payload. The string form is a
//! network prefix, the protocol digit, and either the decimal actor id (ID
//! protocol) or lower-case base32 of `payload || checksum`.

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::hash::{blake2b_160, blake2b_32};
use crate::error::{Error, Result};

/// Length of hashed payloads (secp256k1 and actor addresses)
pub const PAYLOAD_HASH_LEN: usize = 20;
/// Length of a compressed BLS public key
pub const BLS_PUBLIC_KEY_LEN: usize = 48;
/// Length of an uncompressed secp256k1 public key
pub const SECP_PUBLIC_KEY_LEN: usize = 65;
/// Length of the checksum appended to the string form
pub const CHECKSUM_LEN: usize = 4;

/// Address protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    /// Actor id assigned by the chain
    Id = 0,
    /// blake2b-160 of a secp256k1 public key
    Secp256k1 = 1,
    /// blake2b-160 of actor creation data
    Actor = 2,
    /// Compressed BLS public key
    Bls = 3,
}

impl Protocol {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Protocol::Id),
            1 => Ok(Protocol::Secp256k1),
            2 => Ok(Protocol::Actor),
            3 => Ok(Protocol::Bls),
            _ => Err(Error::InvalidAddress(format!("unknown protocol {}", b))),
        }
    }

    fn payload_len(self) -> Option<usize> {
        match self {
            Protocol::Id => None,
            Protocol::Secp256k1 | Protocol::Actor => Some(PAYLOAD_HASH_LEN),
            Protocol::Bls => Some(BLS_PUBLIC_KEY_LEN),
        }
    }
}

/// Network an address string is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn prefix(self) -> char {
        match self {
            Network::Mainnet => 'f',
            Network::Testnet => 't',
        }
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "main" | "f" => Ok(Network::Mainnet),
            "testnet" | "test" | "t" => Ok(Network::Testnet),
            other => Err(Error::InvalidInput(format!("unknown network: {}", other))),
        }
    }
}

/// An immutable, protocol-tagged address. Equality is byte-wise.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    protocol: Protocol,
    payload: Vec<u8>,
}

impl Address {
    /// ID address for an actor id
    pub fn new_id(id: u64) -> Self {
        Self {
            protocol: Protocol::Id,
            payload: encode_uvarint(id),
        }
    }

    /// secp256k1 address from an uncompressed public key
    pub fn new_secp256k1(public_key: &[u8]) -> Result<Self> {
        if public_key.len() != SECP_PUBLIC_KEY_LEN {
            return Err(Error::InvalidAddress(format!(
                "secp256k1 public key must be {} bytes, got {}",
                SECP_PUBLIC_KEY_LEN,
                public_key.len()
            )));
        }
        Ok(Self {
            protocol: Protocol::Secp256k1,
            payload: blake2b_160(public_key).to_vec(),
        })
    }

    /// BLS address from a compressed public key
    pub fn new_bls(public_key: &[u8]) -> Result<Self> {
        if public_key.len() != BLS_PUBLIC_KEY_LEN {
            return Err(Error::InvalidAddress(format!(
                "BLS public key must be {} bytes, got {}",
                BLS_PUBLIC_KEY_LEN,
                public_key.len()
            )));
        }
        Ok(Self {
            protocol: Protocol::Bls,
            payload: public_key.to_vec(),
        })
    }

    /// Decode the byte form `protocol || payload`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (&first, payload) = bytes
            .split_first()
            .ok_or_else(|| Error::InvalidAddress("empty address bytes".to_string()))?;
        let protocol = Protocol::from_byte(first)?;
        match protocol.payload_len() {
            Some(len) if payload.len() != len => {
                return Err(Error::InvalidAddress(format!(
                    "payload length {} does not match protocol {:?}",
                    payload.len(),
                    protocol
                )));
            }
            Some(_) => {}
            None => {
                decode_uvarint(payload)?;
            }
        }
        Ok(Self {
            protocol,
            payload: payload.to_vec(),
        })
    }

    /// The byte form `protocol || payload`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.payload.len());
        out.push(self.protocol.as_byte());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The actor id, for ID addresses
    pub fn id(&self) -> Option<u64> {
        match self.protocol {
            Protocol::Id => decode_uvarint(&self.payload).ok(),
            _ => None,
        }
    }

    /// blake2b-32 over `protocol || payload`
    pub fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        blake2b_32(&self.to_bytes())
    }

    /// Render the address for a specific network
    pub fn encode(&self, network: Network) -> String {
        let mut out = String::new();
        out.push(network.prefix());
        out.push(char::from(b'0' + self.protocol.as_byte()));
        match self.protocol {
            Protocol::Id => {
                // Constructors guarantee a well-formed varint.
                out.push_str(&self.id().unwrap_or_default().to_string());
            }
            _ => {
                let mut data = self.payload.clone();
                data.extend_from_slice(&self.checksum());
                out.push_str(&BASE32_NOPAD.encode(&data).to_ascii_lowercase());
            }
        }
        out
    }

    /// Parse an address string, returning the network it was rendered for
    pub fn parse_with_network(s: &str) -> Result<(Self, Network)> {
        let mut chars = s.chars();
        let network = match chars.next() {
            Some('f') => Network::Mainnet,
            Some('t') => Network::Testnet,
            _ => return Err(Error::InvalidAddress(format!("unknown network prefix: {}", s))),
        };
        let protocol = match chars.next().and_then(|c| c.to_digit(10)) {
            Some(d) => Protocol::from_byte(d as u8)?,
            None => return Err(Error::InvalidAddress(format!("missing protocol: {}", s))),
        };
        let raw = chars.as_str();
        if raw.is_empty() {
            return Err(Error::InvalidAddress(format!("missing payload: {}", s)));
        }

        if protocol == Protocol::Id {
            if raw.len() > 20 || !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::InvalidAddress(format!("invalid actor id: {}", s)));
            }
            let id = raw
                .parse::<u64>()
                .map_err(|_| Error::InvalidAddress(format!("invalid actor id: {}", s)))?;
            return Ok((Address::new_id(id), network));
        }

        if raw.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(Error::InvalidAddress(format!("address must be lower case: {}", s)));
        }
        let decoded = BASE32_NOPAD
            .decode(raw.to_ascii_uppercase().as_bytes())
            .map_err(|e| Error::InvalidAddress(format!("invalid base32 payload: {}", e)))?;
        if decoded.len() <= CHECKSUM_LEN {
            return Err(Error::InvalidAddress(format!("payload too short: {}", s)));
        }
        let (payload, checksum) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
        let mut bytes = vec![protocol.as_byte()];
        bytes.extend_from_slice(payload);
        let address = Address::from_bytes(&bytes)?;
        if address.checksum() != checksum {
            return Err(Error::InvalidAddress(format!("checksum mismatch: {}", s)));
        }
        Ok((address, network))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse_with_network(s).map(|(address, _)| address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(Network::Mainnet))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn encode_uvarint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

fn decode_uvarint(bytes: &[u8]) -> Result<u64> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if i >= 10 || (i == 9 && byte > 1) {
            return Err(Error::InvalidAddress("actor id overflows u64".to_string()));
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            if i + 1 != bytes.len() {
                return Err(Error::InvalidAddress("trailing bytes after actor id".to_string()));
            }
            if byte == 0 && i > 0 {
                return Err(Error::InvalidAddress("actor id is not minimally encoded".to_string()));
            }
            return Ok(value);
        }
    }
    Err(Error::InvalidAddress("truncated actor id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_address() {
        let address = Address::new_id(1024);
        assert_eq!(address.to_bytes(), vec![0x00, 0x80, 0x08]);
        assert_eq!(address.to_string(), "f01024");
        assert_eq!(address.encode(Network::Testnet), "t01024");
        assert_eq!("f01024".parse::<Address>().unwrap(), address);
        assert_eq!(address.id(), Some(1024));
    }

    #[test]
    fn test_id_address_bounds() {
        let max = Address::new_id(u64::MAX);
        assert_eq!(max.to_string().parse::<Address>().unwrap(), max);
        assert!("f018446744073709551616".parse::<Address>().is_err());
        assert!("f0".parse::<Address>().is_err());
        assert!("f0-1".parse::<Address>().is_err());
    }

    #[test]
    fn test_secp256k1_round_trip() {
        let mut public_key = vec![0x04];
        public_key.extend_from_slice(&[7u8; 64]);
        let address = Address::new_secp256k1(&public_key).unwrap();
        let rendered = address.to_string();
        assert!(rendered.starts_with("f1"));

        let (parsed, network) = Address::parse_with_network(&rendered).unwrap();
        assert_eq!(parsed, address);
        assert_eq!(network, Network::Mainnet);
        assert_eq!(Address::from_bytes(&address.to_bytes()).unwrap(), address);
    }

    #[test]
    fn test_bls_round_trip() {
        let address = Address::new_bls(&[9u8; BLS_PUBLIC_KEY_LEN]).unwrap();
        let rendered = address.encode(Network::Testnet);
        assert!(rendered.starts_with("t3"));
        assert_eq!(rendered.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_checksum_is_verified() {
        let address = Address::from_bytes(&[2u8; 21]).unwrap();
        let mut rendered = address.to_string();
        let last = rendered.pop().unwrap();
        rendered.push(if last == 'a' { 'b' } else { 'a' });
        assert!(rendered.parse::<Address>().is_err());
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("".parse::<Address>().is_err());
        assert!("x1abc".parse::<Address>().is_err());
        assert!("f9abc".parse::<Address>().is_err());
        assert!("f1".parse::<Address>().is_err());
        assert!(Address::new_bls(&[1u8; 10]).is_err());
        assert!(Address::new_secp256k1(&[1u8; 33]).is_err());
        assert!(Address::from_bytes(&[1u8, 2, 3]).is_err());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let address = Address::new_id(7);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"f07\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
