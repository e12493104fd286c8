//! In-memory, address-indexed key store

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::crypto::sigs::{SigType, SignatureRegistry};
use crate::error::{Error, Result};

/// A private key and the scheme it belongs to
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    #[serde(rename = "Type")]
    pub sig_type: SigType,
    #[serde(rename = "PrivateKey", with = "crate::serde_helpers::base64_bytes")]
    pub private_key: Vec<u8>,
}

impl KeyInfo {
    pub fn new(sig_type: SigType, private_key: Vec<u8>) -> Self {
        Self { sig_type, private_key }
    }

    /// Text export form: hex of the JSON record
    pub fn to_hex(&self) -> Result<String> {
        Ok(hex::encode(serde_json::to_vec(self)?))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| Error::InvalidInput(format!("key export is not hex: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl fmt::Debug for KeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyInfo")
            .field("sig_type", &self.sig_type)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Address-indexed key records plus an optional default address.
///
/// The default, when set, always names a key held by the store.
#[derive(Debug, Default)]
pub struct KeyStore {
    keys: HashMap<Address, KeyInfo>,
    default: Option<Address>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any existing record for the address
    pub fn insert(&mut self, address: Address, info: KeyInfo) {
        self.keys.insert(address, info);
    }

    pub fn has(&self, address: &Address) -> bool {
        self.keys.contains_key(address)
    }

    pub fn get(&self, address: &Address) -> Result<&KeyInfo> {
        self.keys
            .get(address)
            .ok_or_else(|| Error::NotFound(format!("key not found: {}", address)))
    }

    /// All addresses, sorted
    pub fn list(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.keys.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn set_default(&mut self, address: &Address) -> Result<()> {
        if !self.has(address) {
            return Err(Error::NotFound(format!("key not found: {}", address)));
        }
        self.default = Some(address.clone());
        Ok(())
    }

    pub fn default_address(&self) -> Result<&Address> {
        self.default.as_ref().ok_or(Error::NoDefault)
    }

    /// The given address, or the default when none is given
    pub fn resolve(&self, address: Option<&Address>) -> Result<Address> {
        match address {
            Some(address) => Ok(address.clone()),
            None => self.default_address().cloned(),
        }
    }

    /// A copy of the raw key record; no serialization or encryption is applied
    pub fn export(&self, address: &Address) -> Result<KeyInfo> {
        self.get(address).cloned()
    }

    /// Derive the record's address through its scheme and insert it
    pub fn import(&mut self, registry: &SignatureRegistry, info: KeyInfo) -> Result<Address> {
        let address = registry.address_for(info.sig_type, &info.private_key)?;
        self.insert(address.clone(), info);
        Ok(address)
    }

    /// Remove a key, clearing the default if it pointed at it
    pub fn delete(&mut self, address: &Address) -> Result<KeyInfo> {
        let info = self
            .keys
            .remove(address)
            .ok_or_else(|| Error::NotFound(format!("key not found: {}", address)))?;
        if self.default.as_ref() == Some(address) {
            self.default = None;
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secp_record(fill: u8) -> KeyInfo {
        KeyInfo::new(SigType::Secp256k1, vec![fill; 32])
    }

    #[test]
    fn test_insert_get_list() {
        let registry = SignatureRegistry::with_defaults();
        let mut store = KeyStore::new();
        let a = store.import(&registry, secp_record(1)).unwrap();
        let b = store.import(&registry, secp_record(2)).unwrap();

        assert!(store.has(&a));
        assert_eq!(store.get(&b).unwrap(), &secp_record(2));
        assert_eq!(store.len(), 2);
        let listed = store.list();
        assert!(listed.contains(&a) && listed.contains(&b));
        assert!(matches!(store.get(&Address::new_id(1)), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_insert_overwrites() {
        let mut store = KeyStore::new();
        let address = Address::new_id(9);
        store.insert(address.clone(), secp_record(1));
        store.insert(address.clone(), secp_record(2));
        assert_eq!(store.export(&address).unwrap(), secp_record(2));
    }

    #[test]
    fn test_default_must_exist() {
        let mut store = KeyStore::new();
        assert!(matches!(store.default_address(), Err(Error::NoDefault)));
        assert!(matches!(store.set_default(&Address::new_id(1)), Err(Error::NotFound(_))));
        assert!(matches!(store.resolve(None), Err(Error::NoDefault)));

        store.insert(Address::new_id(1), secp_record(1));
        store.set_default(&Address::new_id(1)).unwrap();
        assert_eq!(store.resolve(None).unwrap(), Address::new_id(1));

        store.delete(&Address::new_id(1)).unwrap();
        assert!(matches!(store.default_address(), Err(Error::NoDefault)));
    }

    #[test]
    fn test_import_rejects_bad_key() {
        let registry = SignatureRegistry::with_defaults();
        let mut store = KeyStore::new();
        let result = store.import(&registry, KeyInfo::new(SigType::Secp256k1, vec![0u8; 32]));
        assert!(matches!(result, Err(Error::InvalidKey(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_hex_export_form() {
        let info = KeyInfo::new(SigType::Bls, vec![7u8; 32]);
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.starts_with(r#"{"Type":"bls","PrivateKey":""#));
        assert_eq!(KeyInfo::from_hex(&info.to_hex().unwrap()).unwrap(), info);
        assert!(KeyInfo::from_hex("zz").is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", secp_record(0xab));
        assert!(!rendered.contains("171"));
        assert!(rendered.contains("redacted"));
    }
}
