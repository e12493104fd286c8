//! Tests for key derivation

use std::collections::HashSet;

use epik_wallet::crypto::derivation::*;
use epik_wallet::crypto::mnemonic::*;
use epik_wallet::crypto::sigs::{SignatureScheme, Secp256k1Scheme};
use epik_wallet::{KeyInfo, SigType, Wallet};

const BIP32_SEED: &str = "000102030405060708090a0b0c0d0e0f";

#[test]
fn test_bip32_vector_one() {
    let seed = hex::decode(BIP32_SEED).unwrap();
    let master = ExtendedKey::master(&seed).unwrap();
    assert_eq!(
        hex::encode(master.secret_bytes()),
        "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35"
    );

    let hardened = master.derive_path(&"m/0'".parse().unwrap()).unwrap();
    assert_eq!(
        hex::encode(hardened.secret_bytes()),
        "edb2e14f9ee77d26dd93b4ecede8d16ed408ce149b6cd80b0715a2d911a0afea"
    );

    let normal = hardened.derive_child(1).unwrap();
    assert_eq!(
        hex::encode(normal.secret_bytes()),
        "3c6cb8d0f6a264c91ea8b5030fadaa8e538b020f0a387421a12de9319dc93368"
    );
}

#[test]
fn test_derive_seed_is_deterministic() {
    let seed = hex::decode(BIP32_SEED).unwrap();
    let first = derive_seed(&seed, "m/44'/1'/0'/0/0").unwrap();
    let second = derive_seed(&seed, "m/44'/1'/0'/0/0").unwrap();
    assert_eq!(first, second);
    assert_ne!(first, derive_seed(&seed, "m/44'/1'/0'/0/1").unwrap());
}

#[test]
fn test_derive_seed_matches_node_scalar() {
    let seed = hex::decode(BIP32_SEED).unwrap();
    let derived = derive_seed(&seed, "m/0'/1").unwrap();
    assert_eq!(
        hex::encode(derived),
        "3c6cb8d0f6a264c91ea8b5030fadaa8e538b020f0a387421a12de9319dc93368"
    );
}

#[test]
fn test_malformed_paths_fail() {
    let seed = [1u8; 32];
    for path in ["", "m", "m/44''", "m/a", "44/0", "m/4294967295"] {
        assert!(derive_seed(&seed, path).is_err(), "accepted {:?}", path);
    }
    assert!(derive_seed(&[1u8; 8], "m/0").is_err());
}

#[test]
fn test_ten_thousand_paths_are_unique() {
    let seed = [0x5au8; 32];
    let parent = ExtendedKey::master(&seed)
        .unwrap()
        .derive_path(&"m/44'/1'/0'/0".parse().unwrap())
        .unwrap();
    let scheme = Secp256k1Scheme;

    let mut addresses = HashSet::new();
    for index in 0..10_000u32 {
        let child = parent.derive_child(index).unwrap();
        let key = scheme.generate_from_seed(&fit_seed(&child.key_material())).unwrap();
        let address = scheme.address(&scheme.to_public(&key).unwrap()).unwrap();
        assert!(addresses.insert(address), "collision at index {}", index);
    }
}

#[test]
fn test_zero_seed_scenario() {
    let seed = [0u8; 32];
    let path = "m/44'/1'/0'/0/0";

    let mut wallet = Wallet::new();
    let address = wallet.generate_key(SigType::Secp256k1, &seed, path).unwrap();

    let mut again = Wallet::new();
    assert_eq!(again.generate_key(SigType::Secp256k1, &seed, path).unwrap(), address);

    let exported = wallet.export(&address).unwrap();
    let mut imported = Wallet::new();
    assert_eq!(imported.import(exported.clone()).unwrap(), address);
    assert_eq!(imported.import_hex(&exported.to_hex().unwrap()).unwrap(), address);
    assert_eq!(KeyInfo::from_hex(&wallet.export_hex(&address).unwrap()).unwrap(), exported);
}

#[test]
fn test_mnemonic_root_seed() {
    let mnemonic = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    let seed = mnemonic_to_seed(mnemonic, None).unwrap();

    let mut wallet = Wallet::new();
    let bls = wallet.generate_key(SigType::Bls, &seed, "m/44'/1'/0'/0/0").unwrap();
    let secp = wallet.generate_key(SigType::Secp256k1, &seed, "m/44'/1'/0'/0/0").unwrap();
    assert!(bls.to_string().starts_with("f3"));
    assert!(secp.to_string().starts_with("f1"));
    assert_eq!(wallet.list().len(), 2);
}
