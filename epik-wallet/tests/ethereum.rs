//! Tests for the Ethereum-compatible wallet against a mock node

use std::sync::Mutex;

use async_trait::async_trait;
use ethers::core::types::{
    Address, Bytes, NameOrAddress, Transaction, TransactionReceipt, TransactionRequest, H256, U256,
};
use ethers::core::utils::keccak256;
use ethers::core::utils::rlp::Rlp;

use epik_wallet::transaction::ethereum::{format_address, parse_address, DEFAULT_PATH};
use epik_wallet::transaction::{EvmNode, EvmTxStatus, EvmWallet};
use epik_wallet::{Error, Result};

const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

#[derive(Default)]
struct MockEvmNode {
    sent: Mutex<Vec<Bytes>>,
    pending: Option<Transaction>,
    mined: Option<(Transaction, TransactionReceipt)>,
}

#[async_trait]
impl EvmNode for MockEvmNode {
    async fn pending_nonce(&self, _address: Address) -> Result<U256> {
        Ok(U256::from(3u64))
    }

    async fn gas_price(&self) -> Result<U256> {
        Ok(U256::from(1000u64))
    }

    async fn chain_id(&self) -> Result<U256> {
        Ok(U256::from(1u64))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let hash = H256::from(keccak256(&raw));
        self.sent.lock().unwrap().push(raw);
        Ok(hash)
    }

    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>> {
        if let Some(tx) = self.pending.as_ref().filter(|tx| tx.hash == hash) {
            return Ok(Some(tx.clone()));
        }
        Ok(self.mined.as_ref().filter(|(tx, _)| tx.hash == hash).map(|(tx, _)| tx.clone()))
    }

    async fn receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>> {
        Ok(self.mined.as_ref().filter(|(tx, _)| tx.hash == hash).map(|(_, r)| r.clone()))
    }

    async fn balance(&self, _address: Address) -> Result<U256> {
        Ok(U256::exp10(18))
    }
}

impl MockEvmNode {
    fn last_sent(&self) -> TransactionRequest {
        let raw = self.sent.lock().unwrap().last().cloned().unwrap();
        let (request, _signature) = TransactionRequest::decode_signed_rlp(&Rlp::new(&raw)).unwrap();
        request
    }
}

fn pinned_wallet() -> (EvmWallet, Address) {
    let mut wallet = EvmWallet::from_mnemonic(MNEMONIC, None).unwrap();
    let address = wallet.derive(DEFAULT_PATH, true).unwrap();
    (wallet, address)
}

fn pending_tx(from: Address, to: Address) -> Transaction {
    Transaction {
        hash: H256::repeat_byte(0xab),
        nonce: U256::from(3u64),
        from,
        to: Some(to),
        value: U256::from(500u64),
        gas_price: Some(U256::from(1000u64)),
        gas: U256::from(21_000u64),
        ..Default::default()
    }
}

#[test]
fn test_known_address() {
    let (wallet, address) = pinned_wallet();
    assert_eq!(format_address(&address), "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
    assert_eq!(wallet.accounts(), vec![address]);
}

#[test]
fn test_sign_hash_and_text_recover() {
    let (wallet, address) = pinned_wallet();
    let hash = H256::from(keccak256(b"payload"));
    assert_eq!(wallet.sign_hash(&address, hash).unwrap().recover(hash).unwrap(), address);
    assert_eq!(wallet.sign_text(&address, "hello").unwrap().recover("hello").unwrap(), address);

    let stranger = parse_address("0x0000000000000000000000000000000000000001").unwrap();
    assert!(matches!(wallet.sign_text(&stranger, "hello"), Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_transfer_builds_legacy_transaction() {
    let (wallet, from) = pinned_wallet();
    let to = parse_address("0x00000000000000000000000000000000000000aa").unwrap();
    let node = MockEvmNode::default();

    let hash = wallet.transfer(&node, &from, &to, U256::from(777u64)).await.unwrap();
    let raw = node.sent.lock().unwrap()[0].clone();
    assert_eq!(hash, H256::from(keccak256(&raw)));

    let request = node.last_sent();
    assert_eq!(request.nonce, Some(U256::from(3u64)));
    assert_eq!(request.gas, Some(U256::from(21_000u64)));
    assert_eq!(request.gas_price, Some(U256::from(1100u64)));
    assert_eq!(request.value, Some(U256::from(777u64)));
    assert_eq!(request.to, Some(NameOrAddress::Address(to)));
}

#[tokio::test]
async fn test_accelerate_and_cancel_reuse_nonce() {
    let (wallet, from) = pinned_wallet();
    let to = parse_address("0x00000000000000000000000000000000000000aa").unwrap();
    let tx = pending_tx(from, to);
    let node = MockEvmNode { pending: Some(tx.clone()), ..Default::default() };

    wallet.accelerate_tx(&node, tx.hash, 125).await.unwrap();
    let request = node.last_sent();
    assert_eq!(request.nonce, Some(U256::from(3u64)));
    assert_eq!(request.gas_price, Some(U256::from(1250u64)));
    assert_eq!(request.gas, Some(U256::from(26_250u64)));
    assert_eq!(request.value, Some(U256::from(500u64)));

    wallet.cancel_tx(&node, tx.hash).await.unwrap();
    let request = node.last_sent();
    assert_eq!(request.nonce, Some(U256::from(3u64)));
    assert_eq!(request.gas_price, Some(U256::from(1100u64)));
    assert_eq!(request.value, Some(U256::zero()));
    assert_eq!(request.to, Some(NameOrAddress::Address(from)));

    assert!(matches!(wallet.accelerate_tx(&node, tx.hash, 100).await, Err(Error::InvalidInput(_))));
    assert!(matches!(
        wallet.cancel_tx(&node, H256::repeat_byte(1)).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_receipt_status() {
    let (wallet, from) = pinned_wallet();
    let to = parse_address("0x00000000000000000000000000000000000000aa").unwrap();
    let pending = pending_tx(from, to);

    let mut mined = pending_tx(from, to);
    mined.hash = H256::repeat_byte(0xcd);
    mined.block_number = Some(10u64.into());
    let receipt = TransactionReceipt { status: Some(1u64.into()), ..Default::default() };

    let node = MockEvmNode {
        pending: Some(pending.clone()),
        mined: Some((mined.clone(), receipt)),
        ..Default::default()
    };

    assert_eq!(wallet.receipt(&node, pending.hash).await.unwrap(), EvmTxStatus::Pending);
    assert_eq!(wallet.receipt(&node, mined.hash).await.unwrap(), EvmTxStatus::Success);
    assert_eq!(wallet.receipt(&node, H256::zero()).await.unwrap(), EvmTxStatus::NotFound);
    assert!(matches!(wallet.cancel_tx(&node, mined.hash).await, Err(Error::InvalidInput(_))));
    assert_eq!(wallet.balance(&node, &from).await.unwrap(), U256::exp10(18));
}
