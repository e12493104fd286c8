//! Ethereum-compatible chain wallet
//!
//! Accounts are derived from the same kind of root seed as the account-chain
//! keys, with standard BIP-32 paths such as `m/44'/60'/0'/0/0`. Transfers are
//! legacy transactions signed locally and pushed as raw bytes.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use ethers::core::types::transaction::eip2718::TypedTransaction;
use ethers::core::types::{
    Address, BlockNumber, Bytes, Signature, Transaction, TransactionReceipt, TransactionRequest, H256, U256,
};
use ethers::core::utils::{hash_message, to_checksum};
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use tracing::info;

use crate::config::EvmConfig;
use crate::crypto::derivation::{DerivationPath, ExtendedKey};
use crate::crypto::mnemonic::mnemonic_to_seed;
use crate::error::{Error, Result};

/// Default account path
pub const DEFAULT_PATH: &str = "m/44'/60'/0'/0/0";
/// Gas limit of a plain value transfer
pub const TRANSFER_GAS: u64 = 21_000;
/// Gas price bump applied to the node's suggestion for new transfers
pub const GAS_PRICE_BUMP_PERCENT: u64 = 10;
/// Price multiplier, in percent, used to replace a pending transaction with a cancellation
pub const CANCEL_RATE_PERCENT: u64 = 110;

/// Ethereum-compatible node operations used by [`EvmWallet`]
#[async_trait]
pub trait EvmNode: Send + Sync {
    /// Transaction count of `address` including pending transactions
    async fn pending_nonce(&self, address: Address) -> Result<U256>;
    async fn gas_price(&self) -> Result<U256>;
    async fn chain_id(&self) -> Result<U256>;
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256>;
    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>>;
    async fn receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>>;
    async fn balance(&self, address: Address) -> Result<U256>;
}

fn transport(e: impl fmt::Display) -> Error {
    Error::Transport(e.to_string())
}

#[async_trait]
impl<P: JsonRpcClient + 'static> EvmNode for Provider<P> {
    async fn pending_nonce(&self, address: Address) -> Result<U256> {
        self.get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(transport)
    }

    async fn gas_price(&self) -> Result<U256> {
        self.get_gas_price().await.map_err(transport)
    }

    async fn chain_id(&self) -> Result<U256> {
        self.get_chainid().await.map_err(transport)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let pending = Middleware::send_raw_transaction(self, raw)
            .await
            .map_err(|e| Error::Submission(e.to_string()))?;
        Ok(pending.tx_hash())
    }

    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>> {
        self.get_transaction(hash).await.map_err(transport)
    }

    async fn receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>> {
        self.get_transaction_receipt(hash).await.map_err(transport)
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        self.get_balance(address, None).await.map_err(transport)
    }
}

/// Open an HTTP provider bounded by the configured timeout
pub fn connect(config: &EvmConfig) -> Result<Provider<Http>> {
    let url = reqwest::Url::parse(&config.url)
        .map_err(|e| Error::InvalidInput(format!("invalid RPC URL {}: {}", config.url, e)))?;
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {}", e)))?;
    Ok(Provider::new(Http::new_with_client(url, client)))
}

/// Status of an Ethereum-compatible transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvmTxStatus {
    Pending,
    Success,
    Failed,
    NotFound,
}

impl EvmTxStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EvmTxStatus::Pending => "pending",
            EvmTxStatus::Success => "success",
            EvmTxStatus::Failed => "failed",
            EvmTxStatus::NotFound => "not_found",
        }
    }
}

impl fmt::Display for EvmTxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a `0x`-prefixed 20-byte hex address
pub fn parse_address(s: &str) -> Result<Address> {
    let hex_part = s
        .strip_prefix("0x")
        .filter(|h| h.len() == 40 && h.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| Error::InvalidAddress(format!("not an EVM address: {}", s)))?;
    let mut bytes = [0u8; 20];
    hex::decode_to_slice(hex_part, &mut bytes)
        .map_err(|e| Error::InvalidAddress(format!("not an EVM address {}: {}", s, e)))?;
    Ok(Address::from(bytes))
}

/// EIP-55 checksummed rendering
pub fn format_address(address: &Address) -> String {
    to_checksum(address, None)
}

fn scale(value: U256, percent: u64) -> U256 {
    value.saturating_mul(U256::from(percent)) / U256::from(100u64)
}

/// HD wallet for the Ethereum-compatible chain
pub struct EvmWallet {
    root: ExtendedKey,
    accounts: BTreeMap<Address, LocalWallet>,
}

impl EvmWallet {
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        Ok(Self {
            root: ExtendedKey::master(seed)?,
            accounts: BTreeMap::new(),
        })
    }

    pub fn from_mnemonic(phrase: &str, passphrase: Option<&str>) -> Result<Self> {
        Self::from_seed(&mnemonic_to_seed(phrase, passphrase)?)
    }

    /// Derive the account at `path`; with `pin` it is kept for signing
    pub fn derive(&mut self, path: &str, pin: bool) -> Result<Address> {
        let path: DerivationPath = path.parse()?;
        let node = self.root.derive_path(&path)?;
        let signer = LocalWallet::from_bytes(&node.secret_bytes())
            .map_err(|e| Error::InvalidKey(format!("derived key rejected: {}", e)))?;
        let address = signer.address();
        if pin {
            self.accounts.insert(address, signer);
            info!(address = %format_address(&address), path = %path, "evm account pinned");
        }
        Ok(address)
    }

    /// Pinned accounts, in address order
    pub fn accounts(&self) -> Vec<Address> {
        self.accounts.keys().copied().collect()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    fn signer(&self, address: &Address) -> Result<&LocalWallet> {
        self.accounts
            .get(address)
            .ok_or_else(|| Error::NotFound(format!("account not found: {}", format_address(address))))
    }

    /// Hex of the raw private key
    pub fn export(&self, address: &Address) -> Result<String> {
        Ok(hex::encode(self.signer(address)?.signer().to_bytes()))
    }

    pub fn sign_hash(&self, address: &Address, hash: H256) -> Result<Signature> {
        self.signer(address)?
            .sign_hash(hash)
            .map_err(|e| Error::InvalidKey(format!("signing failed: {}", e)))
    }

    /// Sign `text` with the EIP-191 personal message prefix
    pub fn sign_text(&self, address: &Address, text: &str) -> Result<Signature> {
        self.sign_hash(address, hash_message(text))
    }

    pub async fn balance<N: EvmNode + ?Sized>(&self, node: &N, address: &Address) -> Result<U256> {
        node.balance(*address).await
    }

    fn sign_legacy(&self, from: &Address, request: TransactionRequest, chain_id: u64) -> Result<Bytes> {
        let signer = self.signer(from)?.clone().with_chain_id(chain_id);
        let tx: TypedTransaction = request.from(*from).chain_id(chain_id).into();
        let signature = signer
            .sign_transaction_sync(&tx)
            .map_err(|e| Error::InvalidKey(format!("signing failed: {}", e)))?;
        Ok(tx.rlp_signed(&signature))
    }

    /// Send `value` from a pinned account
    pub async fn transfer<N: EvmNode + ?Sized>(
        &self,
        node: &N,
        from: &Address,
        to: &Address,
        value: U256,
    ) -> Result<H256> {
        self.signer(from)?;
        let nonce = node.pending_nonce(*from).await?;
        let gas_price = scale(node.gas_price().await?, 100 + GAS_PRICE_BUMP_PERCENT);
        let chain_id = node.chain_id().await?.as_u64();

        let request = TransactionRequest::new()
            .to(*to)
            .value(value)
            .gas(TRANSFER_GAS)
            .gas_price(gas_price)
            .nonce(nonce);
        let raw = self.sign_legacy(from, request, chain_id)?;
        let hash = node.send_raw_transaction(raw).await?;
        info!(hash = ?hash, nonce = %nonce, "evm transfer submitted");
        Ok(hash)
    }

    pub async fn receipt<N: EvmNode + ?Sized>(&self, node: &N, hash: H256) -> Result<EvmTxStatus> {
        transaction_status(node, hash).await
    }

    async fn pending_transaction<N: EvmNode + ?Sized>(&self, node: &N, hash: H256) -> Result<Transaction> {
        let tx = node
            .transaction(hash)
            .await?
            .ok_or_else(|| Error::NotFound(format!("transaction not found: {:?}", hash)))?;
        if tx.block_number.is_some() {
            return Err(Error::InvalidInput(format!("transaction already mined: {:?}", hash)));
        }
        self.signer(&tx.from)?;
        Ok(tx)
    }

    /// Replace a pending transaction, scaling its gas price and gas limit by
    /// `rate_percent` (which must exceed 100)
    pub async fn accelerate_tx<N: EvmNode + ?Sized>(&self, node: &N, hash: H256, rate_percent: u64) -> Result<H256> {
        if rate_percent <= 100 {
            return Err(Error::InvalidInput(format!("rate must exceed 100%, got {}%", rate_percent)));
        }
        let tx = self.pending_transaction(node, hash).await?;
        let chain_id = node.chain_id().await?.as_u64();
        let gas_price = tx
            .gas_price
            .ok_or_else(|| Error::InvalidInput("transaction has no gas price".to_string()))?;

        let mut request = TransactionRequest::new()
            .value(tx.value)
            .gas(scale(tx.gas, rate_percent))
            .gas_price(scale(gas_price, rate_percent))
            .nonce(tx.nonce)
            .data(tx.input.clone());
        if let Some(to) = tx.to {
            request = request.to(to);
        }
        let raw = self.sign_legacy(&tx.from, request, chain_id)?;
        let replacement = node.send_raw_transaction(raw).await?;
        info!(original = ?hash, replacement = ?replacement, "evm transaction accelerated");
        Ok(replacement)
    }

    /// Replace a pending transaction with a zero-value transfer to its own
    /// sender at a higher gas price
    pub async fn cancel_tx<N: EvmNode + ?Sized>(&self, node: &N, hash: H256) -> Result<H256> {
        let tx = self.pending_transaction(node, hash).await?;
        let chain_id = node.chain_id().await?.as_u64();
        let gas_price = tx
            .gas_price
            .ok_or_else(|| Error::InvalidInput("transaction has no gas price".to_string()))?;

        let request = TransactionRequest::new()
            .to(tx.from)
            .value(U256::zero())
            .gas(TRANSFER_GAS)
            .gas_price(scale(gas_price, CANCEL_RATE_PERCENT))
            .nonce(tx.nonce);
        let raw = self.sign_legacy(&tx.from, request, chain_id)?;
        let replacement = node.send_raw_transaction(raw).await?;
        info!(original = ?hash, replacement = ?replacement, "evm transaction cancelled");
        Ok(replacement)
    }
}

impl fmt::Debug for EvmWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmWallet")
            .field("accounts", &self.accounts())
            .finish_non_exhaustive()
    }
}

/// Classify a transaction by its inclusion and receipt
pub async fn transaction_status<N: EvmNode + ?Sized>(node: &N, hash: H256) -> Result<EvmTxStatus> {
    let Some(tx) = node.transaction(hash).await? else {
        return Ok(EvmTxStatus::NotFound);
    };
    if tx.block_number.is_none() {
        return Ok(EvmTxStatus::Pending);
    }
    Ok(match node.receipt(hash).await? {
        None => EvmTxStatus::Pending,
        Some(receipt) if receipt.status == Some(1u64.into()) => EvmTxStatus::Success,
        Some(_) => EvmTxStatus::Failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let address = parse_address("0x9858EfFD232B4033E47d90003D41EC34EcaEda94").unwrap();
        assert_eq!(format_address(&address), "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
        assert!(parse_address("9858EfFD232B4033E47d90003D41EC34EcaEda94").is_err());
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_scale() {
        assert_eq!(scale(U256::from(1000u64), 110), U256::from(1100u64));
        assert_eq!(scale(U256::from(21_000u64), 125), U256::from(26_250u64));
    }

    #[test]
    fn test_unpinned_account_cannot_sign() {
        let mut wallet = EvmWallet::from_seed(&[1u8; 32]).unwrap();
        let address = wallet.derive(DEFAULT_PATH, false).unwrap();
        assert!(!wallet.contains(&address));
        assert!(matches!(wallet.export(&address), Err(Error::NotFound(_))));
        assert_eq!(wallet.derive(DEFAULT_PATH, true).unwrap(), address);
        assert_eq!(wallet.export(&address).unwrap().len(), 64);
    }
}
