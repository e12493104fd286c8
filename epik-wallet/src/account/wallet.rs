//! Wallet orchestration: key generation, signing and message submission

use std::sync::Arc;

use ethers_core::types::U256;
use tracing::info;

use super::keystore::{KeyInfo, KeyStore};
use crate::address::Address;
use crate::config::NodeConfig;
use crate::crypto::derivation::derive_seed;
use crate::crypto::sigs::{SigType, Signature, SignatureRegistry};
use crate::error::{Error, Result};
use crate::transaction::{
    BatchReport, ChainNode, Cid, Message, MessageDraft, MessageSender, MessageStatus, RpcNode, METHOD_SEND,
};

/// A key store bound to a signature registry and an optional node endpoint.
///
/// One caller per wallet is assumed; see the crate documentation for the
/// rule on concurrent submissions from the same address.
#[derive(Debug)]
pub struct Wallet {
    keystore: KeyStore,
    registry: Arc<SignatureRegistry>,
    node_config: Option<NodeConfig>,
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet {
    /// A wallet with the default signature schemes
    pub fn new() -> Self {
        Self::with_registry(Arc::new(SignatureRegistry::with_defaults()))
    }

    pub fn with_registry(registry: Arc<SignatureRegistry>) -> Self {
        Self {
            keystore: KeyStore::new(),
            registry,
            node_config: None,
        }
    }

    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    pub fn keystore(&self) -> &KeyStore {
        &self.keystore
    }

    /// Derive a key for `sig_type` from `seed` along `path` and store it
    pub fn generate_key(&mut self, sig_type: SigType, seed: &[u8], path: &str) -> Result<Address> {
        let scheme = self.registry.get(sig_type)?;
        let derived = derive_seed(seed, path)?;
        let private_key = scheme.generate_from_seed(&derived)?;
        let address = scheme.address(&scheme.to_public(&private_key)?)?;

        self.keystore.insert(address.clone(), KeyInfo::new(sig_type, private_key));
        info!(address = %address, sig_type = %sig_type, path = path, "key generated");
        Ok(address)
    }

    /// Generate a key from the operating system's RNG and store it
    pub fn generate_random_key(&mut self, sig_type: SigType) -> Result<Address> {
        let scheme = self.registry.get(sig_type)?;
        let private_key = scheme.generate()?;
        let address = scheme.address(&scheme.to_public(&private_key)?)?;

        self.keystore.insert(address.clone(), KeyInfo::new(sig_type, private_key));
        info!(address = %address, sig_type = %sig_type, "random key generated");
        Ok(address)
    }

    pub fn list(&self) -> Vec<Address> {
        self.keystore.list()
    }

    pub fn has(&self, address: &Address) -> bool {
        self.keystore.has(address)
    }

    pub fn export(&self, address: &Address) -> Result<KeyInfo> {
        self.keystore.export(address)
    }

    /// Export in the hex text form
    pub fn export_hex(&self, address: &Address) -> Result<String> {
        self.export(address)?.to_hex()
    }

    pub fn import(&mut self, info: KeyInfo) -> Result<Address> {
        let sig_type = info.sig_type;
        let address = self.keystore.import(&self.registry, info)?;
        info!(address = %address, sig_type = %sig_type, "key imported");
        Ok(address)
    }

    /// Import from the hex text form
    pub fn import_hex(&mut self, exported: &str) -> Result<Address> {
        self.import(KeyInfo::from_hex(exported)?)
    }

    pub fn delete(&mut self, address: &Address) -> Result<()> {
        self.keystore.delete(address).map(|_| ())
    }

    pub fn set_default(&mut self, address: &Address) -> Result<()> {
        self.keystore.set_default(address)
    }

    pub fn default_address(&self) -> Result<&Address> {
        self.keystore.default_address()
    }

    /// Sign `payload` with the key of `address`, or of the default address
    pub fn sign(&self, address: Option<&Address>, payload: &[u8]) -> Result<Signature> {
        let address = self.keystore.resolve(address)?;
        let info = self.keystore.get(&address)?;
        let scheme = self.registry.get(info.sig_type)?;
        let data = scheme.sign(&info.private_key, payload)?;
        Ok(Signature::new(info.sig_type, data))
    }

    /// Sign the binary form of a content address given as a string
    pub fn sign_cid(&self, address: Option<&Address>, cid: &str) -> Result<Signature> {
        let cid: Cid = cid.parse()?;
        self.sign(address, &cid.to_bytes())
    }

    /// Check `signature` over `payload` against `address` with the scheme
    /// named by the signature
    pub fn verify(&self, address: &Address, payload: &[u8], signature: &Signature) -> Result<bool> {
        let scheme = self.registry.get(signature.sig_type)?;
        Ok(scheme.verify(&signature.data, address, payload))
    }

    /// Store the node endpoint. No connection is opened.
    pub fn set_rpc(&mut self, url: impl Into<String>, token: impl Into<String>) {
        let network = self.node_config.as_ref().map(|c| c.network).unwrap_or_default();
        self.node_config = Some(NodeConfig::new(url, Some(token.into())).with_network(network));
    }

    pub fn set_node_config(&mut self, config: NodeConfig) {
        self.node_config = Some(config);
    }

    pub fn node_config(&self) -> Result<&NodeConfig> {
        self.node_config
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("RPC endpoint is not configured".to_string()))
    }

    /// Open a node connection for one operation; it is released when dropped
    pub fn connect(&self) -> Result<RpcNode> {
        RpcNode::new(self.node_config()?.clone())
    }

    /// A pipeline driving messages from this wallet through `node`
    pub fn sender<'a, N: ChainNode + ?Sized>(&'a self, node: &'a N) -> MessageSender<'a, N> {
        let sender = MessageSender::new(self, node);
        match &self.node_config {
            Some(config) => sender.with_timeout(config.timeout),
            None => sender,
        }
    }

    /// Transfer `value` from the default address
    pub async fn send(&self, to: &Address, value: U256) -> Result<Cid> {
        self.keystore.default_address()?;
        let node = self.connect()?;
        self.sender(&node).push(MessageDraft::transfer(to.clone(), value)).await
    }

    /// Call an actor method from the default address with an opaque params blob
    pub async fn call_actor(&self, to: &Address, value: U256, method: u64, params: Vec<u8>) -> Result<Cid> {
        self.keystore.default_address()?;
        let node = self.connect()?;
        self.sender(&node).call_actor(to, value, method, params).await
    }

    pub async fn message_status(&self, cid: &Cid) -> Result<MessageStatus> {
        let node = self.connect()?;
        self.sender(&node).status(cid).await
    }

    pub async fn balance(&self, address: &Address) -> Result<U256> {
        let node = self.connect()?;
        self.sender(&node).balance(address).await
    }

    /// JSON of an unsigned transfer from the default address, for signing elsewhere
    pub fn create_send_message(&self, to: &Address, value: U256) -> Result<String> {
        let from = self.keystore.default_address()?.clone();
        let message = Message::new(from, to.clone(), value, METHOD_SEND, Vec::new());
        Ok(serde_json::to_string(&message)?)
    }

    /// Content address of a JSON message
    pub fn message_cid(json: &str) -> Result<Cid> {
        let message: Message = serde_json::from_str(json)?;
        Ok(message.cid())
    }

    /// Submit a fully populated JSON message with an externally produced signature
    pub async fn submit_presigned(&self, json: &str, signature: Signature) -> Result<Cid> {
        let message: Message = serde_json::from_str(json)?;
        let node = self.connect()?;
        self.sender(&node).submit_presigned(message, signature).await
    }

    /// Fee of a plain transfer from the default address
    pub async fn estimate_transfer_fee(&self) -> Result<U256> {
        self.keystore.default_address()?;
        let node = self.connect()?;
        self.sender(&node).estimate_transfer_fee().await
    }

    /// Push several drafts, reporting each outcome
    pub async fn push_batch(&self, drafts: Vec<MessageDraft>, check_balance: bool) -> Result<BatchReport> {
        let node = self.connect()?;
        self.sender(&node).push_batch(drafts, check_balance).await
    }
}
