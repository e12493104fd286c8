//! Message construction and submission
//!
//! A message moves through drafted, nonced, fee-estimated, addressed, signed
//! and submitted, strictly in that order. A failure at any stage aborts the
//! whole attempt; nothing reaches the node before the final push, and no
//! stage is retried.

use std::future::Future;
use std::time::Duration;

use ethers_core::types::U256;
use tracing::{debug, info};

use super::cid::Cid;
use super::node::{ChainNode, ReceiptLookup};
use super::types::{format_amount, Message, MessageStatus, SignedMessage, METHOD_SEND};
use crate::account::Wallet;
use crate::address::Address;
use crate::crypto::sigs::Signature;
use crate::error::{Error, Result};

/// Fee-cap estimation target, in blocks
pub const DEFAULT_MAX_QUEUE_BLOCKS: i64 = 20;

/// Scale an estimated gas limit by 1.25
pub fn apply_gas_margin(gas_limit: i64) -> i64 {
    let scaled = i128::from(gas_limit) * 5 / 4;
    scaled.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// What the caller wants sent. `params` is an opaque, already encoded blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    /// Sender; the wallet default is used when unset
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub method: u64,
    pub params: Vec<u8>,
}

impl MessageDraft {
    /// A plain value transfer
    pub fn transfer(to: Address, value: U256) -> Self {
        Self::call(to, value, METHOD_SEND, Vec::new())
    }

    /// An actor method call
    pub fn call(to: Address, value: U256, method: u64, params: Vec<u8>) -> Self {
        Self { from: None, to, value, method, params }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }
}

/// Drives messages from one wallet through one node.
///
/// Holds no nonce state: the node is asked for the next nonce on every
/// message.
pub struct MessageSender<'a, N: ChainNode + ?Sized> {
    wallet: &'a Wallet,
    node: &'a N,
    timeout: Option<Duration>,
}

impl<'a, N: ChainNode + ?Sized> MessageSender<'a, N> {
    pub fn new(wallet: &'a Wallet, node: &'a N) -> Self {
        Self {
            wallet,
            node,
            timeout: None,
        }
    }

    /// Bound every remote call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn wallet(&self) -> &Wallet {
        self.wallet
    }

    async fn remote<T>(&self, call: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Error::Transport(format!("{} timed out after {:?}", call, limit)))?,
            None => fut.await,
        }
    }

    /// The sending address, which must be held by the wallet
    pub fn resolve_sender(&self, from: Option<&Address>) -> Result<Address> {
        let from = self.wallet.keystore().resolve(from)?;
        if !self.wallet.has(&from) {
            return Err(Error::NotFound(format!("key not found: {}", from)));
        }
        Ok(from)
    }

    /// Build a fully populated, unsigned message
    pub async fn prepare(&self, draft: MessageDraft) -> Result<Message> {
        let from = self.resolve_sender(draft.from.as_ref())?;
        let mut message = Message::new(from, draft.to, draft.value, draft.method, draft.params);
        debug!(from = %message.from, to = %message.to, method = message.method, "message drafted");

        message.nonce = self
            .remote("nonce lookup", self.node.get_next_nonce(&message.from))
            .await?;
        debug!(nonce = message.nonce, "message nonced");

        message.gas_fee_cap = self
            .remote("fee cap estimate", self.node.estimate_fee_cap(&message, DEFAULT_MAX_QUEUE_BLOCKS))
            .await?;
        let estimated = self
            .remote("gas limit estimate", self.node.estimate_gas_limit(&message))
            .await?;
        message.gas_limit = apply_gas_margin(estimated);
        debug!(
            fee_cap = %message.gas_fee_cap,
            estimated_gas = estimated,
            gas_limit = message.gas_limit,
            "message fee estimated"
        );

        Ok(message)
    }

    /// Sign the content address of a populated message
    pub fn sign_message(&self, message: Message) -> Result<SignedMessage> {
        let cid = message.cid();
        debug!(cid = %cid, "message addressed");
        let signature = self.wallet.sign(Some(&message.from), &cid.to_bytes())?;
        debug!(cid = %cid, sig_type = %signature.sig_type, "message signed");
        Ok(SignedMessage::new(message, signature))
    }

    /// Push a signed message unchanged; rejections carry the node's reason
    pub async fn submit(&self, signed: &SignedMessage) -> Result<Cid> {
        let cid = self.remote("submission", self.node.submit_signed(signed)).await?;
        info!(cid = %cid, from = %signed.message.from, nonce = signed.message.nonce, "message submitted");
        Ok(cid)
    }

    /// Run a draft through every stage
    pub async fn push(&self, draft: MessageDraft) -> Result<Cid> {
        let message = self.prepare(draft).await?;
        let signed = self.sign_message(message)?;
        self.submit(&signed).await
    }

    /// Call an actor method from the default address; `params` is passed through as is
    pub async fn call_actor(&self, to: &Address, value: U256, method: u64, params: Vec<u8>) -> Result<Cid> {
        self.push(MessageDraft::call(to.clone(), value, method, params)).await
    }

    /// Submit a populated message with a signature produced elsewhere.
    /// Nothing in the message is changed, so the signature stays valid.
    pub async fn submit_presigned(&self, message: Message, signature: Signature) -> Result<Cid> {
        self.submit(&SignedMessage::new(message, signature)).await
    }

    /// Query the status of a previously returned identifier
    pub async fn status(&self, cid: &Cid) -> Result<MessageStatus> {
        let lookup = self.remote("receipt lookup", self.node.get_receipt(cid)).await?;
        Ok(match lookup {
            ReceiptLookup::NotFound => MessageStatus::NotFound,
            ReceiptLookup::Pending => MessageStatus::Pending,
            ReceiptLookup::Executed(receipt) => receipt.status(),
        })
    }

    pub async fn balance(&self, address: &Address) -> Result<U256> {
        self.remote("balance lookup", self.node.lookup_balance(address)).await
    }

    /// Fail with `InsufficientBalance` unless `address` holds at least `required`
    pub async fn ensure_balance(&self, address: &Address, required: U256) -> Result<U256> {
        let available = self.balance(address).await?;
        if available < required {
            return Err(Error::InsufficientBalance {
                required: format_amount(required)?,
                available: format_amount(available)?,
            });
        }
        Ok(available)
    }

    /// Fee cap times gas limit of a zero-value self transfer from the default address
    pub async fn estimate_transfer_fee(&self) -> Result<U256> {
        let from = self.resolve_sender(None)?;
        let message = Message::new(from.clone(), from, U256::zero(), METHOD_SEND, Vec::new());
        let gas_limit = self
            .remote("gas limit estimate", self.node.estimate_gas_limit(&message))
            .await?;
        let fee_cap = self
            .remote("fee cap estimate", self.node.estimate_fee_cap(&message, DEFAULT_MAX_QUEUE_BLOCKS))
            .await?;
        Ok(fee_cap.saturating_mul(U256::from(gas_limit.max(0) as u64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_margin() {
        assert_eq!(apply_gas_margin(1000), 1250);
        assert_eq!(apply_gas_margin(0), 0);
        assert_eq!(apply_gas_margin(3), 3);
        assert_eq!(apply_gas_margin(i64::MAX), i64::MAX);
    }

    #[test]
    fn test_draft_builders() {
        let draft = MessageDraft::transfer(Address::new_id(1), U256::from(5u64));
        assert_eq!(draft.method, METHOD_SEND);
        assert!(draft.from.is_none());
        assert_eq!(draft.from(Address::new_id(2)).from, Some(Address::new_id(2)));
    }
}
