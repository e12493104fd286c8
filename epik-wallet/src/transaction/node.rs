//! The chain-node contract consumed by the submission pipeline

use std::sync::Arc;

use async_trait::async_trait;
use ethers_core::types::U256;

use super::cid::Cid;
use super::types::{Message, MessageReceipt, SignedMessage};
use crate::address::Address;
use crate::error::Result;

/// Result of a receipt lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptLookup {
    /// The node does not know the message
    NotFound,
    /// Known but not executed yet
    Pending,
    Executed(MessageReceipt),
}

/// Remote node operations needed to nonce, price, submit and track messages
#[async_trait]
pub trait ChainNode: Send + Sync {
    /// Next sequence number expected from `address`, counting pending messages
    async fn get_next_nonce(&self, address: &Address) -> Result<u64>;

    /// Fee cap for `message`, targeting inclusion within `max_queue_blocks`
    async fn estimate_fee_cap(&self, message: &Message, max_queue_blocks: i64) -> Result<U256>;

    /// Gas the node expects `message` to consume
    async fn estimate_gas_limit(&self, message: &Message) -> Result<i64>;

    /// Push a signed message to the mempool, returning its identifier
    async fn submit_signed(&self, message: &SignedMessage) -> Result<Cid>;

    async fn get_receipt(&self, cid: &Cid) -> Result<ReceiptLookup>;

    async fn lookup_balance(&self, address: &Address) -> Result<U256>;
}

#[async_trait]
impl<T: ChainNode + ?Sized> ChainNode for Arc<T> {
    async fn get_next_nonce(&self, address: &Address) -> Result<u64> {
        (**self).get_next_nonce(address).await
    }

    async fn estimate_fee_cap(&self, message: &Message, max_queue_blocks: i64) -> Result<U256> {
        (**self).estimate_fee_cap(message, max_queue_blocks).await
    }

    async fn estimate_gas_limit(&self, message: &Message) -> Result<i64> {
        (**self).estimate_gas_limit(message).await
    }

    async fn submit_signed(&self, message: &SignedMessage) -> Result<Cid> {
        (**self).submit_signed(message).await
    }

    async fn get_receipt(&self, cid: &Cid) -> Result<ReceiptLookup> {
        (**self).get_receipt(cid).await
    }

    async fn lookup_balance(&self, address: &Address) -> Result<U256> {
        (**self).lookup_balance(address).await
    }
}
