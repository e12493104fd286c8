//! Transaction functionality
//!
//! Message model and canonical encoding, content addresses, the chain-node
//! contract with its JSON-RPC client, the submission pipeline, and the
//! Ethereum-compatible wallet.

pub mod types;
pub mod cbor;
pub mod cid;
pub mod node;
pub mod rpc;
pub mod pipeline;
pub mod batch;
pub mod ethereum;

pub use types::*;
pub use cid::Cid;
pub use node::{ChainNode, ReceiptLookup};
pub use rpc::RpcNode;
pub use pipeline::{apply_gas_margin, MessageDraft, MessageSender, DEFAULT_MAX_QUEUE_BLOCKS};
pub use batch::{BatchOutcome, BatchReport};
pub use ethereum::{EvmNode, EvmTxStatus, EvmWallet};
