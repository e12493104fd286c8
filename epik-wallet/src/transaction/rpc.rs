//! JSON-RPC client for the account-chain node

use async_trait::async_trait;
use ethers_core::types::U256;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::cid::Cid;
use super::node::{ChainNode, ReceiptLookup};
use super::types::{Message, MessageReceipt, SignedMessage};
use crate::address::Address;
use crate::config::NodeConfig;
use crate::error::{Error, Result};

/// Method namespace exposed by the node
const NAMESPACE: &str = "EpiK";

/// Failure of a single call, before it is given a domain meaning
#[derive(Debug)]
enum CallError {
    /// The request never produced a JSON-RPC response
    Transport(String),
    /// The node answered with an error object
    Node(String),
}

impl CallError {
    fn into_error(self, on_node_error: impl FnOnce(String) -> Error) -> Error {
        match self {
            CallError::Transport(message) => Error::Transport(message),
            CallError::Node(message) => on_node_error(message),
        }
    }
}

/// A node connection. Each instance owns its own HTTP client, which is
/// released when the instance is dropped.
pub struct RpcNode {
    config: NodeConfig,
    client: reqwest::Client,
}

impl RpcNode {
    pub fn new(config: NodeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Send a JSON-RPC request
    async fn send_request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> std::result::Result<T, CallError> {
        let method = format!("{}.{}", NAMESPACE, method);
        debug!(method = %method, "rpc call");
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut builder = self.client.post(&self.config.url).json(&request);
        if let Some(token) = &self.config.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("Failed to send request: {}", e)))?;
        let status = response.status();

        let response_json: Value = response.json().await.map_err(|e| {
            CallError::Transport(format!("Failed to parse response (HTTP {}): {}", status, e))
        })?;

        if let Some(error) = response_json.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(CallError::Node(message));
        }

        let result = response_json.get("result").cloned().unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| CallError::Transport(format!("Failed to parse result of {}: {}", method, e)))
    }
}

/// Whether a node error only says the message or its block is unknown
fn is_missing_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("not found") || message.contains("could not find")
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

#[async_trait]
impl ChainNode for RpcNode {
    async fn get_next_nonce(&self, address: &Address) -> Result<u64> {
        self.send_request("MpoolGetNonce", vec![to_value(address)?])
            .await
            .map_err(|e| e.into_error(|m| Error::NotFound(format!("nonce for {}: {}", address, m))))
    }

    async fn estimate_fee_cap(&self, message: &Message, max_queue_blocks: i64) -> Result<U256> {
        let fee_cap: String = self
            .send_request("GasEstimateFeeCap", vec![to_value(message)?, json!(max_queue_blocks), json!([])])
            .await
            .map_err(|e| e.into_error(Error::GasEstimation))?;
        U256::from_dec_str(&fee_cap)
            .map_err(|e| Error::GasEstimation(format!("invalid fee cap {}: {}", fee_cap, e)))
    }

    async fn estimate_gas_limit(&self, message: &Message) -> Result<i64> {
        self.send_request("GasEstimateGasLimit", vec![to_value(message)?, json!([])])
            .await
            .map_err(|e| e.into_error(Error::GasEstimation))
    }

    async fn submit_signed(&self, message: &SignedMessage) -> Result<Cid> {
        self.send_request("MpoolPush", vec![to_value(message)?])
            .await
            .map_err(|e| e.into_error(Error::Submission))
    }

    async fn get_receipt(&self, cid: &Cid) -> Result<ReceiptLookup> {
        let found: std::result::Result<Value, CallError> =
            self.send_request("ChainGetMessage", vec![to_value(cid)?]).await;
        match found {
            Ok(Value::Null) => return Ok(ReceiptLookup::NotFound),
            Err(CallError::Node(message)) if is_missing_message(&message) => {
                return Ok(ReceiptLookup::NotFound)
            }
            Ok(_) => {}
            Err(e) => return Err(e.into_error(Error::Transport)),
        }

        let receipt: Option<MessageReceipt> = self
            .send_request("StateGetReceipt", vec![to_value(cid)?, json!([])])
            .await
            .map_err(|e| e.into_error(Error::Transport))?;
        Ok(receipt.map_or(ReceiptLookup::Pending, ReceiptLookup::Executed))
    }

    async fn lookup_balance(&self, address: &Address) -> Result<U256> {
        let balance: String = self
            .send_request("WalletBalance", vec![to_value(address)?])
            .await
            .map_err(|e| e.into_error(|m| Error::NotFound(format!("balance for {}: {}", address, m))))?;
        U256::from_dec_str(&balance)
            .map_err(|e| Error::Serialization(format!("invalid balance {}: {}", balance, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_errors_keep_their_text() {
        let error = CallError::Node("nonce already used".to_string()).into_error(Error::Submission);
        assert_eq!(error.to_string(), "Submission rejected: nonce already used");

        let error = CallError::Transport("connection refused".to_string()).into_error(Error::Submission);
        assert!(matches!(error, Error::Transport(_)));
    }

    /// Serve one canned JSON-RPC body per connection, in order
    async fn serve(bodies: Vec<&'static str>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/rpc/v0", listener.local_addr().unwrap());
        tokio::spawn(async move {
            for body in bodies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&request).to_lowercase();
                    if let Some(end) = text.find("\r\n\r\n") {
                        let length = text
                            .lines()
                            .find_map(|l| l.strip_prefix("content-length:"))
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .unwrap_or(0);
                        if request.len() >= end + 4 + length {
                            break;
                        }
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        url
    }

    fn node(url: String) -> RpcNode {
        RpcNode::new(NodeConfig::new(url, Some("token".to_string()))).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_message_is_not_found() {
        let cid = Cid::from_cbor(b"missing");
        let url = serve(vec![
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":1,"message":"failed to load message: blockstore: block not found"}}"#,
        ])
        .await;
        assert_eq!(node(url).get_receipt(&cid).await.unwrap(), ReceiptLookup::NotFound);

        let url = serve(vec![r#"{"jsonrpc":"2.0","id":1,"result":null}"#]).await;
        assert_eq!(node(url).get_receipt(&cid).await.unwrap(), ReceiptLookup::NotFound);
    }

    #[tokio::test]
    async fn test_other_lookup_errors_surface() {
        let url = serve(vec![
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":1,"message":"missing permission to invoke 'ChainGetMessage'"}}"#,
        ])
        .await;
        match node(url).get_receipt(&Cid::from_cbor(b"m")).await {
            Err(Error::Transport(reason)) => {
                assert_eq!(reason, "missing permission to invoke 'ChainGetMessage'")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_known_message_reads_receipt() {
        let cid = Cid::from_cbor(b"known");
        let url = serve(vec![
            r#"{"jsonrpc":"2.0","id":1,"result":{"Version":0}}"#,
            r#"{"jsonrpc":"2.0","id":1,"result":{"ExitCode":0,"Return":null,"GasUsed":10}}"#,
        ])
        .await;
        let lookup = node(url).get_receipt(&cid).await.unwrap();
        assert!(matches!(lookup, ReceiptLookup::Executed(r) if r.exit_code == 0 && r.gas_used == 10));

        let url = serve(vec![
            r#"{"jsonrpc":"2.0","id":1,"result":{"Version":0}}"#,
            r#"{"jsonrpc":"2.0","id":1,"result":null}"#,
        ])
        .await;
        assert_eq!(node(url).get_receipt(&cid).await.unwrap(), ReceiptLookup::Pending);
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_error() {
        let config = NodeConfig::new("http://127.0.0.1:9/rpc/v0", None)
            .with_timeout(std::time::Duration::from_millis(500));
        let node = RpcNode::new(config).unwrap();
        let result = node.get_next_nonce(&Address::new_id(1)).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
