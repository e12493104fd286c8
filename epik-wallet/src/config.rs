//! Remote node configuration

use std::time::Duration;

use crate::address::Network;
use crate::error::{Error, Result};

/// Default bound on a single remote call
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the account-chain node endpoint
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// JSON-RPC endpoint URL
    pub url: String,
    /// Bearer token sent in the Authorization header
    pub auth_token: Option<String>,
    /// Upper bound for each remote call
    pub timeout: Duration,
    /// Network prefix used when rendering addresses
    pub network: Network,
}

impl NodeConfig {
    /// Create a configuration with the default timeout on mainnet
    pub fn new(url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: auth_token.filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            network: Network::Mainnet,
        }
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the address network
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Build a configuration from `EPIK_RPC_URL`, `EPIK_RPC_TOKEN`,
    /// `EPIK_RPC_TIMEOUT_SECS` and `EPIK_NETWORK`
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("EPIK_RPC_URL")
            .map_err(|_| Error::InvalidInput("EPIK_RPC_URL is not set".to_string()))?;
        let token = std::env::var("EPIK_RPC_TOKEN").ok();
        let timeout = timeout_from_env("EPIK_RPC_TIMEOUT_SECS")?;
        let network = match std::env::var("EPIK_NETWORK") {
            Ok(value) => value.parse()?,
            Err(_) => Network::Mainnet,
        };

        Ok(Self::new(url, token).with_timeout(timeout).with_network(network))
    }
}

/// Configuration for the Ethereum-compatible node endpoint
#[derive(Debug, Clone)]
pub struct EvmConfig {
    /// JSON-RPC endpoint URL
    pub url: String,
    /// Upper bound for each remote call
    pub timeout: Duration,
}

impl EvmConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Build a configuration from `EVM_RPC_URL` and `EVM_RPC_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("EVM_RPC_URL")
            .map_err(|_| Error::InvalidInput("EVM_RPC_URL is not set".to_string()))?;
        let timeout = timeout_from_env("EVM_RPC_TIMEOUT_SECS")?;
        Ok(Self { url, timeout })
    }
}

fn timeout_from_env(key: &str) -> Result<Duration> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| Error::InvalidInput(format!("{} must be a number of seconds: {}", key, value))),
        Err(_) => Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_dropped() {
        let config = NodeConfig::new("http://127.0.0.1:1234/rpc/v0", Some(String::new()));
        assert!(config.auth_token.is_none());
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_builder_overrides() {
        let config = NodeConfig::new("http://node", Some("token".to_string()))
            .with_timeout(Duration::from_secs(5))
            .with_network(Network::Testnet);
        assert_eq!(config.auth_token.as_deref(), Some("token"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.network, Network::Testnet);
    }
}
