//! EpiK wallet command-line tool
//!
//! Keys are never persisted: each command receives the key material it needs
//! (a hex key export, a root seed or a mnemonic) and works on an in-memory
//! wallet.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use ethers_core::types::{Address as EvmAddress, H256};
use tracing::info;
use tracing_subscriber::EnvFilter;

use epik_wallet::crypto::mnemonic::{generate_mnemonic, mnemonic_to_seed, MnemonicStrength};
use epik_wallet::transaction::ethereum::{self, format_address, parse_address};
use epik_wallet::transaction::{format_amount, parse_amount, Cid, EvmWallet, MessageDraft};
use epik_wallet::{Address, EvmConfig, Network, NodeConfig, SigType, Signature, Wallet};

#[derive(Parser)]
#[command(name = "epik-wallet")]
#[command(about = "EpiK multi-scheme wallet")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Account-chain node URL (falls back to EPIK_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Bearer token for the node (falls back to EPIK_RPC_TOKEN)
    #[arg(long, global = true)]
    rpc_token: Option<String>,

    /// Address network: mainnet or testnet
    #[arg(long, global = true)]
    network: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Ethereum-compatible node URL (falls back to EVM_RPC_URL)
    #[arg(long, global = true)]
    evm_rpc_url: Option<String>,

    /// Enable debug logging when RUST_LOG is unset
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh mnemonic phrase
    Mnemonic {
        /// Use 24 words instead of 12
        #[arg(long)]
        long: bool,
    },

    /// Derive a key from a root seed or mnemonic and print its address and export
    Derive {
        /// Signature type: bls or secp256k1
        #[arg(long, default_value = "bls")]
        sig_type: String,
        #[arg(long, default_value = "m/44'/1'/0'/0/0")]
        path: String,
        #[command(flatten)]
        seed: SeedArgs,
    },

    /// Print the address of a hex key export
    Import {
        /// Hex key export (falls back to EPIK_WALLET_KEY)
        #[arg(long)]
        key: Option<String>,
    },

    /// Sign a hex payload, or a content address with --cid
    Sign {
        #[arg(long)]
        key: Option<String>,
        #[arg(long, conflicts_with = "cid")]
        payload_hex: Option<String>,
        #[arg(long)]
        cid: Option<String>,
    },

    /// Verify a hex signature in binary form
    Verify {
        #[arg(long)]
        address: String,
        #[arg(long)]
        payload_hex: String,
        #[arg(long)]
        signature_hex: String,
    },

    /// Transfer tokens
    Send {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        to: String,
        /// Amount in whole tokens, e.g. 1.5
        #[arg(long)]
        amount: String,
    },

    /// Call an actor method with pre-encoded params
    Call {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        to: String,
        #[arg(long)]
        method: u64,
        #[arg(long, default_value = "")]
        params_hex: String,
        #[arg(long, default_value = "0")]
        amount: String,
    },

    /// Transfer the same amount to several targets
    Batch {
        #[arg(long)]
        key: Option<String>,
        /// Comma separated target addresses
        #[arg(long, value_delimiter = ',')]
        to: Vec<String>,
        #[arg(long)]
        amount: String,
        /// Skip the up-front balance check
        #[arg(long)]
        no_balance_check: bool,
    },

    /// Query the status of a message
    Status {
        #[arg(long)]
        cid: String,
    },

    /// Query an account balance
    Balance {
        #[arg(long)]
        address: String,
    },

    /// Estimate the fee of a plain transfer
    Fee {
        #[arg(long)]
        key: Option<String>,
    },

    /// Derive an Ethereum-compatible account
    EvmDerive {
        #[arg(long, default_value = ethereum::DEFAULT_PATH)]
        path: String,
        #[command(flatten)]
        seed: SeedArgs,
    },

    /// Transfer on the Ethereum-compatible chain
    EvmTransfer {
        #[arg(long, default_value = ethereum::DEFAULT_PATH)]
        path: String,
        #[command(flatten)]
        seed: SeedArgs,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
    },

    /// Query an Ethereum-compatible transaction
    EvmReceipt {
        #[arg(long)]
        hash: String,
    },
}

#[derive(clap::Args)]
struct SeedArgs {
    /// Hex root seed
    #[arg(long, conflicts_with = "mnemonic")]
    seed_hex: Option<String>,
    /// Mnemonic phrase
    #[arg(long)]
    mnemonic: Option<String>,
    /// Mnemonic passphrase
    #[arg(long)]
    passphrase: Option<String>,
}

impl SeedArgs {
    fn root_seed(&self) -> Result<Vec<u8>> {
        match (&self.seed_hex, &self.mnemonic) {
            (Some(seed), _) => hex::decode(seed.trim()).context("seed is not hex"),
            (None, Some(phrase)) => Ok(mnemonic_to_seed(phrase, self.passphrase.as_deref())?),
            (None, None) => bail!("either --seed-hex or --mnemonic is required"),
        }
    }
}

impl Cli {
    fn node_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.rpc_url {
            Some(url) => NodeConfig::new(url.clone(), std::env::var("EPIK_RPC_TOKEN").ok()),
            None => NodeConfig::from_env()?,
        };
        if let Some(token) = &self.rpc_token {
            config.auth_token = Some(token.clone()).filter(|t| !t.is_empty());
        }
        if let Some(network) = &self.network {
            config.network = Network::from_str(network)?;
        }
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    fn evm_config(&self) -> Result<EvmConfig> {
        let mut config = match &self.evm_rpc_url {
            Some(url) => EvmConfig::new(url.clone()),
            None => EvmConfig::from_env()?,
        };
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    fn network(&self) -> Result<Network> {
        match &self.network {
            Some(network) => Ok(network.parse::<Network>()?),
            None => Ok(std::env::var("EPIK_NETWORK")
                .ok()
                .map(|n| n.parse::<Network>())
                .transpose()?
                .unwrap_or_default()),
        }
    }
}

fn require_valid(valid: bool) -> Result<()> {
    if !valid {
        bail!("signature does not verify");
    }
    Ok(())
}

fn exported_key(key: &Option<String>) -> Result<String> {
    key.clone()
        .or_else(|| std::env::var("EPIK_WALLET_KEY").ok())
        .ok_or_else(|| anyhow!("--key or EPIK_WALLET_KEY is required"))
}

/// A connected wallet holding the key given on the command line as its default
fn keyed_wallet(cli: &Cli, key: &Option<String>) -> Result<(Wallet, Address)> {
    let mut wallet = Wallet::new();
    let address = wallet.import_hex(&exported_key(key)?)?;
    wallet.set_default(&address)?;
    wallet.set_node_config(cli.node_config()?);
    Ok((wallet, address))
}

fn evm_wallet(seed: &SeedArgs, path: &str) -> Result<(EvmWallet, EvmAddress)> {
    let mut wallet = EvmWallet::from_seed(&seed.root_seed()?)?;
    let address = wallet.derive(path, true)?;
    Ok((wallet, address))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Mnemonic { long } => {
            let strength = if *long { MnemonicStrength::Words24 } else { MnemonicStrength::Words12 };
            println!("{}", generate_mnemonic(strength)?);
        }

        Commands::Derive { sig_type, path, seed } => {
            let sig_type = SigType::from_str(sig_type)?;
            let mut wallet = Wallet::new();
            let address = wallet.generate_key(sig_type, &seed.root_seed()?, path)?;
            println!("address: {}", address.encode(cli.network()?));
            println!("export:  {}", wallet.export_hex(&address)?);
        }

        Commands::Import { key } => {
            let address = Wallet::new().import_hex(&exported_key(key)?)?;
            println!("{}", address.encode(cli.network()?));
        }

        Commands::Sign { key, payload_hex, cid } => {
            let mut wallet = Wallet::new();
            let address = wallet.import_hex(&exported_key(key)?)?;
            let signature = match (payload_hex, cid) {
                (_, Some(cid)) => wallet.sign_cid(Some(&address), cid)?,
                (Some(payload), None) => {
                    wallet.sign(Some(&address), &hex::decode(payload).context("payload is not hex")?)?
                }
                (None, None) => bail!("either --payload-hex or --cid is required"),
            };
            println!("{}", hex::encode(signature.to_bytes()));
        }

        Commands::Verify { address, payload_hex, signature_hex } => {
            let address: Address = address.parse()?;
            let payload = hex::decode(payload_hex).context("payload is not hex")?;
            let signature = Signature::from_bytes(&hex::decode(signature_hex).context("signature is not hex")?)?;
            let valid = Wallet::new().verify(&address, &payload, &signature)?;
            println!("{}", valid);
            require_valid(valid)?;
        }

        Commands::Send { key, to, amount } => {
            let (wallet, _) = keyed_wallet(&cli, key)?;
            let cid = wallet.send(&to.parse::<Address>()?, parse_amount(amount)?).await?;
            println!("{}", cid);
        }

        Commands::Call { key, to, method, params_hex, amount } => {
            let (wallet, _) = keyed_wallet(&cli, key)?;
            let params = hex::decode(params_hex).context("params are not hex")?;
            let cid = wallet
                .call_actor(&to.parse::<Address>()?, parse_amount(amount)?, *method, params)
                .await?;
            println!("{}", cid);
        }

        Commands::Batch { key, to, amount, no_balance_check } => {
            let (wallet, _) = keyed_wallet(&cli, key)?;
            let value = parse_amount(amount)?;
            let drafts = to
                .iter()
                .map(|t| Ok(MessageDraft::transfer(t.trim().parse::<Address>()?, value)))
                .collect::<epik_wallet::Result<Vec<_>>>()?;
            let report = wallet.push_batch(drafts, !no_balance_check).await?;
            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(cid) => println!("{}\tok\t{}", outcome.target, cid),
                    Err(e) => println!("{}\terror\t{}", outcome.target, e),
                }
            }
            if !report.all_succeeded() {
                bail!("{} of {} messages failed", report.failed().count(), report.outcomes.len());
            }
        }

        Commands::Status { cid } => {
            let cid: Cid = cid.parse()?;
            let mut wallet = Wallet::new();
            wallet.set_node_config(cli.node_config()?);
            println!("{}", wallet.message_status(&cid).await?);
        }

        Commands::Balance { address } => {
            let address: Address = address.parse()?;
            let mut wallet = Wallet::new();
            wallet.set_node_config(cli.node_config()?);
            let balance = wallet.balance(&address).await?;
            println!("{}", format_amount(balance)?);
        }

        Commands::Fee { key } => {
            let (wallet, _) = keyed_wallet(&cli, key)?;
            println!("{}", format_amount(wallet.estimate_transfer_fee().await?)?);
        }

        Commands::EvmDerive { path, seed } => {
            let (wallet, address) = evm_wallet(seed, path)?;
            println!("address: {}", format_address(&address));
            println!("export:  {}", wallet.export(&address)?);
        }

        Commands::EvmTransfer { path, seed, to, amount } => {
            let (wallet, from) = evm_wallet(seed, path)?;
            let provider = ethereum::connect(&cli.evm_config()?)?;
            let hash = wallet
                .transfer(&provider, &from, &parse_address(to)?, parse_amount(amount)?)
                .await?;
            info!(from = %format_address(&from), "transfer sent");
            println!("{:?}", hash);
        }

        Commands::EvmReceipt { hash } => {
            let hash = H256::from_str(hash).context("hash is not 32 bytes of hex")?;
            let provider = ethereum::connect(&cli.evm_config()?)?;
            println!("{}", ethereum::transaction_status(&provider, hash).await?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_verification_is_an_error() {
        assert!(require_valid(true).is_ok());
        let error = require_valid(false).unwrap_err();
        assert_eq!(error.to_string(), "signature does not verify");
    }
}
