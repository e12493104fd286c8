//! Message, receipt and amount types for the account chain

use std::fmt;

use ethers_core::types::U256;
use ethers_core::utils::{format_units, parse_units};
use serde::{Deserialize, Serialize};

use super::cbor::CborWriter;
use super::cid::Cid;
use crate::address::Address;
use crate::crypto::sigs::{SigType, Signature};
use crate::error::{Error, Result};

/// Decimal places of the native token
pub const TOKEN_DECIMALS: u32 = 18;
/// Current message version
pub const MESSAGE_VERSION: u64 = 0;
/// Method number of a plain value transfer
pub const METHOD_SEND: u64 = 0;

/// An account-chain message.
///
/// Any field change produces a different content address, and so
/// invalidates any signature made over the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    #[serde(default)]
    pub version: u64,
    pub to: Address,
    pub from: Address,
    #[serde(default)]
    pub nonce: u64,
    #[serde(with = "crate::serde_helpers::decimal_u256")]
    pub value: U256,
    #[serde(default)]
    pub gas_limit: i64,
    #[serde(with = "crate::serde_helpers::decimal_u256", default)]
    pub gas_fee_cap: U256,
    #[serde(default)]
    pub method: u64,
    #[serde(with = "crate::serde_helpers::base64_bytes", default)]
    pub params: Vec<u8>,
}

impl Message {
    /// A message with no nonce or gas fields filled in yet
    pub fn new(from: Address, to: Address, value: U256, method: u64, params: Vec<u8>) -> Self {
        Self {
            version: MESSAGE_VERSION,
            to,
            from,
            nonce: 0,
            value,
            gas_limit: 0,
            gas_fee_cap: U256::zero(),
            method,
            params,
        }
    }

    /// Canonical CBOR encoding
    pub fn to_cbor(&self) -> Vec<u8> {
        let mut w = CborWriter::new();
        w.array(9);
        w.uint(self.version);
        w.bytes(&self.to.to_bytes());
        w.bytes(&self.from.to_bytes());
        w.uint(self.nonce);
        w.big_int(&self.value);
        w.int(self.gas_limit);
        w.big_int(&self.gas_fee_cap);
        w.uint(self.method);
        w.bytes(&self.params);
        w.into_bytes()
    }

    /// Content address of the canonical encoding; this is what gets signed
    pub fn cid(&self) -> Cid {
        Cid::from_cbor(&self.to_cbor())
    }
}

/// A message together with its signature. Submitted exactly as built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignedMessage {
    pub message: Message,
    pub signature: Signature,
}

impl SignedMessage {
    pub fn new(message: Message, signature: Signature) -> Self {
        Self { message, signature }
    }

    /// The chain-visible identifier. BLS messages are identified by the
    /// unsigned message, because their signatures are aggregated per block.
    pub fn cid(&self) -> Cid {
        match self.signature.sig_type {
            SigType::Bls => self.message.cid(),
            SigType::Secp256k1 => {
                let mut w = CborWriter::new();
                w.array(2);
                w.raw(&self.message.to_cbor());
                w.bytes(&self.signature.to_bytes());
                Cid::from_cbor(&w.into_bytes())
            }
        }
    }
}

/// Execution receipt of an included message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageReceipt {
    pub exit_code: i64,
    #[serde(with = "crate::serde_helpers::base64_bytes", default)]
    pub r#return: Vec<u8>,
    #[serde(default)]
    pub gas_used: i64,
}

impl MessageReceipt {
    pub fn status(&self) -> MessageStatus {
        match self.exit_code {
            0 => MessageStatus::Success,
            code if is_send_failure(code) => MessageStatus::Failed,
            code => MessageStatus::Error(exit_code_name(code)),
        }
    }
}

/// Outcome of a status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    /// Known to the node, not executed yet
    Pending,
    Success,
    /// The message could not be applied to its sender or receiver
    Failed,
    /// Execution aborted with the attached reason
    Error(String),
    /// Unknown identifier
    NotFound,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Success => "success",
            MessageStatus::Failed => "failed",
            MessageStatus::Error(_) => "error",
            MessageStatus::NotFound => "not_found",
        }
    }}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Error(reason) => write!(f, "error: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

fn is_send_failure(code: i64) -> bool {
    // invalid sender, invalid sender state, invalid receiver
    matches!(code, 1 | 2 | 5)
}

/// Human readable name of a VM exit code
pub fn exit_code_name(code: i64) -> String {
    let name = match code {
        0 => "Ok",
        1 => "SysErrSenderInvalid",
        2 => "SysErrSenderStateInvalid",
        3 => "SysErrInvalidMethod",
        4 => "SysErrReserved1",
        5 => "SysErrInvalidReceiver",
        6 => "SysErrInsufficientFunds",
        7 => "SysErrOutOfGas",
        8 => "SysErrForbidden",
        9 => "SysErrorIllegalActor",
        10 => "SysErrorIllegalArgument",
        16 => "ErrIllegalArgument",
        17 => "ErrNotFound",
        18 => "ErrForbidden",
        19 => "ErrInsufficientFunds",
        20 => "ErrIllegalState",
        21 => "ErrSerialization",
        _ => return format!("ExitCode({})", code),
    };
    format!("{}({})", name, code)
}

/// Parse a decimal token amount such as `1.5` or `1000 EPK` into base units
pub fn parse_amount(amount: &str) -> Result<U256> {
    let trimmed = amount.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let number = lowered.strip_suffix("epk").map(str::trim_end).unwrap_or(&lowered);
    if number.is_empty() || number.starts_with('-') {
        return Err(Error::InvalidInput(format!("invalid amount: {}", amount)));
    }
    parse_units(number, TOKEN_DECIMALS)
        .map(U256::from)
        .map_err(|e| Error::InvalidInput(format!("invalid amount {}: {}", amount, e)))
}

/// Render base units as a decimal token amount without trailing zeros
pub fn format_amount(value: U256) -> Result<String> {
    let formatted = format_units(value, TOKEN_DECIMALS)
        .map_err(|e| Error::InvalidInput(format!("amount out of range: {}", e)))?;
    Ok(match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                whole.to_string()
            } else {
                format!("{}.{}", whole, fraction)
            }
        }
        None => formatted,
    })
}
