use crate::{
    codec::{encode_hex, format_quantity, parse_quantity},
    error::{ClientError, Result},
};
use alloy_consensus::TxEip1559;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use serde::{Deserialize, Serialize};

/// A numeric field as a caller may supply it
///
/// Accepts JSON numbers (`0`), decimal strings (`"10000"`) and hex strings
/// (`"0x59682F00"`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(serde_json::Number),
    Text(String),
}

impl Quantity {
    /// Parse into a non-negative integer, reporting failures against `field`
    pub fn parse(&self, field: &'static str) -> Result<U256> {
        match self {
            Quantity::Number(n) => {
                if let Some(v) = n.as_u64() {
                    Ok(U256::from(v))
                } else if n.as_i64().is_some() {
                    Err(ClientError::invalid_field(field, format!("{n} is negative")))
                } else if n.as_f64().is_some_and(|f| f.fract() == 0.0 && f >= u64::MAX as f64) {
                    // Integers past u64 have already been rounded through f64
                    Err(ClientError::invalid_field(
                        field,
                        format!("{n} exceeds u64; pass large quantities as decimal or hex strings"),
                    ))
                } else {
                    Err(ClientError::invalid_field(field, format!("{n} is not an integer")))
                }
            }
            Quantity::Text(s) => parse_quantity(field, s),
        }
    }
}

impl From<u64> for Quantity {
    fn from(v: u64) -> Self {
        Quantity::Number(v.into())
    }
}

impl From<&str> for Quantity {
    fn from(s: &str) -> Self {
        Quantity::Text(s.to_string())
    }
}

/// Transaction fields as supplied by the caller
///
/// Every field is optional at this stage; the builder decides which ones are
/// required and which ones it can fill from node state.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFields {
    /// Sender address
    #[serde(default)]
    pub from: Option<String>,

    /// Recipient address (absent for contract creation)
    #[serde(default)]
    pub to: Option<String>,

    /// Transfer value in wei
    #[serde(default)]
    pub value: Option<Quantity>,

    /// Gas limit
    #[serde(default)]
    pub gas: Option<Quantity>,

    /// EIP-1559 max fee per gas
    #[serde(default)]
    pub max_fee_per_gas: Option<Quantity>,

    /// EIP-1559 max priority fee per gas
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<Quantity>,

    /// Sender nonce; absent means "look it up"
    #[serde(default)]
    pub nonce: Option<Quantity>,

    /// Chain id; absent means "ask the node"
    #[serde(default)]
    pub chain_id: Option<Quantity>,

    /// Call data, either as "data" or "input"
    #[serde(default, alias = "input")]
    pub data: Option<String>,
}

/// Fully populated EIP-1559 transaction, ready to be signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub gas: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub input: Bytes,
}

impl UnsignedTransaction {
    /// Consensus form used for local signing and encoding
    pub fn to_eip1559(&self) -> TxEip1559 {
        TxEip1559 {
            chain_id: self.chain_id,
            nonce: self.nonce,
            gas_limit: self.gas,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            to: self.to.map_or(TxKind::Create, TxKind::Call),
            value: self.value,
            access_list: Default::default(),
            input: self.input.clone(),
        }
    }

    /// JSON-RPC form sent to node-side signing methods
    pub fn to_rpc(&self) -> RpcTransaction {
        RpcTransaction {
            from: self.from.to_checksum(None),
            to: self.to.map(|to| to.to_checksum(None)),
            value: format_quantity(self.value),
            gas: format_quantity(self.gas),
            max_fee_per_gas: format_quantity(self.max_fee_per_gas),
            max_priority_fee_per_gas: format_quantity(self.max_priority_fee_per_gas),
            nonce: format_quantity(self.nonce),
            chain_id: format_quantity(self.chain_id),
            tx_type: "0x2".to_string(),
            input: (!self.input.is_empty()).then(|| encode_hex(&self.input)),
        }
    }
}

/// Transaction object in JSON-RPC quantity encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub value: String,
    pub gas: String,
    pub max_fee_per_gas: String,
    pub max_priority_fee_per_gas: String,
    pub nonce: String,
    pub chain_id: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

/// Result of `personal_signTransaction`
///
/// geth answers `{raw, tx}`, some simulators answer with the bare raw hex.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum NodeSignedTransaction {
    Envelope {
        raw: String,
        #[serde(default)]
        tx: serde_json::Value,
    },
    Raw(String),
}

impl NodeSignedTransaction {
    /// Raw EIP-2718 envelope in hex
    pub fn raw(&self) -> &str {
        match self {
            NodeSignedTransaction::Envelope { raw, .. } => raw,
            NodeSignedTransaction::Raw(raw) => raw,
        }
    }
}

/// Subset of `eth_getTransactionReceipt` the client acts on
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
    /// `0x1` on success, `0x0` on revert
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionReceipt {
    /// Whether the transaction executed successfully
    pub fn succeeded(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x1") | Some("0x01"))
    }
}
