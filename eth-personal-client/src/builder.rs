use crate::{
    codec::{
        decode_hex, decode_quantity, decode_quantity_u64, encode_hex, format_quantity,
        parse_address,
    },
    error::{ClientError, Result},
    models::transaction::{Quantity, TransactionFields, UnsignedTransaction},
    rpc::RpcClient,
};
use alloy_primitives::{Address, Bytes, U256};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

/// Default gas limit for plain value transfers (21,000 gas)
pub const DEFAULT_GAS_LIMIT: u64 = 21_000;

/// Multiplier applied to the latest base fee when `maxFeePerGas` is omitted
pub const BASE_FEE_MULTIPLIER: u64 = 2;

/// Turns caller-supplied fields into a fully populated transaction
///
/// Caller input is validated before any request is made, so a bad field never
/// costs a round trip. Missing fields are filled from node state; nothing is
/// written to the node.
#[derive(Clone)]
pub struct TransactionBuilder {
    client: RpcClient,
}

impl TransactionBuilder {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }

    /// Build an EIP-1559 transaction from `fields`
    ///
    /// When `nonce` is omitted the builder uses the sender's pending
    /// transaction count. That value can be stale by the time the transaction
    /// is sent if another transaction from the same sender lands in between;
    /// callers that submit concurrently from one account should pass nonces
    /// explicitly.
    #[instrument(skip(self, fields), err)]
    pub async fn build(&self, fields: &TransactionFields) -> Result<UnsignedTransaction> {
        let from = match fields.from.as_deref() {
            Some(from) => parse_address("from", from)?,
            None => return Err(ClientError::invalid_field("from", "sender address is required")),
        };
        let to = fields
            .to
            .as_deref()
            .map(|to| parse_address("to", to))
            .transpose()?;
        let input = match fields.data.as_deref() {
            Some(data) => Bytes::from(
                decode_hex(data).map_err(|e| ClientError::invalid_field("data", e.to_string()))?,
            ),
            None => Bytes::new(),
        };
        if to.is_none() && input.is_empty() {
            return Err(ClientError::invalid_field(
                "to",
                "recipient is required unless data deploys a contract",
            ));
        }

        let value = optional::<U256>(&fields.value, "value")?.unwrap_or(U256::ZERO);
        let gas = optional::<u64>(&fields.gas, "gas")?;
        let max_fee = optional::<u128>(&fields.max_fee_per_gas, "maxFeePerGas")?;
        let priority_fee =
            optional::<u128>(&fields.max_priority_fee_per_gas, "maxPriorityFeePerGas")?;
        let nonce = optional::<u64>(&fields.nonce, "nonce")?;
        let chain_id = optional::<u64>(&fields.chain_id, "chainId")?;

        let chain_id = match chain_id {
            Some(chain_id) => chain_id,
            None => self.client.chain_id().await?,
        };
        let nonce = match nonce {
            Some(nonce) => nonce,
            None => self.pending_nonce(from).await?,
        };
        let gas = match gas {
            Some(gas) => gas,
            None if input.is_empty() => DEFAULT_GAS_LIMIT,
            None => self.estimate_gas(from, to, value, &input).await?,
        };
        let (max_fee_per_gas, max_priority_fee_per_gas) =
            self.resolve_fees(max_fee, priority_fee).await?;

        if max_priority_fee_per_gas > max_fee_per_gas {
            return Err(ClientError::invalid_field(
                "maxPriorityFeePerGas",
                format!("{max_priority_fee_per_gas} exceeds maxFeePerGas {max_fee_per_gas}"),
            ));
        }

        let tx = UnsignedTransaction {
            chain_id,
            nonce,
            from,
            to,
            value,
            gas,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            input,
        };
        debug!(?tx, "transaction built");
        Ok(tx)
    }

    /// Sender's transaction count including pool transactions
    async fn pending_nonce(&self, from: Address) -> Result<u64> {
        let method = "eth_getTransactionCount";
        let count: String = self
            .client
            .call(method, json!([from.to_checksum(None), "pending"]))
            .await?;
        let nonce = decode_quantity_u64(method, &count)?;
        debug!(%from, nonce, "nonce looked up");
        Ok(nonce)
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Option<Address>,
        value: U256,
        input: &Bytes,
    ) -> Result<u64> {
        let method = "eth_estimateGas";
        let mut call = Map::new();
        call.insert("from".into(), json!(from.to_checksum(None)));
        if let Some(to) = to {
            call.insert("to".into(), json!(to.to_checksum(None)));
        }
        call.insert("value".into(), json!(format_quantity(value)));
        call.insert("data".into(), json!(encode_hex(input)));

        let estimate: String = self.client.call(method, json!([Value::Object(call)])).await?;
        decode_quantity_u64(method, &estimate)
    }

    async fn resolve_fees(
        &self,
        max_fee: Option<u128>,
        priority_fee: Option<u128>,
    ) -> Result<(u128, u128)> {
        let priority_fee = match priority_fee {
            Some(fee) => fee,
            None => {
                let method = "eth_maxPriorityFeePerGas";
                let fee: String = self.client.call(method, json!([])).await?;
                to_u128(method, decode_quantity(method, &fee)?)?
            }
        };
        let max_fee = match max_fee {
            Some(fee) => fee,
            None => {
                let base_fee = self.latest_base_fee().await?;
                base_fee
                    .saturating_mul(BASE_FEE_MULTIPLIER as u128)
                    .saturating_add(priority_fee)
            }
        };
        Ok((max_fee, priority_fee))
    }

    async fn latest_base_fee(&self) -> Result<u128> {
        let method = "eth_getBlockByNumber";
        let block: Value = self.client.call(method, json!(["latest", false])).await?;
        let base_fee = block
            .get("baseFeePerGas")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::unexpected(method, "latest block has no baseFeePerGas"))?;
        to_u128(method, decode_quantity(method, base_fee)?)
    }
}

/// Parse an optional caller quantity into the width the protocol field allows
fn optional<T: TryFrom<U256>>(
    quantity: &Option<Quantity>,
    field: &'static str,
) -> Result<Option<T>> {
    quantity
        .as_ref()
        .map(|q| {
            let value = q.parse(field)?;
            T::try_from(value).map_err(|_| {
                ClientError::invalid_field(field, format!("{value} is out of range"))
            })
        })
        .transpose()
}

fn to_u128(method: &str, value: U256) -> Result<u128> {
    u128::try_from(value)
        .map_err(|_| ClientError::unexpected(method, format!("{value} overflows u128")))
}
