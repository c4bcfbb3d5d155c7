//! Conversions between domain values and their JSON-RPC wire form
//!
//! Every hex string that enters or leaves the client goes through this module:
//! byte strings, addresses, quantities, private keys and signatures.

use crate::error::{ClientError, Result};
use alloy_primitives::{
    eip191_hash_message, hex, Address, PrimitiveSignature as Signature, B256, U256,
};

/// Encode bytes as a `0x`-prefixed lowercase hex string.
pub fn encode_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode_prefixed(bytes)
}

/// Decode a `0x`-prefixed hex string into bytes.
///
/// `"0x"` decodes to an empty vector. Input without the prefix, with an odd
/// number of digits or with non-hex characters is rejected.
pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    if !input.starts_with("0x") {
        return Err(ClientError::malformed_hex(input, "missing 0x prefix"));
    }
    hex::decode(input).map_err(|e| ClientError::malformed_hex(input, e.to_string()))
}

/// Render an address in EIP-55 mixed-case checksum form.
///
/// Accepts any letter case, so the output of a node that returns lowercase
/// addresses can be compared with checksummed configuration values.
pub fn to_checksum_address(input: &str) -> Result<String> {
    let address = decode_address(input)?;
    Ok(address.to_checksum(None))
}

/// Parse a `0x`-prefixed 20-byte address, ignoring letter case.
pub fn decode_address(input: &str) -> Result<Address> {
    let bytes = decode_hex(input)?;
    if bytes.len() != 20 {
        return Err(ClientError::malformed_hex(
            input,
            format!("expected 20 bytes, got {}", bytes.len()),
        ));
    }
    Ok(Address::from_slice(&bytes))
}

/// Parse a caller-supplied address, reporting failures against `field`.
pub fn parse_address(field: &'static str, input: &str) -> Result<Address> {
    decode_address(input.trim()).map_err(|e| match e {
        ClientError::MalformedHex { reason, .. } => {
            ClientError::invalid_field(field, format!("{input:?} is not an address: {reason}"))
        }
        other => other,
    })
}

/// Parse a caller-supplied non-negative integer.
///
/// Accepts decimal (`"21000"`) and hex (`"0x5208"`, either letter case).
pub fn parse_quantity(field: &'static str, input: &str) -> Result<U256> {
    let text = input.trim();
    if text.starts_with('-') {
        return Err(ClientError::invalid_field(
            field,
            format!("{input:?} is negative"),
        ));
    }
    let (digits, radix) = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some("") => {
            return Err(ClientError::invalid_field(field, "empty hex quantity"));
        }
        Some(digits) => (digits, 16),
        None if text.is_empty() => {
            return Err(ClientError::invalid_field(field, "empty quantity"));
        }
        None => (text, 10),
    };
    if !all_digits(digits, radix) {
        return Err(ClientError::invalid_field(
            field,
            format!("{input:?} has characters outside base {radix}"),
        ));
    }
    U256::from_str_radix(digits, u64::from(radix))
        .map_err(|e| ClientError::invalid_field(field, format!("{input:?}: {e}")))
}

/// Format an integer as a JSON-RPC quantity (`0x`-prefixed, no leading zeros).
pub fn format_quantity<T: std::fmt::LowerHex>(value: T) -> String {
    format!("0x{value:x}")
}

/// Decode a quantity returned by the node.
pub fn decode_quantity(method: &str, input: &str) -> Result<U256> {
    let digits = input
        .strip_prefix("0x")
        .filter(|digits| !digits.is_empty() && all_digits(digits, 16))
        .ok_or_else(|| ClientError::unexpected(method, format!("{input:?} is not a quantity")))?;
    U256::from_str_radix(digits, 16)
        .map_err(|e| ClientError::unexpected(method, format!("{input:?}: {e}")))
}

/// `from_str_radix` skips `_` separators, so digits are checked up front.
fn all_digits(digits: &str, radix: u32) -> bool {
    digits.chars().all(|c| c.is_digit(radix))
}

/// Decode a quantity returned by the node into a `u64`.
pub fn decode_quantity_u64(method: &str, input: &str) -> Result<u64> {
    let value = decode_quantity(method, input)?;
    u64::try_from(value)
        .map_err(|_| ClientError::unexpected(method, format!("{input:?} overflows u64")))
}

/// Normalize a raw private key to its 32-byte form.
///
/// The `0x` prefix is optional: geth exports keys without it while most
/// tooling adds it.
pub fn normalize_private_key(input: &str) -> Result<B256> {
    let text = input.trim();
    let bytes = hex::decode(text).map_err(|e| ClientError::malformed_hex(input, e.to_string()))?;
    if bytes.len() != 32 {
        return Err(ClientError::malformed_hex(
            input,
            format!("private key must be 32 bytes, got {}", bytes.len()),
        ));
    }
    Ok(B256::from_slice(&bytes))
}

/// Decode a 65-byte `r || s || v` signature.
pub fn decode_signature(input: &str) -> Result<Signature> {
    let bytes = decode_hex(input)?;
    Signature::try_from(bytes.as_slice())
        .map_err(|e| ClientError::malformed_hex(input, e.to_string()))
}

/// Encode a signature as 65 bytes with `v` in 27/28 form.
pub fn encode_signature(signature: &Signature) -> String {
    encode_hex(signature.as_bytes())
}

/// Recover the address that produced an EIP-191 personal-message signature.
pub fn recover_signer(message: &[u8], signature: &Signature) -> Result<Address> {
    let digest = eip191_hash_message(message);
    signature
        .recover_address_from_prehash(&digest)
        .map_err(|e| {
            ClientError::invalid_field("signature", format!("signer recovery failed: {e}"))
        })
}
