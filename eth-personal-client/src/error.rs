use alloy_primitives::{Address, B256};
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the client
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure to move bytes between the client and the node
///
/// Transports report only the cause; the client core attaches the method,
/// correlation id and elapsed time when it wraps this in
/// [`ClientError::Transport`].
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid node url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The node answered with a non-2xx status
    #[error("node answered HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("connection lost: {0}")]
    Disconnected(String),

    /// The response stream has ended; nothing more can be delivered
    #[error("response stream closed")]
    Closed,
}

/// Client error types
///
/// This enum defines every failure the client can surface. Codec and builder
/// errors describe bad caller input; the remaining variants describe what
/// happened on the wire or at the node, with enough context to decide whether
/// a retry makes sense.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Hex input without the `0x` prefix or with non-hex characters
    #[error("malformed hex string {input:?}: {reason}")]
    MalformedHex { input: String, reason: String },

    /// A caller-supplied field failed validation
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Connection lost or unavailable; safe for the caller to retry
    #[error("{method} (id {id}) failed in transport after {elapsed:?}: {source}")]
    Transport {
        method: String,
        id: u64,
        elapsed: Duration,
        #[source]
        source: TransportError,
    },

    /// The node answered with a structured JSON-RPC error
    #[error("rpc error {code} from {method} (id {id}): {message}")]
    Rpc {
        method: String,
        params: serde_json::Value,
        id: u64,
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// No response arrived before the deadline; the outcome at the node is unknown
    #[error("{method} (id {id}) timed out after {elapsed:?}")]
    Timeout {
        method: String,
        id: u64,
        elapsed: Duration,
    },

    /// The pending slot was dropped before a response arrived
    #[error("{method} (id {id}) abandoned: response stream closed")]
    Closed { method: String, id: u64 },

    /// The node returned a result of an unexpected shape
    #[error("unexpected response to {method}: {reason}")]
    UnexpectedResponse { method: String, reason: String },

    /// Unlocking an account failed; the transaction is still unsigned
    #[error("failed to unlock {account}: {source}")]
    Unlock {
        account: Address,
        #[source]
        source: Box<ClientError>,
    },

    /// Producing a signature failed
    #[error("signing with {account} failed: {reason}")]
    Signing {
        account: Address,
        reason: String,
        #[source]
        source: Option<Box<ClientError>>,
    },

    /// Broadcasting a signed transaction failed; the payload may be resubmitted
    #[error("failed to submit transaction {hash}: {source}")]
    Submission {
        hash: B256,
        #[source]
        source: Box<ClientError>,
    },

    /// A submitted transaction had no receipt when the wait deadline passed
    #[error("transaction {hash} unconfirmed after {elapsed:?}")]
    Unconfirmed { hash: B256, elapsed: Duration },
}

impl ClientError {
    pub(crate) fn malformed_hex(input: &str, reason: impl Into<String>) -> Self {
        Self::MalformedHex {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn signing(account: Address, reason: impl Into<String>) -> Self {
        Self::Signing {
            account,
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn unexpected(method: &str, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request may succeed
    ///
    /// Only transport failures qualify. A timeout is ambiguous (the node may
    /// have executed the call), so it is left to the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { .. } => true,
            ClientError::Submission { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// JSON-RPC error code, if the node reported one
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            ClientError::Rpc { code, .. } => Some(*code),
            ClientError::Unlock { source, .. } | ClientError::Submission { source, .. } => {
                source.rpc_code()
            }
            ClientError::Signing {
                source: Some(source),
                ..
            } => source.rpc_code(),
            _ => None,
        }
    }
}
