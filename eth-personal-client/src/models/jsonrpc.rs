use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version sent with every request
pub const JSONRPC_VERSION: &str = "2.0";

/// Placeholder written over secrets before params are stored or logged
pub const REDACTED: &str = "<redacted>";

/// JSON-RPC 2.0 request structure
///
/// The client always issues numeric identifiers; `params` is the ordered
/// positional parameter list.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC protocol version (always "2.0")
    pub jsonrpc: String,

    /// Method name to call
    pub method: String,

    /// Method parameters
    pub params: Value,

    /// Request identifier
    pub id: u64,
}

impl JsonRpcRequest {
    /// Create a new request
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// JSON-RPC 2.0 response as received from a node
///
/// A `null` result and an absent result are both read as `Value::Null`; the
/// presence of `error` is what separates failures from successes.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version
    #[serde(default)]
    pub jsonrpc: Option<String>,

    /// Identifier echoed from the request (absent on notifications)
    #[serde(default)]
    pub id: Option<Value>,

    /// Method result
    #[serde(default)]
    pub result: Value,

    /// Error details
    #[serde(default)]
    pub error: Option<JsonRpcErrorDetail>,
}

impl JsonRpcResponse {
    /// Correlation identifier of this response
    ///
    /// Nodes echo the id they were given, but some proxies stringify it.
    pub fn correlation_id(&self) -> Option<u64> {
        match self.id.as_ref()? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// JSON-RPC 2.0 error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorDetail {
    /// Error code
    pub code: i64,

    /// Error message
    pub message: String,

    /// Additional error data (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Replace passphrases and raw keys in personal-namespace params.
///
/// The returned value is what ends up in error context and logs; the
/// original params are what goes on the wire.
pub fn redact_params(method: &str, params: &Value) -> Value {
    let secret_positions: &[usize] = match method {
        "personal_newAccount" => &[0],
        "personal_importRawKey" => &[0, 1],
        "personal_unlockAccount" => &[1],
        "personal_sign" => &[2],
        "personal_signTransaction" | "personal_sendTransaction" => &[1],
        _ => &[],
    };
    let mut redacted = params.clone();
    if let Value::Array(items) = &mut redacted {
        for &index in secret_positions {
            if let Some(item) = items.get_mut(index) {
                *item = Value::String(REDACTED.to_string());
            }
        }
    }
    redacted
}
