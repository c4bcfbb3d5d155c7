use crate::{
    codec::decode_quantity_u64,
    error::{ClientError, Result, TransportError},
    models::jsonrpc::{redact_params, JsonRpcRequest, JsonRpcResponse},
    transport::{HttpTransport, ResponseStream, Transport},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::{Duration, Instant},
};
use tokio::sync::{oneshot, OnceCell};
use tracing::{debug, instrument, warn};

/// Default deadline for a single call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for the client core
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long a call waits for its response
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Pending calls keyed by correlation id
#[derive(Default)]
struct PendingTable {
    slots: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    /// Set once the response stream has ended; no new calls are admitted
    closed: bool,
}

struct Inner {
    transport: Arc<dyn Transport>,
    pending: Mutex<PendingTable>,
    next_id: AtomicU64,
    timeout: Duration,
    chain_id: OnceCell<u64>,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route one raw inbound message (single response or batch) to its callers
    fn dispatch(&self, raw: &str) {
        let responses = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => items,
            Ok(single) => vec![single],
            Err(e) => {
                warn!(error = %e, "discarding unparsable response");
                return;
            }
        };

        for value in responses {
            let response: JsonRpcResponse = match serde_json::from_value(value) {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "discarding malformed response");
                    continue;
                }
            };
            let Some(id) = response.correlation_id() else {
                debug!("ignoring message without a correlation id");
                continue;
            };
            let slot = self.pending().slots.remove(&id);
            match slot {
                Some(tx) => {
                    if tx.send(response).is_err() {
                        debug!(id, "caller went away before its response arrived");
                    }
                }
                None => warn!(id, "discarding response with no pending call"),
            }
        }
    }
}

/// Removes a pending slot when the call finishes, times out or is cancelled.
///
/// Removal goes through the mutex-guarded map, so the slot is gone exactly
/// once whichever of dispatch or drop gets there first.
struct PendingGuard<'a> {
    inner: &'a Inner,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.inner.pending().slots.remove(&self.id);
    }
}

/// JSON-RPC client with out-of-order response correlation
///
/// Cheap to clone; clones share one transport and one correlation table.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<Inner>,
}

impl RpcClient {
    /// Create a client over `transport`, reading responses from `responses`
    ///
    /// Spawns the dispatch task on the current tokio runtime. The task ends
    /// when the transport's sink is dropped or the last client clone goes
    /// away; every call still pending at that point fails with
    /// [`ClientError::Closed`].
    pub fn new(
        transport: Arc<dyn Transport>,
        responses: ResponseStream,
        config: ClientConfig,
    ) -> Self {
        let inner = Arc::new(Inner {
            transport,
            pending: Mutex::new(PendingTable::default()),
            next_id: AtomicU64::new(1),
            timeout: config.timeout,
            chain_id: OnceCell::new(),
        });
        tokio::spawn(dispatch_loop(Arc::downgrade(&inner), responses));
        Self { inner }
    }

    /// Create a client talking HTTP to `url`
    pub fn http(url: &str, config: ClientConfig) -> Result<Self> {
        let (transport, responses) = HttpTransport::new(url)
            .map_err(|e| ClientError::invalid_field("url", e.to_string()))?;
        Ok(Self::new(Arc::new(transport), responses, config))
    }

    /// Number of calls currently awaiting a response
    pub fn pending_calls(&self) -> usize {
        self.inner.pending().slots.len()
    }

    /// Call `method` and deserialize its result
    pub async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let raw = self.call_raw(method, params).await?;
        serde_json::from_value(raw).map_err(|e| ClientError::unexpected(method, e.to_string()))
    }

    /// Call `method` and return its untyped result
    ///
    /// Dropping the returned future cancels the call: its slot is removed and a
    /// late response is discarded. Nothing is undone at the node.
    #[instrument(skip(self, params), fields(id = tracing::field::Empty), err)]
    pub async fn call_raw(&self, method: &str, params: Value) -> Result<Value> {
        let inner = &*self.inner;
        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::Span::current().record("id", id);
        let started = Instant::now();
        let transport_error = |source: TransportError| ClientError::Transport {
            method: method.to_string(),
            id,
            elapsed: started.elapsed(),
            source,
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = inner.pending();
            if pending.closed {
                return Err(transport_error(TransportError::Closed));
            }
            pending.slots.insert(id, tx);
        }
        let _guard = PendingGuard { inner, id };

        let request = JsonRpcRequest::new(id, method, params);
        let payload = serde_json::to_string(&request)
            .map_err(|e| ClientError::invalid_field("params", e.to_string()))?;

        // The deadline covers the send as well: an HTTP transport only
        // returns once the node has answered.
        let exchange = async {
            debug!(id, method, "sending request");
            match inner.transport.send(payload).await {
                Ok(()) => rx.await.map_err(|_| ClientError::Closed {
                    method: method.to_string(),
                    id,
                }),
                Err(source) => Err(transport_error(source)),
            }
        };
        let response = match tokio::time::timeout(inner.timeout, exchange).await {
            Ok(response) => response?,
            Err(_) => {
                return Err(ClientError::Timeout {
                    method: method.to_string(),
                    id,
                    elapsed: started.elapsed(),
                })
            }
        };
        debug!(id, method, elapsed = ?started.elapsed(), "response received");

        match response.error {
            Some(error) => Err(ClientError::Rpc {
                method: method.to_string(),
                params: redact_params(method, &request.params),
                id,
                code: error.code,
                message: error.message,
                data: error.data,
            }),
            None => Ok(response.result),
        }
    }

    /// Chain id of the connected node, fetched once per client
    pub async fn chain_id(&self) -> Result<u64> {
        self.inner
            .chain_id
            .get_or_try_init(|| async {
                let hex: String = self.call("eth_chainId", Value::Array(vec![])).await?;
                decode_quantity_u64("eth_chainId", &hex)
            })
            .await
            .copied()
    }
}

async fn dispatch_loop(inner: Weak<Inner>, mut responses: ResponseStream) {
    while let Some(raw) = responses.recv().await {
        match inner.upgrade() {
            Some(inner) => inner.dispatch(&raw),
            None => return,
        }
    }
    if let Some(inner) = inner.upgrade() {
        let abandoned = {
            let mut pending = inner.pending();
            pending.closed = true;
            std::mem::take(&mut pending.slots)
        };
        if !abandoned.is_empty() {
            warn!(count = abandoned.len(), "response stream closed with calls pending");
        }
    }
}
