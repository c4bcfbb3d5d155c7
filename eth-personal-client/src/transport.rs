//! Transports carry serialized requests to the node and feed raw responses
//! back to the client through a [`ResponseSink`].
//!
//! The client never assumes that a response belongs to the request that was
//! just sent: a transport may deliver responses late, early or in a batch.

use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound half of a connection to a node
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Deliver one serialized JSON-RPC request
    async fn send(&self, payload: String) -> Result<(), TransportError>;
}

/// Inbound half of a connection: raw response bodies waiting to be dispatched
pub type ResponseStream = mpsc::UnboundedReceiver<String>;

/// Handle a transport uses to hand raw responses back to the client
#[derive(Debug, Clone)]
pub struct ResponseSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ResponseSink {
    /// Create a connected sink/stream pair
    pub fn channel() -> (ResponseSink, ResponseStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ResponseSink { tx }, rx)
    }

    /// Push a raw response body; returns `false` once the client is gone
    pub fn deliver(&self, raw: String) -> bool {
        self.tx.send(raw).is_ok()
    }
}

/// Plain HTTP transport
///
/// Each request is a POST; the response body is pushed into the sink, so
/// concurrent calls resolve through the same correlation path as a socket.
pub struct HttpTransport {
    http: reqwest::Client,
    url: reqwest::Url,
    sink: ResponseSink,
}

impl HttpTransport {
    /// Create a transport for `url`, returning the stream its responses land on
    pub fn new(url: &str) -> Result<(Self, ResponseStream), TransportError> {
        let parsed: reqwest::Url = url.parse().map_err(|e: <reqwest::Url as std::str::FromStr>::Err| {
            TransportError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;
        let (sink, stream) = ResponseSink::channel();
        Ok((
            Self {
                http: reqwest::Client::new(),
                url: parsed,
                sink,
            },
            stream,
        ))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: String) -> Result<(), TransportError> {
        let response = self
            .http
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "received response body");
        if !self.sink.deliver(body) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}
