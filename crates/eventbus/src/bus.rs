use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::{EventBusError, EventBusResult};

/// Default broadcast channel capacity per address. A slow subscriber that
/// falls more than this many messages behind a publisher observes a `Lag`
/// error on its next receive rather than applying unbounded backpressure to
/// the publisher — the bus's backpressure policy (§5: handlers must be
/// non-blocking).
const DEFAULT_CAPACITY: usize = 256;

/// One in-flight request/reply exchange, handed to whichever handler is
/// registered at the target address.
pub struct Request {
    pub payload: Value,
    reply: oneshot::Sender<Value>,
}

impl Request {
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Answer the request. Dropping a `Request` without calling this is a
    /// handler bug; the caller observes [`EventBusError::HandlerDropped`].
    pub fn reply(self, payload: Value) {
        let _ = self.reply.send(payload);
    }
}

/// Cluster-wide publish/subscribe and request/reply layer over named
/// addresses (§4.3, §6). A single process-local instance stands in for the
/// cluster event bus; a networked implementation would swap the channel
/// plumbing below for a transport but keep this same interface.
#[derive(Default)]
pub struct EventBus {
    topics: DashMap<String, broadcast::Sender<Value>>,
    handlers: DashMap<String, mpsc::Sender<Request>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a message to every current subscriber of `address`. Ordering
    /// is preserved per-address; there is no ordering guarantee across
    /// addresses (§5).
    pub fn publish(&self, address: &str, payload: Value) {
        let sender = self
            .topics
            .entry(address.to_string())
            .or_insert_with(|| broadcast::channel(DEFAULT_CAPACITY).0)
            .clone();
        // No receivers is not an error — nothing is listening yet.
        let _ = sender.send(payload);
        trace!(address, "published");
    }

    /// Subscribe to `address`. Returned receiver only sees messages
    /// published after this call.
    #[must_use]
    pub fn subscribe(&self, address: &str) -> broadcast::Receiver<Value> {
        self.topics
            .entry(address.to_string())
            .or_insert_with(|| broadcast::channel(DEFAULT_CAPACITY).0)
            .subscribe()
    }

    /// Register as the handler for request/reply traffic at `address`
    /// (§4.3: "Each node hosts at most one LocalAgent and publishes itself
    /// by registering a handler at `agent.<id>`"). Only one handler may
    /// hold an address at a time.
    pub fn register(&self, address: &str, capacity: usize) -> EventBusResult<mpsc::Receiver<Request>> {
        if self.handlers.contains_key(address) {
            return Err(EventBusError::AlreadyRegistered(address.to_string()));
        }
        let (tx, rx) = mpsc::channel(capacity);
        self.handlers.insert(address.to_string(), tx);
        debug!(address, "handler registered");
        Ok(rx)
    }

    /// Release a previously registered handler address.
    pub fn deregister(&self, address: &str) {
        self.handlers.remove(address);
    }

    /// Send a request to `address` and await its reply, or
    /// [`EventBusError::Timeout`] if none arrives within `timeout`.
    pub async fn request(
        &self,
        address: &str,
        payload: Value,
        timeout: Duration,
    ) -> EventBusResult<Value> {
        let handler = self
            .handlers
            .get(address)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EventBusError::NoHandler(address.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = Request {
            payload,
            reply: reply_tx,
        };

        handler
            .send(request)
            .await
            .map_err(|_| EventBusError::NoHandler(address.to_string()))?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => {
                warn!(address, "handler dropped reply channel");
                Err(EventBusError::HandlerDropped(address.to_string()))
            }
            Err(_) => Err(EventBusError::Timeout(address.to_string())),
        }
    }
}
