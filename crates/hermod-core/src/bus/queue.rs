//! The message bus: two unbounded FIFO queues plus an outbound fan-out
//! dispatcher.
//!
//! Transports publish to `inbound`; the agent loop consumes it, processes,
//! and publishes to `outbound`. Transports register per-channel handlers via
//! `subscribe_outbound`, and the `dispatch_outbound` pump invokes them.
//! The bus performs no persistence: enqueued but unconsumed messages are
//! lost on shutdown.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::events::{InboundMessage, OutboundMessage};

/// Async handler invoked by the dispatcher for one outbound message.
pub type OutboundHandler = Arc<
    dyn Fn(OutboundMessage) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send
        + Sync,
>;

/// How long the dispatcher pump waits per poll so `stop()` stays observable.
const DISPATCH_POLL: Duration = Duration::from_secs(1);

pub struct MessageBus {
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    outbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<OutboundMessage>>,
    /// Handlers per channel tag, invoked in registration order.
    subscribers: RwLock<HashMap<String, Vec<OutboundHandler>>>,
    running: AtomicBool,
}

impl MessageBus {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        MessageBus {
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            outbound_tx,
            outbound_rx: tokio::sync::Mutex::new(outbound_rx),
            subscribers: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Enqueue a message from a transport toward the agent.
    pub fn publish_inbound(&self, msg: InboundMessage) -> anyhow::Result<()> {
        self.inbound_tx
            .send(msg)
            .map_err(|_| anyhow::anyhow!("inbound queue closed"))
    }

    /// Dequeue the next inbound message; blocks until one is available.
    /// Returns `None` once the queue is closed. Callers that need to observe
    /// a stop request wrap this in `tokio::time::timeout`.
    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await
    }

    /// Enqueue a reply from the agent toward a transport.
    pub fn publish_outbound(&self, msg: OutboundMessage) -> anyhow::Result<()> {
        self.outbound_tx
            .send(msg)
            .map_err(|_| anyhow::anyhow!("outbound queue closed"))
    }

    /// Dequeue the next outbound message; blocks until one is available.
    pub async fn consume_outbound(&self) -> Option<OutboundMessage> {
        let mut rx = self.outbound_rx.lock().await;
        rx.recv().await
    }

    /// Register a handler for one channel tag. Multiple handlers per channel
    /// are allowed and run in registration order.
    pub fn subscribe_outbound(&self, channel: &str, handler: OutboundHandler) {
        let mut subs = self.subscribers.write().unwrap();
        subs.entry(channel.to_string()).or_default().push(handler);
        debug!(channel = channel, "outbound subscriber registered");
    }

    /// Number of handlers registered for a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscribers
            .read()
            .unwrap()
            .get(channel)
            .map_or(0, |v| v.len())
    }

    /// The outbound dispatcher pump. Dequeues messages and invokes every
    /// handler registered for the message's channel. A failing handler is
    /// logged and must not prevent its siblings from running.
    ///
    /// Runs until `stop()` is called or the queue closes.
    pub async fn dispatch_outbound(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("outbound dispatcher started");

        while self.running.load(Ordering::SeqCst) {
            let msg = match tokio::time::timeout(DISPATCH_POLL, self.consume_outbound()).await {
                Ok(Some(m)) => m,
                Ok(None) => break,
                Err(_) => continue,
            };

            let handlers: Vec<OutboundHandler> = {
                let subs = self.subscribers.read().unwrap();
                subs.get(&msg.channel).cloned().unwrap_or_default()
            };

            if handlers.is_empty() {
                debug!(channel = %msg.channel, "no subscribers for outbound message");
                continue;
            }

            for handler in handlers {
                if let Err(e) = handler(msg.clone()).await {
                    error!(channel = %msg.channel, error = %e, "outbound handler failed");
                }
            }
        }

        info!("outbound dispatcher stopped");
    }

    /// Ask the dispatcher pump to exit after its current poll.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
