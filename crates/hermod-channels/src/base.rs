//! The transport contract and the shared inbound gate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use hermod_core::bus::{InboundMessage, MessageBus, OutboundMessage};

/// Every chat transport implements this.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Transport tag; must match config keys and `OutboundMessage.channel`.
    fn name(&self) -> &str;

    /// Open the connection and run the ingestion loop until `stop()`.
    async fn start(&self) -> anyhow::Result<()>;

    /// Graceful shutdown.
    async fn stop(&self) -> anyhow::Result<()>;

    /// Deliver one outbound message on this transport.
    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()>;
}

/// The inbound side every transport shares: allow-list enforcement plus
/// publication to the bus. Transports own one of these instead of
/// inheriting from a base.
pub struct ChannelInbox {
    name: String,
    allow_from: Vec<String>,
    bus: Arc<MessageBus>,
}

impl ChannelInbox {
    pub fn new(name: impl Into<String>, allow_from: Vec<String>, bus: Arc<MessageBus>) -> Self {
        Self {
            name: name.into(),
            allow_from,
            bus,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// An empty allow-list admits everyone. Otherwise the sender id, or any
    /// non-empty `|`-separated component of it, must appear in the list.
    /// Composite ids like `"12345|ada"` let configs match either the
    /// numeric id or the username.
    pub fn is_allowed(&self, sender_id: &str) -> bool {
        if self.allow_from.is_empty() {
            return true;
        }
        if self.allow_from.iter().any(|a| a == sender_id) {
            return true;
        }
        sender_id
            .split('|')
            .any(|part| !part.is_empty() && self.allow_from.iter().any(|a| a == part))
    }

    /// Gate one transport event and publish it inbound. Denied senders are
    /// logged and dropped; nothing reaches the bus.
    pub fn handle_message(
        &self,
        sender_id: &str,
        chat_id: &str,
        content: &str,
        media: Vec<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<()> {
        if !self.is_allowed(sender_id) {
            warn!(
                channel = %self.name,
                sender = sender_id,
                "sender not in allowFrom list, dropping message"
            );
            return Ok(());
        }

        let mut msg = InboundMessage::new(&self.name, sender_id, chat_id, content);
        msg.media = media;
        msg.metadata = metadata;
        self.bus.publish_inbound(msg)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
