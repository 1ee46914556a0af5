//! Bus event types: the messages flowing between transports and the agent loop.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A message arriving from a transport, headed for the agent.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Transport tag (`"telegram"`, `"whatsapp"`, `"cli"`, …) or the reserved
    /// value `"system"` for synthetic turns.
    pub channel: String,
    /// Sender identifier within the transport.
    pub sender_id: String,
    /// Chat / conversation identifier.
    pub chat_id: String,
    /// Text content.
    pub content: String,
    /// When the message was received.
    pub timestamp: DateTime<Utc>,
    /// Local filesystem paths of attached media, in order.
    pub media: Vec<String>,
    /// Transport-specific extras (message ids, usernames, …).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        InboundMessage {
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            media: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// The session this message belongs to: `"<channel>:<chat_id>"`.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }
}

/// A reply from the agent, headed for a transport.
#[derive(Clone, Debug)]
pub struct OutboundMessage {
    pub channel: String,
    pub chat_id: String,
    pub content: String,
    /// Optional transport message id this is a reply to.
    pub reply_to: Option<String>,
    pub media: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl OutboundMessage {
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        OutboundMessage {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            reply_to: None,
            media: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_defaults() {
        let msg = InboundMessage::new("telegram", "u1", "c9", "hi there");
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.sender_id, "u1");
        assert_eq!(msg.chat_id, "c9");
        assert!(msg.media.is_empty());
        assert!(msg.metadata.is_empty());
    }

    #[test]
    fn session_key_joins_channel_and_chat() {
        let msg = InboundMessage::new("whatsapp", "u", "49151234", "x");
        assert_eq!(msg.session_key(), "whatsapp:49151234");
    }

    #[test]
    fn system_channel_session_key_keeps_embedded_colon() {
        // System messages encode the origin inside chat_id.
        let msg = InboundMessage::new("system", "subagent", "telegram:42", "done");
        assert_eq!(msg.session_key(), "system:telegram:42");
    }

    #[test]
    fn outbound_defaults() {
        let msg = OutboundMessage::new("cli", "direct", "answer");
        assert_eq!(msg.channel, "cli");
        assert!(msg.reply_to.is_none());
        assert!(msg.media.is_empty());
    }

    #[test]
    fn metadata_holds_arbitrary_json() {
        let mut msg = InboundMessage::new("telegram", "u", "c", "x");
        msg.metadata
            .insert("message_id".into(), serde_json::json!(991));
        msg.metadata
            .insert("username".into(), serde_json::json!("ada"));
        assert_eq!(msg.metadata["message_id"], 991);
        assert_eq!(msg.metadata["username"], "ada");
    }
}
