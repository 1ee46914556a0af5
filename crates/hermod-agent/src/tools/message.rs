//! The `message` tool: lets the model push an extra outbound message.
//!
//! The tool owns a publish capability (a closure over the bus, injected at
//! construction) and a route slot the agent loop rebinds before every
//! turn. The route starts unbound: until a turn binds it, the model must
//! address a channel and chat id explicitly, and giving only one of the
//! two is rejected rather than half-falling-back. This keeps a
//! misconfigured turn from quietly delivering into the wrong chat.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use hermod_core::bus::OutboundMessage;

use super::base::{optional_string, require_string, Tool};

/// Publish capability injected by whoever owns the bus.
pub type PublishFn = Arc<
    dyn Fn(OutboundMessage) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send
        + Sync,
>;

#[derive(Clone)]
struct Route {
    channel: String,
    chat_id: String,
}

pub struct MessageTool {
    publish: PublishFn,
    /// The conversation of the turn in flight; `None` before any turn.
    route: Mutex<Option<Route>>,
}

impl MessageTool {
    pub fn new(publish: PublishFn) -> Self {
        Self {
            publish,
            route: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Tool for MessageTool {
    fn name(&self) -> &str {
        "message"
    }

    fn description(&self) -> &str {
        "Send an extra message to a chat. Without arguments it goes to the \
         current conversation; to reach another chat, give both channel \
         and chat_id."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {"type": "string", "description": "The message text", "minLength": 1},
                "channel": {"type": "string", "description": "Target channel (requires chat_id too)"},
                "chat_id": {"type": "string", "description": "Target chat id (requires channel too)"},
                "reply_to": {"type": "string", "description": "Transport message id to reply to"}
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let content = require_string(&params, "content")?;

        let explicit = match (
            optional_string(&params, "channel"),
            optional_string(&params, "chat_id"),
        ) {
            (Some(channel), Some(chat_id)) => Some(Route { channel, chat_id }),
            (None, None) => None,
            _ => anyhow::bail!("channel and chat_id must be given together"),
        };

        let bound = self.route.lock().await.clone();
        let Some(target) = explicit.or(bound) else {
            anyhow::bail!(
                "no conversation is bound to this turn; give channel and chat_id explicitly"
            );
        };

        debug!(channel = %target.channel, chat_id = %target.chat_id, "message tool send");

        let mut out = OutboundMessage::new(&target.channel, &target.chat_id, &content);
        out.reply_to = optional_string(&params, "reply_to");
        (self.publish)(out)
            .await
            .map_err(|e| anyhow::anyhow!("Could not deliver the message: {e}"))?;

        Ok(format!("Delivered to {}:{}", target.channel, target.chat_id))
    }

    async fn set_context(&self, channel: &str, chat_id: &str) {
        *self.route.lock().await = Some(Route {
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
        });
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use hermod_core::bus::MessageBus;

    fn publish_into(bus: Arc<MessageBus>) -> PublishFn {
        Arc::new(move |msg| {
            let bus = bus.clone();
            Box::pin(async move { bus.publish_outbound(msg) })
        })
    }

    fn tool_with_bus() -> (MessageTool, Arc<MessageBus>) {
        let bus = Arc::new(MessageBus::new());
        (MessageTool::new(publish_into(bus.clone())), bus)
    }

    fn params(pairs: Value) -> HashMap<String, Value> {
        pairs.as_object().unwrap().clone().into_iter().collect()
    }

    #[tokio::test]
    async fn sends_to_the_bound_route() {
        let (tool, bus) = tool_with_bus();
        tool.set_context("telegram", "42").await;

        let out = tool
            .execute(params(json!({"content": "heads up"})))
            .await
            .unwrap();
        assert_eq!(out, "Delivered to telegram:42");

        let published = bus.consume_outbound().await.unwrap();
        assert_eq!(published.channel, "telegram");
        assert_eq!(published.chat_id, "42");
        assert_eq!(published.content, "heads up");
        assert!(published.reply_to.is_none());
    }

    #[tokio::test]
    async fn explicit_pair_overrides_the_route() {
        let (tool, bus) = tool_with_bus();
        tool.set_context("cli", "direct").await;

        tool.execute(params(json!({
            "content": "x", "channel": "whatsapp", "chat_id": "4915"
        })))
        .await
        .unwrap();

        let published = bus.consume_outbound().await.unwrap();
        assert_eq!(published.channel, "whatsapp");
        assert_eq!(published.chat_id, "4915");
    }

    #[tokio::test]
    async fn half_an_address_is_rejected() {
        let (tool, _) = tool_with_bus();
        tool.set_context("cli", "direct").await;

        let err = tool
            .execute(params(json!({"content": "x", "channel": "whatsapp"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("together"));

        let err = tool
            .execute(params(json!({"content": "x", "chat_id": "4915"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("together"));
    }

    #[tokio::test]
    async fn unbound_route_without_address_is_rejected() {
        let (tool, _) = tool_with_bus();
        let err = tool
            .execute(params(json!({"content": "lost"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no conversation is bound"));
    }

    #[tokio::test]
    async fn unbound_route_with_full_address_works() {
        let (tool, bus) = tool_with_bus();
        tool.execute(params(json!({
            "content": "x", "channel": "telegram", "chat_id": "7"
        })))
        .await
        .unwrap();
        assert_eq!(bus.consume_outbound().await.unwrap().chat_id, "7");
    }

    #[tokio::test]
    async fn reply_to_is_threaded_through() {
        let (tool, bus) = tool_with_bus();
        tool.set_context("telegram", "42").await;
        tool.execute(params(json!({"content": "re", "reply_to": "msg991"})))
            .await
            .unwrap();
        assert_eq!(
            bus.consume_outbound().await.unwrap().reply_to.as_deref(),
            Some("msg991")
        );
    }

    #[tokio::test]
    async fn rebinding_moves_the_default_target() {
        let (tool, bus) = tool_with_bus();
        tool.set_context("telegram", "1").await;
        tool.set_context("whatsapp", "2").await;

        tool.execute(params(json!({"content": "y"}))).await.unwrap();
        let published = bus.consume_outbound().await.unwrap();
        assert_eq!(published.channel, "whatsapp");
        assert_eq!(published.chat_id, "2");
    }

    #[tokio::test]
    async fn missing_content_is_error() {
        let (tool, _) = tool_with_bus();
        assert!(tool.execute(HashMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn failed_publish_surfaces_as_error() {
        let failing: PublishFn =
            Arc::new(|_| Box::pin(async { anyhow::bail!("bus closed") }));
        let tool = MessageTool::new(failing);
        tool.set_context("cli", "direct").await;
        let err = tool
            .execute(params(json!({"content": "x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Could not deliver"));
    }
}
