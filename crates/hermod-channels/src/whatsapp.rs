//! WhatsApp transport: WebSocket client to a local bridge process.
//!
//! A separate bridge process speaks the WhatsApp Web protocol and exposes
//! a plain WebSocket. Inbound events arrive as JSON frames
//! (`{"type":"message","sender":…,"chat":…,"text":…}`); outbound replies
//! go out as `{"type":"send","to":…,"text":…}`. Connection loss triggers
//! reconnect with a fixed 5 second backoff.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use hermod_core::bus::{MessageBus, OutboundMessage};

use crate::base::{Channel, ChannelInbox};

const RECONNECT_DELAY_SECS: u64 = 5;

type WsSink = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    tokio_tungstenite::tungstenite::Message,
>;

pub struct WhatsAppChannel {
    bridge_url: String,
    inbox: ChannelInbox,
    shutdown: Arc<Notify>,
    writer: Arc<Mutex<Option<WsSink>>>,
}

impl WhatsAppChannel {
    pub fn new(bridge_url: String, bus: Arc<MessageBus>, allow_from: Vec<String>) -> Self {
        Self {
            bridge_url,
            inbox: ChannelInbox::new("whatsapp", allow_from, bus),
            shutdown: Arc::new(Notify::new()),
            writer: Arc::new(Mutex::new(None)),
        }
    }

    /// One bridge session; returns Ok on clean close, Err to reconnect.
    async fn session(&self) -> anyhow::Result<()> {
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        debug!(url = %self.bridge_url, "connecting to whatsapp bridge");
        let (stream, _) = tokio_tungstenite::connect_async(&self.bridge_url).await?;
        info!("whatsapp bridge connected");

        let (writer, mut reader) = stream.split();
        *self.writer.lock().await = Some(writer);

        loop {
            tokio::select! {
                frame = reader.next() => {
                    let frame = match frame {
                        Some(Ok(f)) => f,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    };
                    match frame {
                        WsMessage::Text(text) => {
                            if let Err(e) = self.handle_frame(&text) {
                                warn!(error = %e, "bad bridge frame");
                            }
                        }
                        WsMessage::Close(_) => {
                            info!("whatsapp bridge closed the connection");
                            return Ok(());
                        }
                        _ => {}
                    }
                }
                _ = self.shutdown.notified() => {
                    if let Some(mut writer) = self.writer.lock().await.take() {
                        let _ = writer.send(WsMessage::Close(None)).await;
                    }
                    return Ok(());
                }
            }
        }
    }

    fn handle_frame(&self, raw: &str) -> anyhow::Result<()> {
        let frame: Value = serde_json::from_str(raw)?;
        match frame["type"].as_str().unwrap_or("") {
            "message" => {
                let sender = frame["sender"].as_str().unwrap_or_default();
                let chat = frame["chat"].as_str().unwrap_or(sender);
                let text = frame["text"].as_str().unwrap_or_default();

                let mut metadata = HashMap::new();
                if let Some(id) = frame.get("id") {
                    metadata.insert("message_id".to_string(), id.clone());
                }
                if frame["group"].as_bool().unwrap_or(false) {
                    metadata.insert("group".to_string(), json!(true));
                }

                self.inbox
                    .handle_message(sender, chat, text, Vec::new(), metadata)?;
            }
            "status" => {
                debug!(status = frame["status"].as_str().unwrap_or("?"), "bridge status");
            }
            "error" => {
                error!(error = frame["error"].as_str().unwrap_or("?"), "bridge error");
            }
            other => debug!(frame_type = other, "ignoring bridge frame"),
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn start(&self) -> anyhow::Result<()> {
        loop {
            match self.session().await {
                Ok(()) => {
                    info!("whatsapp session ended");
                    return Ok(());
                }
                Err(e) => {
                    *self.writer.lock().await = None;
                    warn!(error = %e, "whatsapp bridge lost, reconnecting in {RECONNECT_DELAY_SECS}s");
                    tokio::select! {
                        _ = tokio::time::sleep(std::time::Duration::from_secs(RECONNECT_DELAY_SECS)) => {}
                        _ = self.shutdown.notified() => return Ok(()),
                    }
                }
            }
        }
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.shutdown.notify_waiters();
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()> {
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        let frame = json!({
            "type": "send",
            "to": msg.chat_id,
            "text": msg.content,
        });

        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(w) => {
                w.send(WsMessage::Text(frame.to_string().into()))
                    .await
                    .map_err(|e| anyhow::anyhow!("bridge send failed: {e}"))?;
                Ok(())
            }
            None => anyhow::bail!("whatsapp bridge is not connected"),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
