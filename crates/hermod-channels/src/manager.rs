//! Channel manager: lifecycle plus outbound wiring.
//!
//! Registration subscribes the channel's `send` on the bus under its name,
//! so delivery flows through the bus's own dispatcher pump rather than a
//! private routing table. `start_all` runs every channel and the pump as
//! tasks and parks until shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use hermod_core::bus::MessageBus;

use crate::base::Channel;

pub struct ChannelManager {
    channels: HashMap<String, Arc<dyn Channel>>,
    bus: Arc<MessageBus>,
    shutdown: Arc<Notify>,
}

impl ChannelManager {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            channels: HashMap::new(),
            bus,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Register a channel and subscribe its `send` to the bus.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "channel registered");

        let subscriber = channel.clone();
        self.bus.subscribe_outbound(
            &name,
            Arc::new(move |msg| {
                let channel = subscriber.clone();
                Box::pin(async move { channel.send(&msg).await })
            }),
        );
        self.channels.insert(name, channel);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Channel>> {
        self.channels.get(name)
    }

    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Run every channel plus the bus dispatcher until shutdown.
    pub async fn start_all(&self) -> Result<()> {
        if self.channels.is_empty() {
            warn!("no channels registered");
        }

        info!(channels = ?self.channel_names(), "starting channels");

        let mut handles = Vec::new();
        for (name, channel) in &self.channels {
            let channel = channel.clone();
            let name = name.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = channel.start().await {
                    error!(channel = %name, error = %e, "channel exited with error");
                }
            }));
        }

        let bus = self.bus.clone();
        handles.push(tokio::spawn(async move { bus.dispatch_outbound().await }));

        self.shutdown.notified().await;
        info!("channel manager shutting down");
        Ok(())
    }

    /// Stop the dispatcher and every channel.
    pub async fn stop_all(&self) {
        self.shutdown.notify_waiters();
        self.bus.stop();
        for (name, channel) in &self.channels {
            debug!(channel = %name, "stopping channel");
            if let Err(e) = channel.stop().await {
                error!(channel = %name, error = %e, "channel stop failed");
            }
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
