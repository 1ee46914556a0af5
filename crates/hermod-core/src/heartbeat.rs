//! Heartbeat: a periodic synthetic turn driven off `HEARTBEAT.md`.
//!
//! Every tick reads the workspace's `HEARTBEAT.md`. A file that is missing,
//! empty, or all structure (headings, HTML comments, bare checklist markers)
//! costs nothing: no LLM call is made. Otherwise a fixed prompt runs one
//! turn through the agent's direct entry point.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, error, info};

/// Default interval between ticks: 30 minutes.
pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 30 * 60;

/// The prompt synthesized on an actionable tick.
pub const HEARTBEAT_PROMPT: &str = "Read HEARTBEAT.md in your workspace (if it exists).
Follow any instructions or tasks listed there.
If nothing needs attention, reply with just: HEARTBEAT_OK";

const HEARTBEAT_OK: &str = "HEARTBEAT_OK";

/// Callback that runs one agent turn and returns the reply text.
pub type HeartbeatFn = Arc<
    dyn Fn(String) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>> + Send + Sync,
>;

pub struct HeartbeatService {
    workspace: PathBuf,
    on_heartbeat: Option<HeartbeatFn>,
    interval: u64,
    enabled: bool,
    shutdown: Arc<Notify>,
}

impl HeartbeatService {
    pub fn new(
        workspace: PathBuf,
        on_heartbeat: Option<HeartbeatFn>,
        interval: Option<u64>,
        enabled: bool,
    ) -> Self {
        Self {
            workspace,
            on_heartbeat,
            interval: interval.unwrap_or(DEFAULT_HEARTBEAT_INTERVAL),
            enabled,
            shutdown: Arc::new(Notify::new()),
        }
    }

    fn heartbeat_file(&self) -> PathBuf {
        self.workspace.join("HEARTBEAT.md")
    }

    fn read_heartbeat_file(&self) -> Option<String> {
        std::fs::read_to_string(self.heartbeat_file()).ok()
    }

    /// Whether the file content carries anything actionable. Empty lines,
    /// headings, HTML comments, and unfilled/filled checklist markers with
    /// no text do not count.
    fn is_empty_content(content: Option<&str>) -> bool {
        let Some(content) = content else { return true };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty()
                || line.starts_with('#')
                || line.starts_with("<!--")
                || matches!(line, "- [ ]" | "* [ ]" | "- [x]" | "* [x]")
            {
                continue;
            }
            return false;
        }
        true
    }

    /// Run the tick loop until `stop()`. When disabled, parks until stopped.
    pub async fn start(&self) -> anyhow::Result<()> {
        if !self.enabled {
            info!("heartbeat disabled");
            self.shutdown.notified().await;
            return Ok(());
        }

        info!(interval = self.interval, "heartbeat started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(self.interval)) => {
                    self.tick().await;
                }
                _ = self.shutdown.notified() => {
                    info!("heartbeat stopped");
                    return Ok(());
                }
            }
        }
    }

    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }

    async fn tick(&self) {
        let content = self.read_heartbeat_file();
        if Self::is_empty_content(content.as_deref()) {
            debug!("heartbeat: nothing to do");
            return;
        }

        info!("heartbeat: running tasks");
        let Some(callback) = &self.on_heartbeat else {
            return;
        };

        match callback(HEARTBEAT_PROMPT.to_string()).await {
            Ok(response) => {
                // HEARTBEAT_OK may come back in any casing, with or
                // without the underscore.
                let normalized = response.to_uppercase().replace('_', "");
                if normalized.contains(&HEARTBEAT_OK.replace('_', "")) {
                    info!("heartbeat: ok, no action taken");
                } else {
                    info!("heartbeat: task completed");
                }
            }
            Err(e) => error!(error = %e, "heartbeat turn failed"),
        }
    }

    /// Fire one tick immediately, bypassing the emptiness check.
    /// Returns `None` when no callback is wired.
    pub async fn trigger_now(&self) -> Option<anyhow::Result<String>> {
        let callback = self.on_heartbeat.as_ref()?;
        Some(callback(HEARTBEAT_PROMPT.to_string()).await)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
