//! The `spawn` tool: delegate work to a background subagent.
//!
//! Two actions share the tool. `run` (the default) hands a task to the
//! manager and returns immediately; the result re-enters later through
//! the bus, addressed at the conversation bound here. `status` reports
//! what is still running, so the model can answer "is it done yet?"
//! without spawning anything.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::base::{optional_string, require_string, Tool};
use crate::subagent::SubagentManager;

pub struct SpawnTool {
    manager: Arc<SubagentManager>,
    /// Origin of the turn in flight; results route back here.
    origin: Mutex<Option<(String, String)>>,
}

impl SpawnTool {
    pub fn new(manager: Arc<SubagentManager>) -> Self {
        Self {
            manager,
            origin: Mutex::new(None),
        }
    }

    async fn status(&self) -> String {
        let tasks = self.manager.running_tasks().await;
        if tasks.is_empty() {
            return "No subagents are running.".into();
        }
        tasks
            .iter()
            .map(|t| {
                format!(
                    "{} [{}] for {}:{}",
                    t.id, t.label, t.origin_channel, t.origin_chat_id
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Tool for SpawnTool {
    fn name(&self) -> &str {
        "spawn"
    }

    fn description(&self) -> &str {
        "Delegate a task to a background subagent. It reports back to this \
         conversation when it finishes. Use action=status to list subagents \
         that are still running."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": {"type": "string", "description": "What the subagent should do (for run)"},
                "label": {"type": "string", "description": "Short display label for the task"},
                "action": {
                    "type": "string",
                    "enum": ["run", "status"],
                    "description": "run (default) starts a task; status lists running ones"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let action = optional_string(&params, "action").unwrap_or_else(|| "run".into());
        if action == "status" {
            return Ok(self.status().await);
        }

        let task = require_string(&params, "task")?;
        let label = optional_string(&params, "label");
        let (origin_channel, origin_chat_id) = self
            .origin
            .lock()
            .await
            .clone()
            .unwrap_or_else(|| ("cli".into(), "direct".into()));

        Ok(self
            .manager
            .spawn(task, label, origin_channel, origin_chat_id)
            .await)
    }

    async fn set_context(&self, channel: &str, chat_id: &str) {
        *self.origin.lock().await = Some((channel.to_string(), chat_id.to_string()));
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hermod_core::bus::MessageBus;
    use hermod_core::types::{LlmResponse, Message, ToolDefinition};
    use hermod_providers::{LlmProvider, RequestConfig};
    use crate::tools::shell::ExecPolicy;

    /// Provider that parks until released, keeping the subagent "running".
    struct GatedProvider {
        gate: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl LlmProvider for GatedProvider {
        async fn chat(
            &self,
            _messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
            _model: &str,
            _config: &RequestConfig,
        ) -> LlmResponse {
            self.gate.notified().await;
            LlmResponse {
                content: Some("finished".into()),
                ..Default::default()
            }
        }
        fn default_model(&self) -> &str {
            "gated"
        }
        fn display_name(&self) -> &str {
            "Gated"
        }
    }

    struct InstantProvider;

    #[async_trait]
    impl LlmProvider for InstantProvider {
        async fn chat(
            &self,
            _messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
            _model: &str,
            _config: &RequestConfig,
        ) -> LlmResponse {
            LlmResponse {
                content: Some("finished".into()),
                ..Default::default()
            }
        }
        fn default_model(&self) -> &str {
            "instant"
        }
        fn display_name(&self) -> &str {
            "Instant"
        }
    }

    fn tool_around(provider: Arc<dyn LlmProvider>) -> (SpawnTool, Arc<MessageBus>) {
        let bus = Arc::new(MessageBus::new());
        let workspace = std::env::temp_dir().join("hermod-spawn-test");
        let _ = std::fs::create_dir_all(&workspace);
        let mgr = Arc::new(SubagentManager::new(
            provider,
            workspace,
            bus.clone(),
            "test-model".into(),
            None,
            ExecPolicy::default(),
            false,
            RequestConfig::default(),
        ));
        (SpawnTool::new(mgr), bus)
    }

    fn params(pairs: Value) -> HashMap<String, Value> {
        pairs.as_object().unwrap().clone().into_iter().collect()
    }

    #[test]
    fn schema_declares_both_actions() {
        let (tool, _) = tool_around(Arc::new(InstantProvider));
        let schema = tool.parameters();
        let actions = schema["properties"]["action"]["enum"].as_array().unwrap();
        assert!(actions.contains(&json!("run")));
        assert!(actions.contains(&json!("status")));
    }

    #[tokio::test]
    async fn run_spawns_with_bound_origin() {
        let (tool, bus) = tool_around(Arc::new(InstantProvider));
        tool.set_context("whatsapp", "4915").await;

        let ack = tool
            .execute(params(json!({"task": "summarize the inbox"})))
            .await
            .unwrap();
        assert!(ack.contains("started"));
        assert!(ack.contains("I'll notify you when it completes."));

        let announced =
            tokio::time::timeout(std::time::Duration::from_secs(5), bus.consume_inbound())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(announced.chat_id, "whatsapp:4915");
    }

    #[tokio::test]
    async fn unbound_origin_defaults_to_cli_direct() {
        let (tool, bus) = tool_around(Arc::new(InstantProvider));
        tool.execute(params(json!({"task": "t"}))).await.unwrap();
        let announced =
            tokio::time::timeout(std::time::Duration::from_secs(5), bus.consume_inbound())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(announced.chat_id, "cli:direct");
    }

    #[tokio::test]
    async fn run_without_task_is_error() {
        let (tool, _) = tool_around(Arc::new(InstantProvider));
        assert!(tool.execute(HashMap::new()).await.is_err());
        assert!(tool
            .execute(params(json!({"action": "run"})))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn status_with_nothing_running() {
        let (tool, _) = tool_around(Arc::new(InstantProvider));
        let out = tool
            .execute(params(json!({"action": "status"})))
            .await
            .unwrap();
        assert_eq!(out, "No subagents are running.");
    }

    #[tokio::test]
    async fn status_lists_a_running_task() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let (tool, bus) = tool_around(Arc::new(GatedProvider { gate: gate.clone() }));
        tool.set_context("telegram", "42").await;

        tool.execute(params(json!({"task": "long haul", "label": "haul"})))
            .await
            .unwrap();
        // Give the worker a moment to register before it blocks on the gate.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let out = tool
            .execute(params(json!({"action": "status"})))
            .await
            .unwrap();
        assert!(out.contains("[haul]"));
        assert!(out.contains("telegram:42"));

        // Release the worker and let it announce.
        gate.notify_one();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), bus.consume_inbound())
            .await
            .unwrap();
    }
}
