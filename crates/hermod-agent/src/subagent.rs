//! Subagent manager: detached background reasoning tasks.
//!
//! A subagent gets its own tool registry (file read/write/list, exec, web;
//! no message tool, no spawn tool), its own ephemeral message history, and
//! a tighter iteration budget. It cannot reach the user directly: whatever
//! it concludes comes back as a single `system` inbound message addressed
//! at the originating conversation, and the main loop summarizes it there.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use hermod_core::bus::{InboundMessage, MessageBus};
use hermod_core::types::Message;
use hermod_providers::{LlmProvider, RequestConfig};

use crate::context::ContextBuilder;
use crate::tools::filesystem::{ListDirTool, ReadFileTool, Sandbox, WriteFileTool};
use crate::tools::registry::ToolRegistry;
use crate::tools::shell::{ExecPolicy, ExecTool};
use crate::tools::web::{WebFetchTool, WebSearchTool};

/// Iteration budget for one subagent task.
const SUBAGENT_MAX_ITERATIONS: usize = 15;

/// Bookkeeping entry for one running task.
#[derive(Clone, Debug)]
pub struct TaskInfo {
    pub id: String,
    pub label: String,
    pub task: String,
    pub origin_channel: String,
    pub origin_chat_id: String,
}

pub struct SubagentManager {
    provider: Arc<dyn LlmProvider>,
    workspace: PathBuf,
    bus: Arc<MessageBus>,
    model: String,
    search_api_key: Option<String>,
    exec_policy: ExecPolicy,
    restrict_to_workspace: bool,
    request_config: RequestConfig,
    running: RwLock<HashMap<String, TaskInfo>>,
}

impl SubagentManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        workspace: PathBuf,
        bus: Arc<MessageBus>,
        model: String,
        search_api_key: Option<String>,
        exec_policy: ExecPolicy,
        restrict_to_workspace: bool,
        request_config: RequestConfig,
    ) -> Self {
        Self {
            provider,
            workspace,
            bus,
            model,
            search_api_key,
            exec_policy,
            restrict_to_workspace,
            request_config,
            running: RwLock::new(HashMap::new()),
        }
    }

    /// Detach a background task and return the acknowledgement the model
    /// sees immediately. The result arrives later through the bus.
    pub async fn spawn(
        self: &Arc<Self>,
        task: String,
        label: Option<String>,
        origin_channel: String,
        origin_chat_id: String,
    ) -> String {
        let task_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let label = label.unwrap_or_else(|| {
            if task.chars().count() > 30 {
                let head: String = task.chars().take(30).collect();
                format!("{head}...")
            } else {
                task.clone()
            }
        });

        self.running.write().await.insert(
            task_id.clone(),
            TaskInfo {
                id: task_id.clone(),
                label: label.clone(),
                task: task.clone(),
                origin_channel: origin_channel.clone(),
                origin_chat_id: origin_chat_id.clone(),
            },
        );

        let mgr = Arc::clone(self);
        let id = task_id.clone();
        let task_label = label.clone();
        tokio::spawn(async move {
            let (result, status) = match mgr.run_task(&id, &task).await {
                Ok(text) => (text, "ok"),
                Err(e) => {
                    error!(task_id = %id, error = %e, "subagent task failed");
                    (format!("Error: {e}"), "error")
                }
            };
            mgr.announce(&id, &task_label, &task, &result, status, &origin_channel, &origin_chat_id)
                .await;
            // Every exit path lands here; the entry must not outlive the task.
            mgr.running.write().await.remove(&id);
            info!(task_id = %id, "subagent task finished");
        });

        info!(task_id = %task_id, label = %label, "subagent spawned");
        format!("Subagent [{label}] started (id: {task_id}). I'll notify you when it completes.")
    }

    /// The subagent's own bounded reasoning loop.
    async fn run_task(&self, task_id: &str, task: &str) -> anyhow::Result<String> {
        let mut tools = ToolRegistry::new();
        let sandbox = if self.restrict_to_workspace {
            Sandbox::confined(self.workspace.clone())
        } else {
            Sandbox::open(self.workspace.clone())
        };
        tools.register(Arc::new(ReadFileTool::new(sandbox.clone())));
        tools.register(Arc::new(WriteFileTool::new(sandbox.clone())));
        tools.register(Arc::new(ListDirTool::new(sandbox)));
        tools.register(Arc::new(ExecTool::new(
            self.workspace.clone(),
            self.exec_policy.clone(),
        )));
        tools.register(Arc::new(WebSearchTool::new(self.search_api_key.clone())));
        tools.register(Arc::new(WebFetchTool::new()));

        let mut messages = vec![
            Message::system(self.task_prompt(task)),
            Message::user(task),
        ];
        let tool_defs = tools.definitions();
        let mut final_content = None;

        for iteration in 0..SUBAGENT_MAX_ITERATIONS {
            let response = self
                .provider
                .chat(&messages, Some(&tool_defs), &self.model, &self.request_config)
                .await;

            if !response.has_tool_calls() {
                final_content = response.content;
                break;
            }

            let tool_calls = response.tool_calls.clone();
            ContextBuilder::push_assistant(&mut messages, response.content.clone(), tool_calls.clone());
            for tc in &tool_calls {
                debug!(task_id = %task_id, tool = %tc.function.name, iteration, "subagent tool call");
                let args = serde_json::from_str(&tc.function.arguments).unwrap_or_default();
                let result = tools.execute(&tc.function.name, args).await;
                ContextBuilder::push_tool_result(&mut messages, &tc.id, &tc.function.name, &result);
            }
        }

        Ok(final_content
            .unwrap_or_else(|| "Task completed but no final response was generated.".into()))
    }

    /// Publish the single result announcement on the system channel.
    async fn announce(
        &self,
        task_id: &str,
        label: &str,
        task: &str,
        result: &str,
        status: &str,
        origin_channel: &str,
        origin_chat_id: &str,
    ) {
        let status_text = if status == "ok" {
            "completed successfully"
        } else {
            "failed"
        };
        let content = format!(
            "[Subagent '{label}' {status_text}]\n\n\
             Task: {task}\n\n\
             Result:\n{result}\n\n\
             Summarize this naturally for the user. Keep it brief (1-2 sentences). \
             Do not mention technical details like \"subagent\" or task IDs."
        );

        let msg = InboundMessage::new(
            hermod_core::SYSTEM_CHANNEL,
            "subagent",
            format!("{origin_channel}:{origin_chat_id}"),
            content,
        );
        if let Err(e) = self.bus.publish_inbound(msg) {
            error!(task_id = %task_id, error = %e, "failed to announce subagent result");
        }
    }

    fn task_prompt(&self, task: &str) -> String {
        format!(
            "# Subagent\n\n\
             You are a subagent spawned by the main agent to complete one task.\n\n\
             ## Task\n{task}\n\n\
             ## Rules\n\
             1. Stay focused: complete only the assigned task\n\
             2. Your final response is reported back to the main agent\n\
             3. Do not start conversations or take on side quests\n\
             4. Be concise but complete in your findings\n\n\
             ## You can\n\
             - Read and write files in the workspace\n\
             - Execute shell commands\n\
             - Search the web and fetch pages\n\n\
             ## You cannot\n\
             - Message users directly (there is no message tool)\n\
             - Spawn further subagents\n\
             - See the main agent's conversation history\n\n\
             ## Workspace\n{}",
            self.workspace.display()
        )
    }

    pub async fn running_tasks(&self) -> Vec<TaskInfo> {
        self.running.read().await.values().cloned().collect()
    }

    pub async fn task_count(&self) -> usize {
        self.running.read().await.len()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
