//! The agent loop: consume inbound, reason with the model and tools, emit
//! outbound, persist the session.
//!
//! One message is consumed and run to completion at a time, which is what
//! serializes per-session turns. The inbound poll uses a short timeout so
//! `stop()` is observed within about a second. A failing turn produces an
//! apology reply on the same coordinates; the loop itself never dies from
//! one bad message.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info};

use hermod_core::bus::{InboundMessage, MessageBus, OutboundMessage};
use hermod_core::session::SessionStore;
use hermod_core::types::{Message, ToolCall};
use hermod_core::{CLI_CHANNEL, SYSTEM_CHANNEL};
use hermod_cron::CronService;
use hermod_providers::{LlmProvider, RequestConfig};

use crate::context::ContextBuilder;
use crate::subagent::SubagentManager;
use crate::tools::cron::CronTool;
use crate::tools::filesystem::{EditFileTool, ListDirTool, ReadFileTool, Sandbox, WriteFileTool};
use crate::tools::message::{MessageTool, PublishFn};
use crate::tools::registry::ToolRegistry;
use crate::tools::shell::{default_deny_patterns, ExecPolicy, ExecTool};
use crate::tools::spawn::SpawnTool;
use crate::tools::web::{WebFetchTool, WebSearchTool};

/// Provider calls allowed per turn before the fallback reply.
const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Session turns fed back into the context.
const HISTORY_WINDOW: usize = 50;

/// Inbound poll interval; bounds how long `stop()` can go unnoticed.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

const EXHAUSTED_REPLY: &str = "I've completed processing but have no response to give.";
const SYSTEM_EXHAUSTED_REPLY: &str = "Background task completed.";

/// Construction-time knobs. Everything has a sensible default.
#[derive(Default)]
pub struct AgentSettings {
    pub model: Option<String>,
    pub max_iterations: Option<usize>,
    pub request_config: Option<RequestConfig>,
    pub agent_name: Option<String>,
    pub search_api_key: Option<String>,
    pub exec_timeout: Option<u64>,
    /// Exec refusal regexes from `tools.exec.denyPatterns`; `None` means
    /// the built-in set, an empty list disables the guard.
    pub exec_deny_patterns: Option<Vec<String>>,
    pub restrict_to_workspace: bool,
    pub builtin_skills: Option<PathBuf>,
}

pub struct AgentLoop {
    bus: Arc<MessageBus>,
    provider: Arc<dyn LlmProvider>,
    workspace: PathBuf,
    model: String,
    max_iterations: usize,
    request_config: RequestConfig,
    tools: ToolRegistry,
    context: ContextBuilder,
    sessions: Arc<SessionStore>,
    subagents: Arc<SubagentManager>,
    running: AtomicBool,
}

impl AgentLoop {
    pub fn new(
        bus: Arc<MessageBus>,
        provider: Arc<dyn LlmProvider>,
        workspace: PathBuf,
        sessions: Arc<SessionStore>,
        cron: Option<Arc<CronService>>,
        settings: AgentSettings,
    ) -> Self {
        let model = settings
            .model
            .unwrap_or_else(|| provider.default_model().to_string());
        let max_iterations = settings.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS);
        let request_config = settings.request_config.unwrap_or_default();
        let exec_timeout = settings.exec_timeout.unwrap_or(60);
        let agent_name = settings.agent_name.unwrap_or_else(|| "Hermod".into());

        let mut context = ContextBuilder::new(&workspace, &agent_name);
        if let Some(builtin) = settings.builtin_skills {
            context = context.with_builtin_skills(builtin);
        }

        let exec_policy = ExecPolicy {
            timeout_secs: exec_timeout,
            deny_patterns: settings
                .exec_deny_patterns
                .unwrap_or_else(default_deny_patterns),
            confine_to_workspace: settings.restrict_to_workspace,
        };

        let subagents = Arc::new(SubagentManager::new(
            provider.clone(),
            workspace.clone(),
            bus.clone(),
            model.clone(),
            settings.search_api_key.clone(),
            exec_policy.clone(),
            settings.restrict_to_workspace,
            request_config.clone(),
        ));

        let mut tools = ToolRegistry::new();
        let sandbox = if settings.restrict_to_workspace {
            Sandbox::confined(workspace.clone())
        } else {
            Sandbox::open(workspace.clone())
        };
        tools.register(Arc::new(ReadFileTool::new(sandbox.clone())));
        tools.register(Arc::new(WriteFileTool::new(sandbox.clone())));
        tools.register(Arc::new(EditFileTool::new(sandbox.clone())));
        tools.register(Arc::new(ListDirTool::new(sandbox)));
        tools.register(Arc::new(ExecTool::new(workspace.clone(), exec_policy)));
        tools.register(Arc::new(WebSearchTool::new(settings.search_api_key)));
        tools.register(Arc::new(WebFetchTool::new()));

        // The message tool gets a publish capability over the bus, not the
        // bus itself.
        let publish: PublishFn = {
            let bus = bus.clone();
            Arc::new(move |msg| {
                let bus = bus.clone();
                Box::pin(async move { bus.publish_outbound(msg) })
            })
        };
        tools.register(Arc::new(MessageTool::new(publish)));
        tools.register(Arc::new(SpawnTool::new(subagents.clone())));
        if let Some(cron) = cron {
            tools.register(Arc::new(CronTool::new(cron)));
        }

        info!(
            model = %model,
            tools = tools.len(),
            max_iterations,
            "agent loop ready"
        );

        Self {
            bus,
            provider,
            workspace,
            model,
            max_iterations,
            request_config,
            tools,
            context,
            sessions,
            subagents,
            running: AtomicBool::new(false),
        }
    }

    // ────────────── main loop ──────────────

    /// Poll the bus and process messages until `stop()`.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!("agent loop started");

        while self.running.load(Ordering::SeqCst) {
            let msg = match tokio::time::timeout(POLL_INTERVAL, self.bus.consume_inbound()).await {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(_) => continue,
            };

            match self.process_message(&msg).await {
                Ok(Some(response)) => {
                    if let Err(e) = self.bus.publish_outbound(response) {
                        error!(error = %e, "failed to publish reply");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, session = %msg.session_key(), "turn failed");
                    let apology = OutboundMessage::new(
                        &msg.channel,
                        &msg.chat_id,
                        format!("Sorry, I encountered an error: {e}"),
                    );
                    let _ = self.bus.publish_outbound(apology);
                }
            }
        }

        info!("agent loop stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    // ────────────── turn processing ──────────────

    /// One full turn for one inbound message.
    pub async fn process_message(&self, msg: &InboundMessage) -> Result<Option<OutboundMessage>> {
        if msg.channel == SYSTEM_CHANNEL {
            return self.process_system_message(msg).await;
        }

        let session_key = msg.session_key();
        info!(session = %session_key, sender = %msg.sender_id, "processing message");

        // Routing-aware tools must know where this turn's side effects
        // belong before any tool call runs.
        self.tools.set_context_all(&msg.channel, &msg.chat_id).await;

        let history = self.sessions.get_history(&session_key, HISTORY_WINDOW);
        let mut messages = self.context.build_messages(
            &history,
            &msg.content,
            &msg.media,
            Some(&msg.channel),
            Some(&msg.chat_id),
        );

        let reply = self
            .drive(&mut messages)
            .await
            .unwrap_or_else(|| EXHAUSTED_REPLY.into());

        self.sessions.add_turn(&session_key, "user", &msg.content);
        self.sessions.add_turn(&session_key, "assistant", &reply);

        Ok(Some(OutboundMessage::new(&msg.channel, &msg.chat_id, reply)))
    }

    /// Synthetic turns arrive on the `system` channel with the origin
    /// conversation packed into `chat_id` as `"<channel>:<chat_id>"`. The
    /// turn runs against the origin session and the reply routes there.
    async fn process_system_message(&self, msg: &InboundMessage) -> Result<Option<OutboundMessage>> {
        info!(sender = %msg.sender_id, chat_id = %msg.chat_id, "processing system message");

        let (origin_channel, origin_chat_id) = match msg.chat_id.split_once(':') {
            Some((channel, chat_id)) => (channel.to_string(), chat_id.to_string()),
            None => (CLI_CHANNEL.to_string(), msg.chat_id.clone()),
        };
        let session_key = format!("{origin_channel}:{origin_chat_id}");

        self.tools
            .set_context_all(&origin_channel, &origin_chat_id)
            .await;

        let history = self.sessions.get_history(&session_key, HISTORY_WINDOW);
        // System turns never carry media.
        let mut messages = self.context.build_messages(
            &history,
            &msg.content,
            &[],
            Some(&origin_channel),
            Some(&origin_chat_id),
        );

        let reply = self
            .drive(&mut messages)
            .await
            .unwrap_or_else(|| SYSTEM_EXHAUSTED_REPLY.into());

        // Mark the synthetic origin in the transcript.
        self.sessions.add_turn(
            &session_key,
            "user",
            &format!("[System: {}] {}", msg.sender_id, msg.content),
        );
        self.sessions.add_turn(&session_key, "assistant", &reply);

        Ok(Some(OutboundMessage::new(origin_channel, origin_chat_id, reply)))
    }

    /// The bounded LLM ↔ tool iteration. Returns the model's final text,
    /// or `None` when the budget ran out (or the model went silent).
    async fn drive(&self, messages: &mut Vec<Message>) -> Option<String> {
        let tool_defs = self.tools.definitions();

        for iteration in 0..self.max_iterations {
            let response = self
                .provider
                .chat(messages, Some(&tool_defs), &self.model, &self.request_config)
                .await;

            if !response.has_tool_calls() {
                return response.content;
            }

            // Arguments go back into the transcript re-serialized to a
            // canonical JSON string, whatever shape the provider sent.
            let calls: Vec<ToolCall> = response
                .tool_calls
                .iter()
                .map(|tc| {
                    let canonical = serde_json::from_str::<serde_json::Value>(&tc.function.arguments)
                        .map(|v| v.to_string())
                        .unwrap_or_else(|_| tc.function.arguments.clone());
                    ToolCall::new(&tc.id, &tc.function.name, canonical)
                })
                .collect();
            ContextBuilder::push_assistant(messages, response.content.clone(), calls.clone());

            for tc in &calls {
                debug!(tool = %tc.function.name, iteration, "tool call");
                let args: HashMap<String, serde_json::Value> =
                    serde_json::from_str(&tc.function.arguments).unwrap_or_default();
                let result = self.tools.execute(&tc.function.name, args).await;
                ContextBuilder::push_tool_result(messages, &tc.id, &tc.function.name, &result);
            }
        }

        None
    }

    /// Direct entry point for the CLI, heartbeat, and cron: wrap text as an
    /// inbound message, run the turn, return the reply text.
    pub async fn process_direct(&self, content: &str, channel: &str, chat_id: &str) -> Result<String> {
        let msg = InboundMessage::new(channel, "user", chat_id, content);
        let response = self.process_message(&msg).await?;
        Ok(response.map(|r| r.content).unwrap_or_default())
    }

    // ────────────── accessors ──────────────

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn workspace(&self) -> &std::path::Path {
        &self.workspace
    }

    pub fn subagents(&self) -> &Arc<SubagentManager> {
        &self.subagents
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hermod_core::types::{LlmResponse, ToolDefinition};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Scripted provider that records every request it sees.
    struct ScriptedProvider {
        responses: Mutex<Vec<LlmResponse>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<LlmResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn text(content: &str) -> Self {
            Self::new(vec![LlmResponse {
                content: Some(content.into()),
                ..Default::default()
            }])
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(
            &self,
            messages: &[Message],
            _tools: Option<&[ToolDefinition]>,
            _model: &str,
            _config: &RequestConfig,
        ) -> LlmResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(messages.to_vec());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                LlmResponse {
                    content: Some("(script exhausted)".into()),
                    ..Default::default()
                }
            } else {
                responses.remove(0)
            }
        }

        fn default_model(&self) -> &str {
            "scripted"
        }

        fn display_name(&self) -> &str {
            "Scripted"
        }
    }

    struct Rig {
        agent: AgentLoop,
        bus: Arc<MessageBus>,
        provider: Arc<ScriptedProvider>,
        _workspace: tempfile::TempDir,
        _sessions_dir: tempfile::TempDir,
    }

    fn rig(provider: ScriptedProvider, max_iterations: usize) -> Rig {
        let workspace = tempfile::tempdir().unwrap();
        let sessions_dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(MessageBus::new());
        let provider = Arc::new(provider);
        let sessions =
            Arc::new(SessionStore::new(Some(sessions_dir.path().to_path_buf())).unwrap());
        let agent = AgentLoop::new(
            bus.clone(),
            provider.clone(),
            workspace.path().to_path_buf(),
            sessions,
            None,
            AgentSettings {
                max_iterations: Some(max_iterations),
                ..Default::default()
            },
        );
        Rig {
            agent,
            bus,
            provider,
            _workspace: workspace,
            _sessions_dir: sessions_dir,
        }
    }

    #[tokio::test]
    async fn plain_echo() {
        let rig = rig(ScriptedProvider::text("hi"), 5);
        let msg = InboundMessage::new("cli", "u", "c", "hello");
        let out = rig.agent.process_message(&msg).await.unwrap().unwrap();

        assert_eq!(out.channel, "cli");
        assert_eq!(out.chat_id, "c");
        assert_eq!(out.content, "hi");
        assert_eq!(rig.provider.call_count(), 1);

        // The session holds exactly the user + assistant pair.
        let history = rig.agent.sessions.get_history("cli:c", 50);
        assert_eq!(history.len(), 2);
        let roles: Vec<&str> = history.iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec!["user", "assistant"]);
    }

    #[tokio::test]
    async fn single_tool_hop() {
        let workspace = tempfile::tempdir().unwrap();
        std::fs::write(workspace.path().join("AGENTS.md"), "be kind").unwrap();

        let call = ToolCall::new(
            "call_1",
            "read_file",
            serde_json::json!({"path": workspace.path().join("AGENTS.md")}).to_string(),
        );
        let provider = Arc::new(ScriptedProvider::new(vec![
            LlmResponse {
                tool_calls: vec![call],
                ..Default::default()
            },
            LlmResponse {
                content: Some("done".into()),
                ..Default::default()
            },
        ]));

        let sessions_dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(MessageBus::new());
        let sessions =
            Arc::new(SessionStore::new(Some(sessions_dir.path().to_path_buf())).unwrap());
        let agent = AgentLoop::new(
            bus,
            provider.clone(),
            workspace.path().to_path_buf(),
            sessions,
            None,
            AgentSettings::default(),
        );

        let reply = agent.process_direct("read the agents file", "cli", "c").await.unwrap();
        assert_eq!(reply, "done");
        assert_eq!(provider.call_count(), 2);

        // The second provider call saw the tool result threaded by id.
        let seen = provider.seen.lock().unwrap();
        let second = &seen[1];
        let tool_msg = second
            .iter()
            .find_map(|m| match m {
                Message::Tool {
                    content,
                    tool_call_id,
                    name,
                } => Some((content.clone(), tool_call_id.clone(), name.clone())),
                _ => None,
            })
            .expect("no tool message in second request");
        assert_eq!(tool_msg.1, "call_1");
        assert_eq!(tool_msg.2.as_deref(), Some("read_file"));
        assert!(tool_msg.0.contains("be kind"));
    }

    #[tokio::test]
    async fn unknown_tool_recovers() {
        let call = ToolCall::new("c9", "no_such", "{}");
        let rig = rig(
            ScriptedProvider::new(vec![
                LlmResponse {
                    tool_calls: vec![call],
                    ..Default::default()
                },
                LlmResponse {
                    content: Some("recovered".into()),
                    ..Default::default()
                },
            ]),
            5,
        );

        let reply = rig.agent.process_direct("x", "cli", "c").await.unwrap();
        assert_eq!(reply, "recovered");

        let seen = rig.provider.seen.lock().unwrap();
        let second = &seen[1];
        let tool_content = second
            .iter()
            .find_map(|m| match m {
                Message::Tool { content, .. } => Some(content.clone()),
                _ => None,
            })
            .unwrap();
        assert!(tool_content.starts_with("Error: Tool 'no_such' not found"));
    }

    #[tokio::test]
    async fn iteration_exhaustion_yields_fallback() {
        let call = ToolCall::new("loop", "list_dir", r#"{"path": "/tmp"}"#);
        let responses: Vec<LlmResponse> = (0..10)
            .map(|_| LlmResponse {
                tool_calls: vec![call.clone()],
                ..Default::default()
            })
            .collect();
        let rig = rig(ScriptedProvider::new(responses), 3);

        let reply = rig.agent.process_direct("loop forever", "cli", "c").await.unwrap();
        assert_eq!(reply, EXHAUSTED_REPLY);
        // The budget bounds provider calls exactly.
        assert_eq!(rig.provider.call_count(), 3);

        // The fallback is what got persisted as the assistant turn.
        let history = rig.agent.sessions.get_history("cli:c", 50);
        let last = serde_json::to_value(history.last().unwrap()).unwrap();
        assert_eq!(last["content"], EXHAUSTED_REPLY);
    }

    #[tokio::test]
    async fn provider_error_surfaces_as_reply() {
        let rig = rig(
            ScriptedProvider::new(vec![LlmResponse::error("Error calling LLM: 500")]),
            5,
        );
        let reply = rig.agent.process_direct("x", "cli", "c").await.unwrap();
        assert!(reply.contains("Error calling LLM"));
    }

    #[tokio::test]
    async fn system_message_routes_to_origin() {
        let rig = rig(ScriptedProvider::text("summary for the user"), 5);
        let msg = InboundMessage::new(
            "system",
            "subagent",
            "telegram:42",
            "[Subagent 'T' completed successfully]\n\nResult:\nR",
        );

        let out = rig.agent.process_message(&msg).await.unwrap().unwrap();
        assert_eq!(out.channel, "telegram");
        assert_eq!(out.chat_id, "42");
        assert_eq!(out.content, "summary for the user");

        // The origin session got the synthetic turn, not a system:… one.
        let history = rig.agent.sessions.get_history("telegram:42", 50);
        assert_eq!(history.len(), 2);
        let user = serde_json::to_value(&history[0]).unwrap();
        let text = user["content"].as_str().unwrap();
        assert!(text.starts_with("[System: subagent] "));
        assert!(rig.agent.sessions.get_history("system:telegram:42", 50).is_empty());
    }

    #[tokio::test]
    async fn system_message_unparseable_origin_falls_back_to_cli() {
        let rig = rig(ScriptedProvider::text("noted"), 5);
        let msg = InboundMessage::new("system", "cron", "no-colon-here", "tick");
        let out = rig.agent.process_message(&msg).await.unwrap().unwrap();
        assert_eq!(out.channel, "cli");
        assert_eq!(out.chat_id, "no-colon-here");
    }

    #[tokio::test]
    async fn system_exhaustion_uses_background_fallback() {
        let call = ToolCall::new("loop", "list_dir", r#"{"path": "/tmp"}"#);
        let responses: Vec<LlmResponse> = (0..10)
            .map(|_| LlmResponse {
                tool_calls: vec![call.clone()],
                ..Default::default()
            })
            .collect();
        let rig = rig(ScriptedProvider::new(responses), 2);

        let msg = InboundMessage::new("system", "subagent", "cli:direct", "result");
        let out = rig.agent.process_message(&msg).await.unwrap().unwrap();
        assert_eq!(out.content, SYSTEM_EXHAUSTED_REPLY);
    }

    #[tokio::test]
    async fn default_tools_registered() {
        let rig = rig(ScriptedProvider::text("x"), 5);
        let names = rig.agent.tools().names();
        for expected in [
            "read_file",
            "write_file",
            "edit_file",
            "list_dir",
            "exec",
            "web_search",
            "web_fetch",
            "message",
            "spawn",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
        // No cron service wired, no cron tool.
        assert!(!names.contains(&"cron".to_string()));
        assert_eq!(names.len(), 9);
    }

    #[tokio::test]
    async fn cron_tool_registered_when_service_present() {
        let workspace = tempfile::tempdir().unwrap();
        let sessions_dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(MessageBus::new());
        let cron = Arc::new(CronService::new(
            bus.clone(),
            Some(workspace.path().join("jobs.json")),
        ));
        let sessions =
            Arc::new(SessionStore::new(Some(sessions_dir.path().to_path_buf())).unwrap());
        let agent = AgentLoop::new(
            bus,
            Arc::new(ScriptedProvider::text("x")),
            workspace.path().to_path_buf(),
            sessions,
            Some(cron),
            AgentSettings::default(),
        );
        assert!(agent.tools().has("cron"));
    }

    #[tokio::test]
    async fn model_defaults_to_provider() {
        let rig = rig(ScriptedProvider::text("x"), 5);
        assert_eq!(rig.agent.model(), "scripted");
    }

    #[tokio::test]
    async fn run_processes_and_stop_is_prompt() {
        let workspace = tempfile::tempdir().unwrap();
        let sessions_dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(MessageBus::new());
        let sessions =
            Arc::new(SessionStore::new(Some(sessions_dir.path().to_path_buf())).unwrap());
        let agent = Arc::new(AgentLoop::new(
            bus.clone(),
            Arc::new(ScriptedProvider::text("pong")),
            workspace.path().to_path_buf(),
            sessions,
            None,
            AgentSettings::default(),
        ));

        let handle = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.run().await })
        };

        bus.publish_inbound(InboundMessage::new("cli", "u", "c", "ping"))
            .unwrap();
        let out = tokio::time::timeout(Duration::from_secs(5), bus.consume_outbound())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.content, "pong");

        agent.stop();
        // The poll interval bounds shutdown latency.
        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .expect("loop did not stop within the poll interval")
            .unwrap();
    }

    #[tokio::test]
    async fn per_session_turns_are_ordered() {
        let rig = rig(
            ScriptedProvider::new(vec![
                LlmResponse {
                    content: Some("r1".into()),
                    ..Default::default()
                },
                LlmResponse {
                    content: Some("r2".into()),
                    ..Default::default()
                },
            ]),
            5,
        );

        rig.agent.process_direct("m1", "cli", "s").await.unwrap();
        rig.agent.process_direct("m2", "cli", "s").await.unwrap();

        let history = rig.agent.sessions.get_history("cli:s", 50);
        let texts: Vec<String> = history
            .iter()
            .map(|m| serde_json::to_value(m).unwrap()["content"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["m1", "r1", "m2", "r2"]);
    }

    #[tokio::test]
    async fn tool_call_arguments_are_canonicalized() {
        // Whitespace-heavy arguments from the provider come back compact in
        // the assistant transcript message.
        let call = ToolCall::new("c1", "list_dir", "{ \"path\" :  \"/tmp\" }");
        let rig = rig(
            ScriptedProvider::new(vec![
                LlmResponse {
                    tool_calls: vec![call],
                    ..Default::default()
                },
                LlmResponse {
                    content: Some("ok".into()),
                    ..Default::default()
                },
            ]),
            5,
        );

        rig.agent.process_direct("x", "cli", "c").await.unwrap();
        let seen = rig.provider.seen.lock().unwrap();
        let assistant_args = seen[1]
            .iter()
            .find_map(|m| match m {
                Message::Assistant {
                    tool_calls: Some(calls),
                    ..
                } => Some(calls[0].function.arguments.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(assistant_args, r#"{"path":"/tmp"}"#);
    }
}
