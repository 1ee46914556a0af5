//! Tool registry: lookup, validation, and dispatch.
//!
//! The model always gets a string back from `execute`, even on failure.
//! Keeping errors inside the tool-result round trip lets the model read
//! the problem and self-correct instead of killing the turn.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use hermod_core::types::ToolDefinition;

use super::base::Tool;
use super::schema::validate_args;

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool; a same-named tool is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        info!(tool = tool.name(), "tool registered");
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Function-calling definitions for every tool, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    /// Push the current routing coordinates into every tool. Tools without
    /// the capability ignore the call.
    pub async fn set_context_all(&self, channel: &str, chat_id: &str) {
        for tool in self.tools.values() {
            tool.set_context(channel, chat_id).await;
        }
    }

    /// Execute a tool by name.
    ///
    /// 1. Unknown tool: `Error: Tool '<name>' not found`
    /// 2. Schema violations: `Error: Invalid parameters for tool '<name>': …`
    /// 3. Execution failure: `Error executing <name>: …`
    pub async fn execute(&self, name: &str, params: HashMap<String, Value>) -> String {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "tool not found");
            return format!("Error: Tool '{name}' not found");
        };

        let errors = validate_args(&params, &tool.parameters());
        if !errors.is_empty() {
            warn!(tool = name, errors = errors.len(), "invalid tool arguments");
            return format!(
                "Error: Invalid parameters for tool '{name}': {}",
                errors.join("; ")
            );
        }

        match tool.execute(params).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = name, error = %e, "tool execution failed");
                format!("Error executing {name}: {e}")
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
