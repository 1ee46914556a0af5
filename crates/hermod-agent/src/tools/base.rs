//! The `Tool` trait: the interface every agent capability implements.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use hermod_core::types::ToolDefinition;

/// One agent capability, dispatched by name from the registry.
///
/// `parameters()` must return an object-typed JSON schema; the registry
/// validates arguments against it before `execute` runs, so tools can
/// assume required keys are present with the declared types.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls this tool by. Unique within a registry.
    fn name(&self) -> &str;

    /// Purpose description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the arguments.
    fn parameters(&self) -> Value;

    /// Run the tool. The returned string is what the model reads; an `Err`
    /// is caught by the registry and converted to an error string.
    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String>;

    /// Routing-context capability. The agent loop calls this on every tool
    /// before a turn; tools whose side effects need to know the current
    /// conversation (message, spawn, cron) override it, the rest ignore it.
    async fn set_context(&self, _channel: &str, _chat_id: &str) {}

    /// The function-calling definition sent to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

// ────────────── typed param accessors ──────────────

pub fn require_string(params: &HashMap<String, Value>, key: &str) -> anyhow::Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))
}

pub fn optional_string(params: &HashMap<String, Value>, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

pub fn optional_i64(params: &HashMap<String, Value>, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

pub fn optional_bool(params: &HashMap<String, Value>, key: &str) -> Option<bool> {
    params.get(key).and_then(|v| v.as_bool())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_string_present_and_missing() {
        let mut params = HashMap::new();
        params.insert("path".into(), json!("/tmp/a"));
        assert_eq!(require_string(&params, "path").unwrap(), "/tmp/a");
        assert!(require_string(&params, "other").is_err());
    }

    #[test]
    fn require_string_rejects_wrong_type() {
        let mut params = HashMap::new();
        params.insert("path".into(), json!(12));
        assert!(require_string(&params, "path").is_err());
    }

    #[test]
    fn optional_accessors() {
        let mut params = HashMap::new();
        params.insert("n".into(), json!(3));
        params.insert("flag".into(), json!(true));
        params.insert("mode".into(), json!("fast"));
        assert_eq!(optional_i64(&params, "n"), Some(3));
        assert_eq!(optional_bool(&params, "flag"), Some(true));
        assert_eq!(optional_string(&params, "mode").as_deref(), Some("fast"));
        assert_eq!(optional_i64(&params, "missing"), None);
        assert_eq!(optional_bool(&params, "missing"), None);
    }

    #[tokio::test]
    async fn default_definition_shape() {
        struct Probe;

        #[async_trait]
        impl Tool for Probe {
            fn name(&self) -> &str {
                "probe"
            }
            fn description(&self) -> &str {
                "a probe"
            }
            fn parameters(&self) -> Value {
                json!({"type": "object", "properties": {}, "required": []})
            }
            async fn execute(&self, _params: HashMap<String, Value>) -> anyhow::Result<String> {
                Ok("ok".into())
            }
        }

        let def = Probe.definition();
        assert_eq!(def.tool_type, "function");
        assert_eq!(def.function.name, "probe");
        assert_eq!(def.function.description, "a probe");
    }
}
