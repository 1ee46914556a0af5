//! The provider abstraction: one `chat` call.

use async_trait::async_trait;
use hermod_core::types::{LlmResponse, Message, ToolDefinition};

/// Per-call generation settings.
#[derive(Clone, Debug)]
pub struct RequestConfig {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// Implemented by every LLM backend.
///
/// `chat` never fails at the type level: transport and API errors come back
/// as `LlmResponse::error(..)` with `finish_reason = "error"`, which the
/// agent loop treats as a terminal reply.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        model: &str,
        config: &RequestConfig,
    ) -> LlmResponse;

    /// Default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Name for logs.
    fn display_name(&self) -> &str;
}
