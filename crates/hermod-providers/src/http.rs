//! Generic HTTP client for OpenAI-compatible chat-completions APIs.
//!
//! One implementation covers every configured backend: the registry picks
//! the spec, this client builds the request. Failures never escape as
//! errors; they come back as `LlmResponse::error(..)` so the loop can show
//! them to the user.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error, warn};

use hermod_core::types::{ChatRequest, ChatResponse, LlmResponse, Message, ToolDefinition};

use crate::registry::{match_provider, resolve_model_name, ProviderConfig, ProviderSpec};
use crate::traits::{LlmProvider, RequestConfig};

pub struct HttpProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    default_model: String,
    extra_headers: HeaderMap,
    spec: &'static ProviderSpec,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig, spec: &'static ProviderSpec, model: &str) -> Self {
        let api_base = config
            .api_base
            .clone()
            .or_else(|| spec.default_api_base.map(String::from))
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let mut extra_headers = HeaderMap::new();
        if let Some(headers) = &config.extra_headers {
            for (key, value) in headers {
                match (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    (Ok(name), Ok(val)) => {
                        extra_headers.insert(name, val);
                    }
                    _ => warn!(header = key, "skipping invalid extra header"),
                }
            }
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        HttpProvider {
            client,
            api_base,
            api_key: config.api_key.clone(),
            default_model: model.to_string(),
            extra_headers,
            spec,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        model: &str,
        config: &RequestConfig,
    ) -> LlmResponse {
        let resolved = resolve_model_name(model, self.spec);
        debug!(
            provider = self.spec.display_name,
            model = %resolved,
            messages = messages.len(),
            "calling provider"
        );

        let body = ChatRequest {
            model: resolved,
            messages: messages.to_vec(),
            tools: tools.map(|t| t.to_vec()),
            tool_choice: tools.map(|_| "auto".to_string()),
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
        };

        let response = match self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .headers(self.extra_headers.clone())
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!(provider = self.spec.display_name, error = %e, "request failed");
                return LlmResponse::error(format!("Error calling LLM: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = self.spec.display_name, status = %status, "API error");
            return LlmResponse::error(format!("Error calling LLM: {status} - {body}"));
        }

        match response.json::<ChatResponse>().await {
            Ok(parsed) => parsed.into(),
            Err(e) => LlmResponse::error(format!("Error parsing LLM response: {e}")),
        }
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn display_name(&self) -> &str {
        self.spec.display_name
    }
}

/// Build a provider for a model from the configured provider map.
pub fn create_provider(
    model: &str,
    providers: &std::collections::HashMap<String, ProviderConfig>,
) -> anyhow::Result<HttpProvider> {
    let (config, spec) = match_provider(model, providers).ok_or_else(|| {
        anyhow::anyhow!(
            "no configured provider matches model '{model}'; add an API key to the config"
        )
    })?;
    Ok(HttpProvider::new(config, spec, model))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
