//! Provider registry: static specs and the model → provider matching logic.
//!
//! A model name like `"deepseek-chat"` or `"anthropic/claude-sonnet-4"` is
//! matched against per-provider keywords. When no direct provider matches,
//! a configured gateway (OpenRouter) takes the call instead.

use std::collections::HashMap;

pub use hermod_core::config::schema::ProviderConfig;

/// Static metadata for one provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Key in the providers config map.
    pub name: &'static str,
    /// Lowercase substrings matched against model names.
    pub keywords: &'static [&'static str],
    /// Name for logs.
    pub display_name: &'static str,
    /// Prefix prepended to model names for API routing, if any.
    pub prefix: Option<&'static str>,
    /// Prefixes that indicate the model name is already routed.
    pub skip_prefixes: &'static [&'static str],
    /// Aggregators used as fallback when no direct provider matches.
    pub is_gateway: bool,
    /// Default chat-completions base URL; `None` means the config must
    /// supply one or the OpenAI default applies.
    pub default_api_base: Option<&'static str>,
}

/// Supported providers, in matching priority order.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openrouter",
        keywords: &["openrouter"],
        display_name: "OpenRouter",
        prefix: None,
        skip_prefixes: &[],
        is_gateway: true,
        default_api_base: Some("https://openrouter.ai/api/v1"),
    },
    ProviderSpec {
        name: "anthropic",
        keywords: &["anthropic", "claude"],
        display_name: "Anthropic",
        prefix: None,
        skip_prefixes: &[],
        is_gateway: false,
        default_api_base: Some("https://api.anthropic.com/v1"),
    },
    ProviderSpec {
        name: "openai",
        keywords: &["openai", "gpt"],
        display_name: "OpenAI",
        prefix: None,
        skip_prefixes: &[],
        is_gateway: false,
        default_api_base: None,
    },
    ProviderSpec {
        name: "deepseek",
        keywords: &["deepseek"],
        display_name: "DeepSeek",
        prefix: Some("deepseek"),
        skip_prefixes: &["deepseek/"],
        is_gateway: false,
        default_api_base: Some("https://api.deepseek.com/v1"),
    },
    ProviderSpec {
        name: "gemini",
        keywords: &["gemini"],
        display_name: "Gemini",
        prefix: Some("gemini"),
        skip_prefixes: &["gemini/"],
        is_gateway: false,
        default_api_base: None,
    },
    ProviderSpec {
        name: "zhipu",
        keywords: &["zhipu", "glm"],
        display_name: "ZhiPu",
        prefix: Some("zhipu"),
        skip_prefixes: &["zhipu/", "openrouter/"],
        is_gateway: false,
        default_api_base: None,
    },
    ProviderSpec {
        name: "moonshot",
        keywords: &["moonshot", "kimi"],
        display_name: "Moonshot",
        prefix: Some("moonshot"),
        skip_prefixes: &["moonshot/", "openrouter/"],
        is_gateway: false,
        default_api_base: Some("https://api.moonshot.ai/v1"),
    },
    ProviderSpec {
        name: "groq",
        keywords: &["groq", "llama"],
        display_name: "Groq",
        prefix: Some("groq"),
        skip_prefixes: &["groq/"],
        is_gateway: false,
        default_api_base: Some("https://api.groq.com/openai/v1"),
    },
    ProviderSpec {
        name: "vllm",
        keywords: &["vllm"],
        display_name: "vLLM",
        prefix: None,
        skip_prefixes: &[],
        is_gateway: false,
        default_api_base: None,
    },
];

/// Match a model name to a non-gateway spec by keyword.
pub fn find_by_model(model: &str) -> Option<&'static ProviderSpec> {
    let model = model.to_lowercase();
    PROVIDERS
        .iter()
        .find(|spec| !spec.is_gateway && spec.keywords.iter().any(|kw| model.contains(kw)))
}

pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

/// Pick the provider for a model among the configured ones.
///
/// 1. Keyword match, if that provider has an API key.
/// 2. Otherwise the first configured gateway.
pub fn match_provider<'a>(
    model: &str,
    providers: &'a HashMap<String, ProviderConfig>,
) -> Option<(&'a ProviderConfig, &'static ProviderSpec)> {
    if let Some(spec) = find_by_model(model) {
        if let Some(config) = providers.get(spec.name) {
            if config.is_configured() {
                return Some((config, spec));
            }
        }
    }

    PROVIDERS.iter().filter(|s| s.is_gateway).find_map(|spec| {
        providers
            .get(spec.name)
            .filter(|c| c.is_configured())
            .map(|c| (c, spec))
    })
}

/// Apply the spec's prefix rules to a model name.
pub fn resolve_model_name(model: &str, spec: &ProviderSpec) -> String {
    if let Some(prefix) = spec.prefix {
        let already = spec.skip_prefixes.iter().any(|p| model.starts_with(p));
        if !already {
            return format!("{prefix}/{model}");
        }
    }
    model.to_string()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_matching() {
        assert_eq!(find_by_model("claude-sonnet-4-20250514").unwrap().name, "anthropic");
        assert_eq!(find_by_model("gpt-4o-mini").unwrap().name, "openai");
        assert_eq!(find_by_model("deepseek-chat").unwrap().name, "deepseek");
        assert_eq!(find_by_model("kimi-k2").unwrap().name, "moonshot");
        assert_eq!(find_by_model("glm-4-flash").unwrap().name, "zhipu");
        assert_eq!(find_by_model("groq/llama-3.3-70b").unwrap().name, "groq");
    }

    #[test]
    fn gateways_are_not_direct_matches() {
        // "openrouter/anthropic/…" matches anthropic by keyword; the
        // gateway itself is only a fallback.
        assert_eq!(
            find_by_model("openrouter/anthropic/claude-3").unwrap().name,
            "anthropic"
        );
    }

    #[test]
    fn unknown_model_matches_nothing() {
        assert!(find_by_model("mystery-9000").is_none());
    }

    #[test]
    fn find_by_name_works() {
        assert_eq!(find_by_name("groq").unwrap().display_name, "Groq");
        assert!(find_by_name("nope").is_none());
    }

    #[test]
    fn resolve_adds_prefix_once() {
        let spec = find_by_name("deepseek").unwrap();
        assert_eq!(resolve_model_name("deepseek-chat", spec), "deepseek/deepseek-chat");
        assert_eq!(
            resolve_model_name("deepseek/deepseek-chat", spec),
            "deepseek/deepseek-chat"
        );
    }

    #[test]
    fn resolve_without_prefix_is_identity() {
        let spec = find_by_name("anthropic").unwrap();
        assert_eq!(
            resolve_model_name("claude-sonnet-4-20250514", spec),
            "claude-sonnet-4-20250514"
        );
    }

    fn configured(key: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: key.into(),
            ..Default::default()
        }
    }

    #[test]
    fn match_prefers_direct_provider() {
        let mut providers = HashMap::new();
        providers.insert("anthropic".to_string(), configured("sk-ant"));
        let (config, spec) = match_provider("claude-sonnet-4-20250514", &providers).unwrap();
        assert_eq!(spec.name, "anthropic");
        assert_eq!(config.api_key, "sk-ant");
    }

    #[test]
    fn match_falls_back_to_gateway() {
        let mut providers = HashMap::new();
        providers.insert("openrouter".to_string(), configured("sk-or"));
        let (_, spec) = match_provider("mystery-9000", &providers).unwrap();
        assert_eq!(spec.name, "openrouter");
    }

    #[test]
    fn unconfigured_provider_never_matches() {
        let mut providers = HashMap::new();
        providers.insert("anthropic".to_string(), ProviderConfig::default());
        assert!(match_provider("claude-3", &providers).is_none());
    }

    #[test]
    fn spec_names_are_unique() {
        let mut names: Vec<&str> = PROVIDERS.iter().map(|s| s.name).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
