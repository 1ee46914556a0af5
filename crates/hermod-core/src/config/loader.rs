//! Config loading: JSON file, legacy migrations, env var overrides.
//!
//! Precedence, lowest to highest:
//! 1. `Config::default()`
//! 2. `~/.hermod/config.json`
//! 3. `HERMOD_<SECTION>__<FIELD>` environment variables

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::schema::{Config, ProviderConfig};
use crate::utils;

/// Default config file location.
pub fn config_path() -> PathBuf {
    utils::data_path().join("config.json")
}

/// Load configuration. Missing or unparseable files fall back to defaults;
/// env overrides always apply.
pub fn load_config(path: Option<&Path>) -> Config {
    let path = path.map(PathBuf::from).unwrap_or_else(config_path);

    if !path.exists() {
        info!(path = %path.display(), "no config file, using defaults");
        return apply_env_overrides(Config::default());
    }

    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read config");
            return apply_env_overrides(Config::default());
        }
    };

    // Parse to a Value first so migrations can rewrite legacy layouts.
    let mut raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "config is not valid JSON, using defaults");
            return apply_env_overrides(Config::default());
        }
    };

    migrate(&mut raw);

    let config = match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "config did not match schema, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(config)
}

/// Write the config as pretty camelCase JSON.
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let path = path.map(PathBuf::from).unwrap_or_else(config_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;
    std::fs::write(&path, json)
}

/// Legacy layout fixups.
///
/// `tools.exec.restrictToWorkspace` moves up to `tools.restrictToWorkspace`
/// when only the old location is present.
fn migrate(raw: &mut serde_json::Value) {
    let Some(tools) = raw.get_mut("tools") else {
        return;
    };
    if tools.get("restrictToWorkspace").is_some() {
        return;
    }
    let legacy = tools
        .get("exec")
        .and_then(|e| e.get("restrictToWorkspace"))
        .cloned();
    if let Some(value) = legacy {
        tools["restrictToWorkspace"] = value;
        debug!("migrated tools.exec.restrictToWorkspace to tools.restrictToWorkspace");
    }
}

fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(v) = std::env::var("HERMOD_AGENTS__DEFAULTS__MODEL") {
        config.agents.defaults.model = v;
    }
    if let Ok(v) = std::env::var("HERMOD_AGENTS__DEFAULTS__WORKSPACE") {
        config.agents.defaults.workspace = v;
    }
    if let Ok(v) = std::env::var("HERMOD_AGENTS__DEFAULTS__MAX_TOKENS") {
        if let Ok(n) = v.parse() {
            config.agents.defaults.max_tokens = n;
        }
    }
    if let Ok(v) = std::env::var("HERMOD_AGENTS__DEFAULTS__MAX_TOOL_ITERATIONS") {
        if let Ok(n) = v.parse() {
            config.agents.defaults.max_tool_iterations = n;
        }
    }
    if let Ok(v) = std::env::var("HERMOD_TOOLS__RESTRICT_TO_WORKSPACE") {
        config.tools.restrict_to_workspace = v == "true" || v == "1";
    }

    provider_env(&mut config.providers.openrouter, "OPENROUTER");
    provider_env(&mut config.providers.anthropic, "ANTHROPIC");
    provider_env(&mut config.providers.openai, "OPENAI");
    provider_env(&mut config.providers.deepseek, "DEEPSEEK");
    provider_env(&mut config.providers.gemini, "GEMINI");
    provider_env(&mut config.providers.zhipu, "ZHIPU");
    provider_env(&mut config.providers.moonshot, "MOONSHOT");
    provider_env(&mut config.providers.groq, "GROQ");
    provider_env(&mut config.providers.vllm, "VLLM");

    config
}

fn provider_env(provider: &mut ProviderConfig, name: &str) {
    if let Ok(v) = std::env::var(format!("HERMOD_PROVIDERS__{name}__API_KEY")) {
        provider.api_key = v;
    }
    if let Ok(v) = std::env::var(format!("HERMOD_PROVIDERS__{name}__API_BASE")) {
        provider.api_base = Some(v);
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
