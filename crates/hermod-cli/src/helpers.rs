//! Shared CLI helpers: banner, response printing, agent construction.

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use hermod_agent::{AgentLoop, AgentSettings};
use hermod_core::bus::MessageBus;
use hermod_core::config::Config;
use hermod_core::session::SessionStore;
use hermod_cron::CronService;
use hermod_providers::create_provider;

pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "Hermod".cyan().bold(), version.dimmed());
    println!("{}", "Type a message, or \"exit\" to quit.".dimmed());
    println!();
}

pub fn print_response(response: &str) {
    println!();
    println!("{}", "Hermod".cyan().bold());
    if response.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{response}");
    }
    println!();
}

/// Build the agent loop from config. `cron` is wired in when provided so
/// the model gets the cron tool.
pub fn build_agent(
    config: &Config,
    bus: Arc<MessageBus>,
    cron: Option<Arc<CronService>>,
) -> Result<AgentLoop> {
    let defaults = &config.agents.defaults;
    let workspace = hermod_core::utils::expand_home(&defaults.workspace);
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.display()))?;

    let provider = create_provider(&defaults.model, &config.providers.to_map())?;
    let sessions = Arc::new(SessionStore::new(None).context("failed to open session store")?);

    let search_api_key = (!config.tools.web.search.api_key.is_empty())
        .then(|| config.tools.web.search.api_key.clone());

    Ok(AgentLoop::new(
        bus,
        Arc::new(provider),
        workspace,
        sessions,
        cron,
        AgentSettings {
            model: Some(defaults.model.clone()),
            max_iterations: Some(defaults.max_tool_iterations as usize),
            request_config: Some(hermod_providers::RequestConfig {
                max_tokens: defaults.max_tokens,
                temperature: defaults.temperature,
            }),
            search_api_key,
            exec_timeout: Some(config.tools.exec.timeout),
            exec_deny_patterns: config.tools.exec.deny_patterns.clone(),
            restrict_to_workspace: config.tools.restrict_to_workspace,
            ..Default::default()
        },
    ))
}

/// Split a `"channel:chat_id"` session argument; bare values become a cli
/// chat id.
pub fn split_session(session: &str) -> (String, String) {
    match session.split_once(':') {
        Some((channel, chat_id)) => (channel.to_string(), chat_id.to_string()),
        None => ("cli".to_string(), session.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_session_with_colon() {
        assert_eq!(
            split_session("telegram:42"),
            ("telegram".into(), "42".into())
        );
    }

    #[test]
    fn split_session_bare_value() {
        assert_eq!(split_session("default"), ("cli".into(), "default".into()));
    }

    #[test]
    fn split_session_keeps_rest_after_first_colon() {
        assert_eq!(
            split_session("whatsapp:49:151"),
            ("whatsapp".into(), "49:151".into())
        );
    }
}
