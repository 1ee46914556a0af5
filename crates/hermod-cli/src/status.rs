//! `hermod status`: report configuration and provider readiness.

use anyhow::Result;
use colored::Colorize;

use hermod_core::config::{config_path, load_config};
use hermod_providers::registry::match_provider;

pub fn run() -> Result<()> {
    let path = config_path();
    let config = load_config(None);
    let defaults = &config.agents.defaults;

    println!();
    println!("{}", "Hermod status".cyan().bold());
    println!();
    println!(
        "  config:    {} {}",
        path.display(),
        if path.exists() {
            "".normal()
        } else {
            "(missing, defaults in effect)".yellow()
        }
    );
    println!("  model:     {}", defaults.model);
    println!(
        "  workspace: {}",
        hermod_core::utils::expand_home(&defaults.workspace).display()
    );
    println!(
        "  sandbox:   {}",
        if config.tools.restrict_to_workspace {
            "workspace only".green()
        } else {
            "unrestricted".yellow()
        }
    );

    let providers = config.providers.to_map();
    let configured: Vec<&str> = providers
        .iter()
        .filter(|(_, c)| c.is_configured())
        .map(|(name, _)| name.as_str())
        .collect();
    println!(
        "  providers: {}",
        if configured.is_empty() {
            "none configured".red().to_string()
        } else {
            configured.join(", ")
        }
    );

    match match_provider(&defaults.model, &providers) {
        Some((_, spec)) => println!("  routing:   {} handles '{}'", spec.display_name, defaults.model),
        None => println!(
            "  routing:   {}",
            format!("no configured provider matches '{}'", defaults.model).red()
        ),
    }

    let whatsapp = &config.channels.whatsapp;
    println!(
        "  whatsapp:  {}",
        if whatsapp.enabled {
            format!("enabled ({})", whatsapp.bridge_url).normal()
        } else {
            "disabled".dimmed()
        }
    );
    println!();
    Ok(())
}
