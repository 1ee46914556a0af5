//! `hermod onboard`: write the default config and seed the workspace.

use anyhow::{Context, Result};
use colored::Colorize;

use hermod_core::config::{config_path, save_config, Config};

pub fn run() -> Result<()> {
    let path = config_path();

    if path.exists() {
        println!("Config already exists at {}", path.display());
    } else {
        save_config(&Config::default(), Some(&path))
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("{} {}", "Wrote".green(), path.display());
    }

    let config = Config::default();
    let workspace = hermod_core::utils::expand_home(&config.agents.defaults.workspace);
    std::fs::create_dir_all(workspace.join("memory"))
        .with_context(|| format!("failed to create {}", workspace.display()))?;
    std::fs::create_dir_all(workspace.join("skills"))?;

    // Seed files only where nothing exists yet.
    let seeds: &[(&str, &str)] = &[
        (
            "AGENTS.md",
            "# Agent Guidelines\n\nBe helpful, accurate, and concise.\n",
        ),
        (
            "HEARTBEAT.md",
            "# Heartbeat Tasks\n\n<!-- Add tasks below; an empty file skips the tick. -->\n",
        ),
    ];
    for (name, content) in seeds {
        let file = workspace.join(name);
        if !file.exists() {
            std::fs::write(&file, content)?;
            println!("{} {}", "Seeded".green(), file.display());
        }
    }

    println!();
    println!("Next steps:");
    println!("  1. Add a provider API key to {}", path.display());
    println!("  2. Chat: {}", "hermod agent".bold());
    println!("  3. Full runtime: {}", "hermod gateway".bold());
    Ok(())
}
