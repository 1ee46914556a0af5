//! The `hermod` binary.
//!
//! - `hermod agent [-m MESSAGE] [-s SESSION]`: chat, one-shot or REPL
//! - `hermod gateway`: run everything (channels, agent loop, cron, heartbeat)
//! - `hermod onboard`: write the default config and seed the workspace
//! - `hermod status`: show configuration and provider readiness
//! - `hermod cron …`: manage scheduled jobs

mod cron_cmd;
mod gateway;
mod helpers;
mod onboard;
mod repl;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Hermod, a multi-channel AI assistant.
#[derive(Parser)]
#[command(name = "hermod", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent (single-shot with -m, otherwise a REPL)
    Agent {
        /// Single message; omit for interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session identifier, "channel:id"
        #[arg(short, long, default_value = "cli:default")]
        session: String,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Run the gateway: channels + agent loop + cron + heartbeat
    Gateway {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Initialize configuration and workspace
    Onboard,

    /// Show configuration and provider status
    Status,

    /// Manage scheduled jobs
    Cron {
        #[command(subcommand)]
        action: cron_cmd::CronCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Agent {
            message,
            session,
            logs,
        } => {
            init_logging(logs);
            repl::run(message, &session).await
        }
        Commands::Gateway { logs } => {
            init_logging(logs);
            gateway::run().await
        }
        Commands::Onboard => onboard::run(),
        Commands::Status => status::run(),
        Commands::Cron { action } => {
            init_logging(false);
            cron_cmd::dispatch(action).await
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
