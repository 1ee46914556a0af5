//! `hermod gateway`: run the whole runtime in one process.
//!
//! Wiring order: bus, cron service, agent loop (with the cron tool), cron
//! and heartbeat callbacks into the loop's direct entry, channels
//! subscribed on the bus, then everything under one `select!` with Ctrl-C
//! for shutdown.

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use tracing::{error, info, warn};

use hermod_channels::ChannelManager;
use hermod_core::bus::{MessageBus, OutboundMessage};
use hermod_core::config::load_config;
use hermod_core::heartbeat::{HeartbeatFn, HeartbeatService};
use hermod_cron::{CronJob, CronService};

use crate::helpers;

pub async fn run() -> Result<()> {
    let config = load_config(None);
    let defaults = config.agents.defaults.clone();
    let workspace = hermod_core::utils::expand_home(&defaults.workspace);

    let bus = Arc::new(MessageBus::new());
    let cron = Arc::new(CronService::new(bus.clone(), None));
    let agent = Arc::new(helpers::build_agent(&config, bus.clone(), Some(cron.clone()))?);

    // Cron fires agent turns; deliverable jobs also push their reply to a
    // channel out-of-band.
    {
        let agent = agent.clone();
        let bus = bus.clone();
        cron.set_on_job(Arc::new(move |job: CronJob| {
            let agent = agent.clone();
            let bus = bus.clone();
            Box::pin(async move {
                let response = agent
                    .process_direct(&job.payload.message, "cli", "cron")
                    .await
                    .unwrap_or_else(|e| format!("Error: {e}"));

                if job.payload.deliver {
                    if let Some(to) = &job.payload.to {
                        let channel = job.payload.channel.as_deref().unwrap_or("cli");
                        if let Err(e) =
                            bus.publish_outbound(OutboundMessage::new(channel, to, &response))
                        {
                            error!(error = %e, "cron delivery failed");
                        }
                    }
                }
                Ok(response)
            })
        }))
        .await;
    }
    if let Err(e) = cron.load().await {
        warn!(error = %e, "could not preload cron store");
    }

    let heartbeat = {
        let agent = agent.clone();
        let callback: HeartbeatFn = Arc::new(move |prompt| {
            let agent = agent.clone();
            Box::pin(async move { agent.process_direct(&prompt, "cli", "heartbeat").await })
        });
        Arc::new(HeartbeatService::new(
            workspace.clone(),
            Some(callback),
            Some(config.heartbeat.interval),
            config.heartbeat.enabled,
        ))
    };

    #[allow(unused_mut)]
    let mut channels = ChannelManager::new(bus.clone());

    #[cfg(feature = "whatsapp")]
    {
        let wa = &config.channels.whatsapp;
        if wa.enabled {
            use hermod_channels::whatsapp::WhatsAppChannel;
            channels.register(Arc::new(WhatsAppChannel::new(
                wa.bridge_url.clone(),
                bus.clone(),
                wa.allow_from.clone(),
            )));
            info!("whatsapp channel registered");
        }
    }

    println!();
    println!("{}  gateway", "Hermod".cyan().bold());
    println!("  model:     {}", defaults.model);
    println!("  workspace: {}", workspace.display());
    println!("  channels:  {}", channels.len());
    let jobs = cron.list_jobs().await;
    if !jobs.is_empty() {
        let enabled = jobs.iter().filter(|j| j.enabled).count();
        println!("  cron:      {} jobs ({enabled} enabled)", jobs.len());
    }
    if channels.is_empty() {
        println!();
        println!("  {}", "no channels enabled; only the internal bus is served".dimmed());
    }
    println!();
    println!("  Ctrl+C to stop");
    println!();

    info!(model = %defaults.model, workspace = %workspace.display(), "gateway starting");

    tokio::select! {
        _ = agent.run() => info!("agent loop exited"),
        result = channels.start_all() => {
            if let Err(e) = result {
                error!(error = %e, "channel manager failed");
            }
        }
        result = cron.start() => {
            if let Err(e) = result {
                error!(error = %e, "cron service failed");
            }
        }
        result = heartbeat.start() => {
            if let Err(e) = result {
                error!(error = %e, "heartbeat failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("  shutting down...");
            agent.stop();
            heartbeat.stop();
            cron.stop();
            channels.stop_all().await;
        }
    }

    println!("  gateway stopped");
    Ok(())
}
