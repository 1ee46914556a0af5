//! `hermod cron`: manage scheduled jobs from the CLI.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::Subcommand;
use colored::Colorize;

use hermod_core::bus::MessageBus;
use hermod_cron::{CronJob, CronSchedule, CronService, JobPayload};

#[derive(Subcommand)]
pub enum CronCommands {
    /// List scheduled jobs
    List {
        /// Include disabled jobs
        #[arg(short, long, default_value_t = false)]
        all: bool,
    },

    /// Add a new job
    Add {
        /// Job name
        #[arg(short, long)]
        name: String,

        /// Prompt message for the agent
        #[arg(short, long)]
        message: String,

        /// Run every N seconds
        #[arg(short, long)]
        every: Option<u64>,

        /// 5-field cron expression, e.g. "0 9 * * 1-5"
        #[arg(short, long)]
        cron: Option<String>,

        /// Run once at an ISO 8601 local time, e.g. "2026-08-02T09:00:00"
        #[arg(long)]
        at: Option<String>,

        /// Deliver the reply to a channel
        #[arg(short, long, default_value_t = false)]
        deliver: bool,

        /// Delivery channel name
        #[arg(long)]
        channel: Option<String>,

        /// Delivery chat id
        #[arg(long)]
        to: Option<String>,
    },

    /// Remove a job by id
    Remove { job_id: String },

    /// Enable or disable a job
    Enable {
        job_id: String,
        /// Disable instead of enable
        #[arg(long, default_value_t = false)]
        disable: bool,
    },

    /// Run a job immediately
    Run { job_id: String },
}

pub async fn dispatch(cmd: CronCommands) -> Result<()> {
    let service = open_service();
    service.load().await.context("failed to load cron store")?;

    match cmd {
        CronCommands::List { all } => {
            let jobs = service.list_jobs().await;
            let shown: Vec<&CronJob> = jobs.iter().filter(|j| all || j.enabled).collect();
            if shown.is_empty() {
                println!("No scheduled jobs.");
                return Ok(());
            }
            for job in shown {
                let state = if job.enabled {
                    "enabled".green()
                } else {
                    "disabled".dimmed()
                };
                println!(
                    "{}  {}  {}  next: {}  [{}]",
                    job.id.bold(),
                    job.name,
                    describe(job),
                    job.state
                        .next_run_at_ms
                        .map(fmt_time)
                        .unwrap_or_else(|| "-".into()),
                    state
                );
            }
            Ok(())
        }

        CronCommands::Add {
            name,
            message,
            every,
            cron,
            at,
            deliver,
            channel,
            to,
        } => {
            let schedule = if let Some(secs) = every {
                CronSchedule::every(secs as i64 * 1000)
            } else if let Some(expr) = cron {
                CronSchedule::cron(expr)
            } else if let Some(when) = at {
                let at_ms = parse_local_time(&when)?;
                CronSchedule::at(at_ms)
            } else {
                anyhow::bail!("one of --every, --cron, or --at is required");
            };

            let job = CronJob::new(
                &name,
                schedule,
                JobPayload {
                    message,
                    deliver,
                    channel,
                    to,
                },
            );
            let id = service.add_job(job).await?;
            println!("{} job '{}' (id: {})", "Added".green(), name, id);
            Ok(())
        }

        CronCommands::Remove { job_id } => {
            if service.remove_job(&job_id).await? {
                println!("{} {}", "Removed".green(), job_id);
            } else {
                println!("No job with id {job_id}");
            }
            Ok(())
        }

        CronCommands::Enable { job_id, disable } => {
            let enable = !disable;
            if service.set_enabled(&job_id, enable).await? {
                println!("{} {}", job_id, if enable { "enabled" } else { "disabled" });
            } else {
                println!("No job with id {job_id}");
            }
            Ok(())
        }

        CronCommands::Run { job_id } => {
            if service.get_job(&job_id).await.is_none() {
                println!("No job with id {job_id}");
                return Ok(());
            }
            // Without the gateway's callback this only exercises state
            // bookkeeping; the run is marked skipped.
            service.execute_job(&job_id).await;
            let job = service.get_job(&job_id).await;
            match job.and_then(|j| j.state.last_status) {
                Some(status) => println!("Job {job_id} ran (status: {status:?})"),
                None => println!("Job {job_id} did not record a run"),
            }
            Ok(())
        }
    }
}

fn open_service() -> CronService {
    // CLI management needs no live bus; delivery only happens in the
    // gateway.
    let store = hermod_core::utils::data_path().join("cron").join("jobs.json");
    CronService::new(Arc::new(MessageBus::new()), Some(store))
}

fn describe(job: &CronJob) -> String {
    if let Some(ms) = job.schedule.every_ms {
        format!("every {}", fmt_duration(ms))
    } else if let Some(expr) = &job.schedule.expr {
        format!("cron '{expr}'")
    } else if let Some(at) = job.schedule.at_ms {
        format!("once at {}", fmt_time(at))
    } else {
        "unscheduled".into()
    }
}

fn fmt_duration(ms: i64) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}

fn fmt_time(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        _ => "-".into(),
    }
}

fn parse_local_time(input: &str) -> Result<i64> {
    let naive = chrono::NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S")
        .with_context(|| format!("cannot parse '{input}' as YYYY-MM-DDTHH:MM:SS"))?;
    let local = Local
        .from_local_datetime(&naive)
        .single()
        .context("ambiguous local time")?;
    Ok(local.timestamp_millis())
}
