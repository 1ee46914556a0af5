//! The `cron` tool: lets the model manage scheduled jobs.
//!
//! Registered only when the scheduler service is wired into the loop.
//! New jobs default to delivering their output to the conversation the
//! tool was invoked from.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use hermod_cron::{CronJob, CronSchedule, CronService, JobPayload};

use super::base::{optional_bool, optional_i64, optional_string, require_string, Tool};

pub struct CronTool {
    service: Arc<CronService>,
    context: Mutex<(String, String)>,
}

impl CronTool {
    pub fn new(service: Arc<CronService>) -> Self {
        Self {
            service,
            context: Mutex::new(("cli".into(), "direct".into())),
        }
    }

    async fn add(&self, params: &HashMap<String, Value>) -> anyhow::Result<String> {
        let message = require_string(params, "message")?;
        let name = optional_string(params, "name").unwrap_or_else(|| {
            hermod_core::utils::truncate(&message, 40)
        });

        let schedule = if let Some(secs) = optional_i64(params, "every_seconds") {
            CronSchedule::every(secs.max(1) * 1000)
        } else if let Some(expr) = optional_string(params, "cron") {
            CronSchedule::cron(expr)
        } else if let Some(at_ms) = optional_i64(params, "at_ms") {
            CronSchedule::at(at_ms)
        } else {
            anyhow::bail!("one of every_seconds, cron, or at_ms is required for add");
        };

        let (channel, chat_id) = self.context.lock().await.clone();
        let deliver = optional_bool(params, "deliver").unwrap_or(true);
        let mut job = CronJob::new(
            name.clone(),
            schedule,
            JobPayload {
                message,
                deliver,
                channel: deliver.then_some(channel),
                to: deliver.then_some(chat_id),
            },
        );
        job.delete_after_run = optional_bool(params, "delete_after_run").unwrap_or(false);

        let id = self.service.add_job(job).await?;
        Ok(format!("Scheduled job '{name}' (id: {id})"))
    }

    async fn list(&self) -> String {
        let jobs = self.service.list_jobs().await;
        if jobs.is_empty() {
            return "No scheduled jobs.".into();
        }
        jobs.iter()
            .map(|j| {
                let state = if j.enabled { "enabled" } else { "disabled" };
                format!("{} [{}] {} ({state})", j.id, j.name, describe_schedule(j))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn describe_schedule(job: &CronJob) -> String {
    if let Some(ms) = job.schedule.every_ms {
        format!("every {}s", ms / 1000)
    } else if let Some(expr) = &job.schedule.expr {
        format!("cron '{expr}'")
    } else if let Some(at) = job.schedule.at_ms {
        format!("once at {at}")
    } else {
        "unscheduled".into()
    }
}

#[async_trait]
impl Tool for CronTool {
    fn name(&self) -> &str {
        "cron"
    }

    fn description(&self) -> &str {
        "Manage scheduled jobs: add a reminder or recurring task, list jobs, \
         remove, enable, or disable one. New jobs deliver their output to \
         this conversation."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["add", "list", "remove", "enable", "disable"],
                    "description": "What to do"
                },
                "message": {"type": "string", "description": "Prompt to run when the job fires (add)"},
                "name": {"type": "string", "description": "Job name (add)"},
                "every_seconds": {"type": "integer", "minimum": 1, "description": "Interval in seconds (add)"},
                "cron": {"type": "string", "description": "5-field cron expression (add)"},
                "at_ms": {"type": "integer", "description": "One-shot fire time, epoch ms (add)"},
                "deliver": {"type": "boolean", "description": "Deliver output to this chat (default true)"},
                "delete_after_run": {"type": "boolean", "description": "Remove a one-shot job after it fires"},
                "id": {"type": "string", "description": "Job id (remove/enable/disable)"}
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let action = require_string(&params, "action")?;
        match action.as_str() {
            "add" => self.add(&params).await,
            "list" => Ok(self.list().await),
            "remove" => {
                let id = require_string(&params, "id")?;
                if self.service.remove_job(&id).await? {
                    Ok(format!("Removed job {id}"))
                } else {
                    Ok(format!("No job with id {id}"))
                }
            }
            "enable" | "disable" => {
                let id = require_string(&params, "id")?;
                let enable = action == "enable";
                if self.service.set_enabled(&id, enable).await? {
                    Ok(format!("Job {id} {action}d"))
                } else {
                    Ok(format!("No job with id {id}"))
                }
            }
            other => anyhow::bail!("Unknown action: {other}"),
        }
    }

    async fn set_context(&self, channel: &str, chat_id: &str) {
        *self.context.lock().await = (channel.to_string(), chat_id.to_string());
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
