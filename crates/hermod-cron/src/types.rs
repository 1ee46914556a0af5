//! Cron data model: schedules, payloads, job state, and the on-disk store.
//!
//! All types serialize with camelCase keys to match the rest of the
//! configuration surface.

use chrono::Utc;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Schedule
// ─────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    /// Fire once at an absolute timestamp.
    At,
    /// Fire every N milliseconds.
    Every,
    /// Fire on a standard 5-field cron expression.
    Cron,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronSchedule {
    pub kind: ScheduleKind,
    /// Absolute fire time, Unix epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_ms: Option<i64>,
    /// Interval in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub every_ms: Option<i64>,
    /// 5-field cron expression, e.g. `"0 9 * * 1-5"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    /// IANA timezone name. Carried for forward compatibility; evaluation
    /// is UTC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
}

impl CronSchedule {
    pub fn at(at_ms: i64) -> Self {
        Self {
            kind: ScheduleKind::At,
            at_ms: Some(at_ms),
            every_ms: None,
            expr: None,
            tz: None,
        }
    }

    pub fn every(every_ms: i64) -> Self {
        Self {
            kind: ScheduleKind::Every,
            at_ms: None,
            every_ms: Some(every_ms),
            expr: None,
            tz: None,
        }
    }

    pub fn cron(expr: impl Into<String>) -> Self {
        Self {
            kind: ScheduleKind::Cron,
            at_ms: None,
            every_ms: None,
            expr: Some(expr.into()),
            tz: None,
        }
    }
}

/// Next fire time for a schedule, from `now_ms`. `None` means the schedule
/// can never fire (e.g. an unparseable cron expression).
pub fn next_run_from(schedule: &CronSchedule, now_ms: i64) -> Option<i64> {
    match schedule.kind {
        ScheduleKind::At => schedule.at_ms,
        ScheduleKind::Every => Some(now_ms + schedule.every_ms.unwrap_or(60_000)),
        ScheduleKind::Cron => {
            let expr = schedule.expr.as_deref()?;
            // The cron crate wants a seconds field; standard 5-field input
            // gets one prepended.
            let with_seconds = format!("0 {expr}");
            let parsed: cron::Schedule = with_seconds.parse().ok()?;
            let next = parsed.upcoming(Utc).next()?;
            Some(next.timestamp_millis())
        }
    }
}

// ─────────────────────────────────────────────
// Payload / state / job
// ─────────────────────────────────────────────

/// What happens when a job fires.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    /// Prompt text injected as an agent turn.
    #[serde(default)]
    pub message: String,
    /// Deliver the agent's response out-of-band to a channel.
    #[serde(default)]
    pub deliver: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Recipient chat id within the channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ok,
    Error,
    Skipped,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    /// Short unique id (uuid v4 prefix).
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub schedule: CronSchedule,
    pub payload: JobPayload,
    #[serde(default)]
    pub state: JobState,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub updated_at_ms: i64,
    /// Remove the job after its first successful fire.
    #[serde(default)]
    pub delete_after_run: bool,
}

fn default_true() -> bool {
    true
}

impl CronJob {
    pub fn new(name: impl Into<String>, schedule: CronSchedule, payload: JobPayload) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
            name: name.into(),
            enabled: true,
            schedule,
            payload,
            state: JobState::default(),
            created_at_ms: now,
            updated_at_ms: now,
            delete_after_run: false,
        }
    }

    /// Enabled and past its scheduled time.
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.enabled && self.state.next_run_at_ms.is_some_and(|next| now_ms >= next)
    }
}

// ─────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────

/// The persisted job collection: `{"version": 1, "jobs": [...]}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronStore {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub jobs: Vec<CronJob>,
}

fn default_version() -> u32 {
    1
}

impl CronStore {
    pub fn new() -> Self {
        Self {
            version: 1,
            jobs: Vec::new(),
        }
    }

    pub fn find(&self, id: &str) -> Option<&CronJob> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut CronJob> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn add(&mut self, job: CronJob) {
        self.jobs.push(job);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.jobs.len();
        self.jobs.retain(|j| j.id != id);
        self.jobs.len() < before
    }

    pub fn due_jobs(&self, now_ms: i64) -> Vec<&CronJob> {
        self.jobs.iter().filter(|j| j.is_due(now_ms)).collect()
    }
}

impl Default for CronStore {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
