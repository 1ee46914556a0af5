//! Cron service: persistence plus a nearest-deadline async timer.
//!
//! The timer sleeps until the earliest `next_run_at_ms` across enabled
//! jobs, wakes to execute everything due, recomputes, and goes back to
//! sleep. Mutations re-arm the timer through a notify so a freshly added
//! job never waits behind a stale deadline.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use hermod_core::bus::{MessageBus, OutboundMessage};

use crate::types::{next_run_from, CronJob, CronStore, JobStatus, ScheduleKind};

/// Callback that runs one job and returns the agent's response text.
pub type JobCallback = Arc<
    dyn Fn(CronJob) -> Pin<Box<dyn std::future::Future<Output = anyhow::Result<String>> + Send>>
        + Send
        + Sync,
>;

pub struct CronService {
    store_path: PathBuf,
    store: Mutex<CronStore>,
    bus: Arc<MessageBus>,
    on_job: Mutex<Option<JobCallback>>,
    shutdown: Notify,
    rearm: Notify,
}

impl CronService {
    /// Open a service persisting to `store_path` (default:
    /// `~/.hermod/cron/jobs.json`).
    pub fn new(bus: Arc<MessageBus>, store_path: Option<PathBuf>) -> Self {
        let path = store_path
            .unwrap_or_else(|| hermod_core::utils::data_path().join("cron").join("jobs.json"));
        Self {
            store_path: path,
            store: Mutex::new(CronStore::new()),
            bus,
            on_job: Mutex::new(None),
            shutdown: Notify::new(),
            rearm: Notify::new(),
        }
    }

    pub async fn set_on_job(&self, callback: JobCallback) {
        *self.on_job.lock().await = Some(callback);
    }

    // ────────────── persistence ──────────────

    pub async fn load(&self) -> anyhow::Result<()> {
        if !self.store_path.exists() {
            debug!(path = %self.store_path.display(), "no cron store yet");
            return Ok(());
        }
        let data = tokio::fs::read_to_string(&self.store_path).await?;
        let loaded: CronStore = serde_json::from_str(&data)?;
        let mut store = self.store.lock().await;
        info!(jobs = loaded.jobs.len(), "loaded cron store");
        *store = loaded;
        Ok(())
    }

    pub async fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.store_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = {
            let store = self.store.lock().await;
            serde_json::to_string_pretty(&*store)?
        };
        tokio::fs::write(&self.store_path, json).await?;
        Ok(())
    }

    // ────────────── job management ──────────────

    /// Add a job, computing its first fire time. Returns the job id.
    pub async fn add_job(&self, mut job: CronJob) -> anyhow::Result<String> {
        job.state.next_run_at_ms = next_run_from(&job.schedule, Utc::now().timestamp_millis());
        let id = job.id.clone();
        self.store.lock().await.add(job);
        self.save().await?;
        self.rearm.notify_one();
        info!(id = %id, "cron job added");
        Ok(id)
    }

    pub async fn remove_job(&self, id: &str) -> anyhow::Result<bool> {
        let removed = self.store.lock().await.remove(id);
        if removed {
            self.save().await?;
            self.rearm.notify_one();
            info!(id = %id, "cron job removed");
        }
        Ok(removed)
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> anyhow::Result<bool> {
        let found = {
            let mut store = self.store.lock().await;
            match store.find_mut(id) {
                Some(job) => {
                    job.enabled = enabled;
                    let now = Utc::now().timestamp_millis();
                    job.updated_at_ms = now;
                    if enabled {
                        job.state.next_run_at_ms = next_run_from(&job.schedule, now);
                    }
                    true
                }
                None => false,
            }
        };
        if found {
            self.save().await?;
            self.rearm.notify_one();
        }
        Ok(found)
    }

    pub async fn list_jobs(&self) -> Vec<CronJob> {
        self.store.lock().await.jobs.clone()
    }

    pub async fn get_job(&self, id: &str) -> Option<CronJob> {
        self.store.lock().await.find(id).cloned()
    }

    // ────────────── timer loop ──────────────

    /// Load persisted jobs and run the scheduler until `stop()`.
    pub async fn start(&self) -> anyhow::Result<()> {
        if let Err(e) = self.load().await {
            warn!(error = %e, "cron store unreadable, starting empty");
        }
        info!("cron service started");

        loop {
            let wake_at = {
                let store = self.store.lock().await;
                Self::nearest_wake(&store)
            };
            let sleep = match wake_at {
                Some(ms) => {
                    let delay = (ms - Utc::now().timestamp_millis()).max(0) as u64;
                    std::time::Duration::from_millis(delay)
                }
                // Nothing scheduled; sleep long, a rearm wakes us.
                None => std::time::Duration::from_secs(3600),
            };

            tokio::select! {
                _ = tokio::time::sleep(sleep) => self.run_due_jobs().await,
                _ = self.rearm.notified() => {
                    debug!("cron timer re-armed");
                }
                _ = self.shutdown.notified() => {
                    info!("cron service stopped");
                    return Ok(());
                }
            }
        }
    }

    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }

    fn nearest_wake(store: &CronStore) -> Option<i64> {
        store
            .jobs
            .iter()
            .filter(|j| j.enabled)
            .filter_map(|j| j.state.next_run_at_ms)
            .min()
    }

    async fn run_due_jobs(&self) {
        let now = Utc::now().timestamp_millis();
        let due: Vec<String> = {
            let store = self.store.lock().await;
            store.due_jobs(now).iter().map(|j| j.id.clone()).collect()
        };
        for id in due {
            self.execute_job(&id).await;
        }
    }

    /// Run one job: invoke the callback, deliver if asked, update state,
    /// apply one-shot semantics, persist.
    pub async fn execute_job(&self, id: &str) {
        let Some(job) = ({
            let store = self.store.lock().await;
            store.find(id).cloned()
        }) else {
            warn!(id = %id, "cron job vanished before execution");
            return;
        };

        info!(id = %job.id, name = %job.name, "cron job firing");

        let result = {
            let on_job = self.on_job.lock().await;
            match &*on_job {
                Some(callback) => Some(callback(job.clone()).await),
                None => {
                    warn!(id = %id, "no cron callback wired, skipping");
                    None
                }
            }
        };

        let now = Utc::now().timestamp_millis();
        let mut delete_job = false;
        {
            let mut store = self.store.lock().await;
            if let Some(j) = store.find_mut(id) {
                j.state.last_run_at_ms = Some(now);
                match &result {
                    Some(Ok(response)) => {
                        j.state.last_status = Some(JobStatus::Ok);
                        j.state.last_error = None;
                        if j.payload.deliver {
                            if let (Some(channel), Some(to)) =
                                (j.payload.channel.as_ref(), j.payload.to.as_ref())
                            {
                                let msg = OutboundMessage::new(channel, to, response);
                                if let Err(e) = self.bus.publish_outbound(msg) {
                                    error!(error = %e, "cron delivery failed");
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        j.state.last_status = Some(JobStatus::Error);
                        j.state.last_error = Some(e.to_string());
                        error!(id = %id, error = %e, "cron job failed");
                    }
                    None => j.state.last_status = Some(JobStatus::Skipped),
                }

                if j.schedule.kind == ScheduleKind::At {
                    if j.delete_after_run {
                        delete_job = true;
                    } else {
                        j.enabled = false;
                        j.state.next_run_at_ms = None;
                    }
                } else {
                    j.state.next_run_at_ms = next_run_from(&j.schedule, now);
                }
                j.updated_at_ms = now;
            }
            if delete_job {
                store.remove(id);
            }
        }

        if let Err(e) = self.save().await {
            error!(error = %e, "failed to persist cron store after run");
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
