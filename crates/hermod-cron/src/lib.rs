//! Scheduled jobs for Hermod: a JSON-file job store plus an async timer
//! service that fires due jobs through an agent callback.

pub mod service;
pub mod types;

pub use service::{CronService, JobCallback};
pub use types::{CronJob, CronSchedule, CronStore, JobPayload, JobState, JobStatus, ScheduleKind};
