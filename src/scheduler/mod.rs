//! Delayed-job boundary for round reminders and start triggers.

pub mod delay_queue;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// What a scheduled job does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Notify the round's channel an hour before tee-off.
    Reminder,
    /// Move the round to in-progress at its start time.
    RoundStart,
}

impl JobKind {
    /// Stable label used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Reminder => "reminder",
            JobKind::RoundStart => "round_start",
        }
    }
}

/// A job registered with the scheduler. The payload fields are carried
/// through unchanged and republished when the job fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    /// Guild the round belongs to.
    pub guild_id: String,
    /// Round the job targets.
    pub round_id: Uuid,
    /// Reminder or start trigger.
    pub kind: JobKind,
    /// Wall-clock time the job should fire at.
    #[serde(with = "time::serde::rfc3339")]
    pub fire_at: OffsetDateTime,
    /// Channel hosting the round's announcement.
    pub channel_id: String,
}

/// Errors raised by scheduler implementations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The background worker has stopped accepting commands.
    #[error("scheduler worker is not running")]
    WorkerGone,
}

/// Contract for the delayed-job facility.
///
/// Cancellation is idempotent: cancelling a round with no registered jobs
/// is a no-op, never an error.
pub trait RoundScheduler: Send + Sync {
    /// Drop every pending job for the round.
    fn cancel_round_jobs(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, Result<(), SchedulerError>>;
    /// Register a reminder job.
    fn schedule_reminder(&self, job: ScheduledJob)
    -> BoxFuture<'static, Result<(), SchedulerError>>;
    /// Register a round-start job.
    fn schedule_round_start(
        &self,
        job: ScheduledJob,
    ) -> BoxFuture<'static, Result<(), SchedulerError>>;
}
