//! Planning and registration of reminder/start jobs for a round.

use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{
    scheduler::{JobKind, ScheduledJob},
    state::{SharedState, round::Round},
};

/// Reminders closer to now than this are pointless and get skipped.
const REMINDER_MIN_LEAD: Duration = Duration::from_secs(5);
/// Start triggers due within this window (or already past) get skipped;
/// they would fire immediately, racing the operation that scheduled them.
const START_MIN_LEAD: Duration = Duration::from_secs(30);

/// Compute the jobs a round needs, given the current wall clock.
///
/// Pure so the skip rules can be tested without a running scheduler.
pub fn plan_round_jobs(round: &Round, reminder_lead: Duration, now: OffsetDateTime) -> Vec<ScheduledJob> {
    let mut jobs = Vec::with_capacity(2);

    let reminder_at = round.start_time - reminder_lead;
    if reminder_at >= now + REMINDER_MIN_LEAD {
        jobs.push(ScheduledJob {
            guild_id: round.guild_id.clone(),
            round_id: round.id,
            kind: JobKind::Reminder,
            fire_at: reminder_at,
            channel_id: round.channel_id.clone(),
        });
    } else {
        debug!(round_id = %round.id, "start too close; skipping reminder job");
    }

    if round.start_time > now + START_MIN_LEAD {
        jobs.push(ScheduledJob {
            guild_id: round.guild_id.clone(),
            round_id: round.id,
            kind: JobKind::RoundStart,
            fire_at: round.start_time,
            channel_id: round.channel_id.clone(),
        });
    } else {
        debug!(round_id = %round.id, "start time too close or past; skipping start job");
    }

    jobs
}

/// Cancel any pending jobs for the round and register fresh ones.
///
/// Timers are best-effort: a scheduler failure is logged, never bubbled, so
/// a round create/update cannot fail on it.
pub async fn schedule_round_jobs(state: &SharedState, round: &Round) {
    let scheduler = state.scheduler();

    if let Err(err) = scheduler.cancel_round_jobs(&round.guild_id, round.id).await {
        warn!(round_id = %round.id, error = %err, "failed to cancel pending round jobs");
    }

    for job in plan_round_jobs(round, state.config().reminder_lead, OffsetDateTime::now_utc()) {
        let result = match job.kind {
            JobKind::Reminder => scheduler.schedule_reminder(job).await,
            JobKind::RoundStart => scheduler.schedule_round_start(job).await,
        };
        if let Err(err) = result {
            warn!(round_id = %round.id, error = %err, "failed to schedule round job");
        }
    }
}

/// Drop every pending job for the round.
pub async fn cancel_round_jobs(state: &SharedState, guild_id: &str, round_id: uuid::Uuid) {
    if let Err(err) = state.scheduler().cancel_round_jobs(guild_id, round_id).await {
        warn!(%round_id, error = %err, "failed to cancel round jobs");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::state::{lifecycle::RoundState, round::Round};

    fn round_starting_in(offset: time::Duration) -> Round {
        let now = OffsetDateTime::now_utc();
        Round {
            id: Uuid::new_v4(),
            guild_id: "guild-1".into(),
            title: "Tuesday league".into(),
            description: None,
            location: "Maple Hill".into(),
            event_type: None,
            start_time: now + offset,
            state: RoundState::Upcoming,
            created_by: "user-1".into(),
            channel_id: "chan-1".into(),
            event_message_id: None,
            participants: Vec::new(),
            teams: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn far_future_round_gets_both_jobs() {
        let round = round_starting_in(time::Duration::hours(3));
        let jobs = plan_round_jobs(&round, Duration::from_secs(3600), OffsetDateTime::now_utc());
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].kind, JobKind::Reminder);
        assert_eq!(jobs[0].fire_at, round.start_time - Duration::from_secs(3600));
        assert_eq!(jobs[1].kind, JobKind::RoundStart);
        assert_eq!(jobs[1].fire_at, round.start_time);
    }

    #[test]
    fn imminent_round_skips_the_reminder() {
        let round = round_starting_in(time::Duration::minutes(10));
        let jobs = plan_round_jobs(&round, Duration::from_secs(3600), OffsetDateTime::now_utc());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, JobKind::RoundStart);
    }

    #[test]
    fn long_past_start_plans_nothing() {
        let round = round_starting_in(-time::Duration::hours(2));
        let jobs = plan_round_jobs(&round, Duration::from_secs(3600), OffsetDateTime::now_utc());
        assert!(jobs.is_empty());
    }

    #[test]
    fn start_within_the_lead_window_is_not_scheduled() {
        let round = round_starting_in(time::Duration::seconds(10));
        let jobs = plan_round_jobs(&round, Duration::from_secs(3600), OffsetDateTime::now_utc());
        assert!(jobs.is_empty());
    }

    #[test]
    fn just_missed_start_is_not_scheduled() {
        let round = round_starting_in(-time::Duration::seconds(10));
        let jobs = plan_round_jobs(&round, Duration::from_secs(3600), OffsetDateTime::now_utc());
        assert!(jobs.is_empty());
    }
}
