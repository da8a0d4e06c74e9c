//! Round creation, editing, deletion and the timer-driven transitions.

use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
    macros::format_description,
};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        events::{RoundEvent, RoundSummary},
        format_timestamp,
        requests::{CreateRoundRequest, DeleteRoundRequest, SetEventMessageRequest, UpdateRoundRequest},
    },
    error::ServiceError,
    scheduler::ScheduledJob,
    services::{round_events, scheduling, tag_resolution},
    state::{SharedState, lifecycle::RoundState, round::Round},
};

/// Load a round or fail with `NotFound`. Soft-deleted rounds are invisible
/// to the storage layer, so they surface here as missing too.
pub(crate) async fn load_round(
    state: &SharedState,
    guild_id: &str,
    round_id: Uuid,
) -> Result<Round, ServiceError> {
    let store = state.require_round_store().await?;
    let entity = store
        .get_round(guild_id, round_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("round `{round_id}` not found")))?;
    Ok(entity.into())
}

/// Create a round in the `Upcoming` state and register its timer jobs.
pub async fn create_round(
    state: &SharedState,
    request: CreateRoundRequest,
) -> Result<RoundSummary, ServiceError> {
    request.validate()?;

    if request.title.trim().is_empty() {
        return Err(ServiceError::InvalidInput("Title is required".into()));
    }
    if request.location.trim().is_empty() {
        return Err(ServiceError::InvalidInput("Location is required".into()));
    }
    if request.created_by.trim().is_empty() {
        return Err(ServiceError::InvalidInput("Creator is required".into()));
    }

    let start_time = parse_start_time(&request.start_time)?;
    let now = OffsetDateTime::now_utc();
    if start_time <= now {
        return Err(ServiceError::InvalidInput(
            "Start time must be in the future".into(),
        ));
    }

    let round = Round {
        id: Uuid::new_v4(),
        guild_id: request.guild_id,
        title: request.title,
        description: request.description,
        location: request.location,
        event_type: request.event_type,
        start_time,
        state: RoundState::Upcoming,
        created_by: request.created_by,
        channel_id: request.channel_id,
        event_message_id: None,
        participants: Vec::new(),
        teams: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    let store = state.require_round_store().await?;
    store.create_round(round.clone().into()).await?;
    info!(round_id = %round.id, guild_id = %round.guild_id, "round created");

    scheduling::schedule_round_jobs(state, &round).await;

    let summary = RoundSummary::from(&round);
    round_events::publish(state, &RoundEvent::Created(summary.clone()));
    Ok(summary)
}

/// Patch a round's descriptive fields. Only upcoming rounds can be edited.
pub async fn update_round(
    state: &SharedState,
    request: UpdateRoundRequest,
) -> Result<RoundSummary, ServiceError> {
    request.validate()?;

    let mut round = load_round(state, &request.guild_id, request.round_id).await?;
    if round.state != RoundState::Upcoming {
        return Err(ServiceError::InvalidState(
            "Cannot edit a round that has already started".into(),
        ));
    }

    if let Some(title) = request.title {
        if title.trim().is_empty() {
            return Err(ServiceError::InvalidInput("Title is required".into()));
        }
        round.title = title;
    }
    if let Some(description) = request.description {
        round.description = Some(description);
    }
    if let Some(location) = request.location {
        if location.trim().is_empty() {
            return Err(ServiceError::InvalidInput("Location is required".into()));
        }
        round.location = location;
    }
    if let Some(event_type) = request.event_type {
        round.event_type = Some(event_type);
    }

    let mut start_changed = false;
    if let Some(raw) = request.start_time {
        let start_time = parse_start_time(&raw)?;
        if start_time <= OffsetDateTime::now_utc() {
            return Err(ServiceError::InvalidInput(
                "Start time must be in the future".into(),
            ));
        }
        start_changed = start_time != round.start_time;
        round.start_time = start_time;
    }
    round.updated_at = OffsetDateTime::now_utc();

    let store = state.require_round_store().await?;
    store.update_round(round.clone().into()).await?;

    if start_changed {
        scheduling::schedule_round_jobs(state, &round).await;
    }

    let summary = RoundSummary::from(&round);
    round_events::publish(state, &RoundEvent::Updated(summary.clone()));
    Ok(summary)
}

/// Soft-delete a round. Allowed for the creator, or for users holding one
/// of the configured privileged roles.
pub async fn delete_round(
    state: &SharedState,
    request: DeleteRoundRequest,
) -> Result<(), ServiceError> {
    request.validate()?;

    let round = load_round(state, &request.guild_id, request.round_id).await?;

    if round.created_by != request.requested_by {
        let authorized = tag_resolution::check_role(
            state,
            &request.guild_id,
            &request.requested_by,
            &state.config().delete_roles,
        )
        .await?;
        if !authorized {
            return Err(ServiceError::Unauthorized(
                "Only the round creator or an admin can delete this round".into(),
            ));
        }
    }

    round.state.validate_transition(RoundState::Deleted)?;

    let store = state.require_round_store().await?;
    store.delete_round(&request.guild_id, request.round_id).await?;
    info!(round_id = %request.round_id, guild_id = %request.guild_id, "round deleted");

    scheduling::cancel_round_jobs(state, &request.guild_id, request.round_id).await;

    round_events::publish(
        state,
        &RoundEvent::Deleted {
            guild_id: request.guild_id,
            round_id: request.round_id,
        },
    );
    Ok(())
}

/// Move a round to in-progress when its start timer fires.
///
/// Idempotent: a timer firing against a round that already started, was
/// finalized early by an import, or disappeared is quietly ignored.
pub async fn start_round(state: &SharedState, job: &ScheduledJob) -> Result<(), ServiceError> {
    let mut round = match load_round(state, &job.guild_id, job.round_id).await {
        Ok(round) => round,
        Err(ServiceError::NotFound(_)) => {
            debug!(round_id = %job.round_id, "start timer fired for a missing round");
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    if round.state != RoundState::Upcoming {
        debug!(round_id = %round.id, state = %round.state, "start timer fired for a round past upcoming");
        return Ok(());
    }
    round.state.validate_transition(RoundState::InProgress)?;

    let store = state.require_round_store().await?;
    store
        .update_round_state(&job.guild_id, job.round_id, RoundState::InProgress)
        .await?;
    info!(round_id = %round.id, guild_id = %round.guild_id, "round started");

    round.state = RoundState::InProgress;
    round_events::publish(state, &RoundEvent::Started(RoundSummary::from(&round)));
    Ok(())
}

/// Emit a reminder notification when the reminder timer fires.
pub async fn handle_reminder(state: &SharedState, job: &ScheduledJob) -> Result<(), ServiceError> {
    let round = match load_round(state, &job.guild_id, job.round_id).await {
        Ok(round) => round,
        Err(ServiceError::NotFound(_)) => {
            debug!(round_id = %job.round_id, "reminder fired for a missing round");
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    if round.state != RoundState::Upcoming {
        debug!(round_id = %round.id, state = %round.state, "reminder fired for a round past upcoming");
        return Ok(());
    }

    round_events::publish(
        state,
        &RoundEvent::ReminderDue {
            guild_id: round.guild_id.clone(),
            round_id: round.id,
            channel_id: round.channel_id.clone(),
            title: round.title.clone(),
            start_time: format_timestamp(round.start_time),
        },
    );
    Ok(())
}

/// Record the Discord message that renders a round.
pub async fn set_event_message(
    state: &SharedState,
    request: SetEventMessageRequest,
) -> Result<(), ServiceError> {
    request.validate()?;

    let store = state.require_round_store().await?;
    store
        .update_event_message_id(&request.guild_id, request.round_id, request.event_message_id)
        .await?;
    Ok(())
}

/// Parse a start time: RFC 3339, or `YYYY-MM-DD HH:MM` read as UTC.
pub(crate) fn parse_start_time(value: &str) -> Result<OffsetDateTime, ServiceError> {
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(parsed);
    }

    let short = format_description!("[year]-[month]-[day] [hour]:[minute]");
    if let Ok(parsed) = PrimitiveDateTime::parse(value, short) {
        return Ok(parsed.assume_utc());
    }

    Err(ServiceError::InvalidInput(format!(
        "Unrecognized start time `{value}`; use RFC 3339 or `YYYY-MM-DD HH:MM` (UTC)"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::{
        bus::in_process::InProcessBus,
        config::AppConfig,
        dao::memory::{MemoryRoundStore, MemoryUserDirectory},
        scheduler::{delay_queue::DelayQueueScheduler, JobKind},
        state::AppState,
    };

    async fn ready_state() -> SharedState {
        let bus: Arc<InProcessBus> = Arc::new(InProcessBus::new(32));
        let scheduler = DelayQueueScheduler::spawn(bus.clone());
        let state = AppState::new(AppConfig::default(), bus, scheduler);
        state
            .install_storage(
                Arc::new(MemoryRoundStore::new()),
                Arc::new(MemoryUserDirectory::new()),
            )
            .await;
        state
    }

    fn create_request(start_time: &str) -> CreateRoundRequest {
        CreateRoundRequest {
            guild_id: "100".into(),
            channel_id: "200".into(),
            title: "Tuesday league".into(),
            description: None,
            location: "Maple Hill".into(),
            event_type: None,
            start_time: start_time.into(),
            created_by: "300".into(),
        }
    }

    fn future_rfc3339() -> String {
        format_timestamp(OffsetDateTime::now_utc() + time::Duration::hours(4))
    }

    #[test]
    fn parses_both_start_time_formats() {
        assert!(parse_start_time("2026-09-01T18:00:00Z").is_ok());
        let short = parse_start_time("2026-09-01 18:00").unwrap();
        assert_eq!(short.offset(), time::UtcOffset::UTC);
        assert!(parse_start_time("next tuesday").is_err());
    }

    #[tokio::test]
    async fn create_round_persists_and_summarizes() {
        let state = ready_state().await;
        let summary = create_round(&state, create_request(&future_rfc3339()))
            .await
            .unwrap();
        assert_eq!(summary.state, "upcoming");

        let stored = load_round(&state, "100", summary.round_id).await.unwrap();
        assert_eq!(stored.title, "Tuesday league");
        assert!(stored.participants.is_empty());
    }

    #[tokio::test]
    async fn create_round_rejects_past_start_times() {
        let state = ready_state().await;
        let err = create_round(&state, create_request("2020-01-01T12:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(message) if message.contains("future")));
    }

    #[tokio::test]
    async fn create_round_requires_a_title() {
        let state = ready_state().await;
        let mut request = create_request(&future_rfc3339());
        request.title = "   ".into();
        let err = create_round(&state, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(message) if message == "Title is required"));
    }

    #[tokio::test]
    async fn update_is_rejected_after_the_round_starts() {
        let state = ready_state().await;
        let summary = create_round(&state, create_request(&future_rfc3339()))
            .await
            .unwrap();

        let job = ScheduledJob {
            guild_id: "100".into(),
            round_id: summary.round_id,
            kind: JobKind::RoundStart,
            fire_at: OffsetDateTime::now_utc(),
            channel_id: "200".into(),
        };
        start_round(&state, &job).await.unwrap();

        let err = update_round(
            &state,
            UpdateRoundRequest {
                guild_id: "100".into(),
                round_id: summary.round_id,
                title: Some("New title".into()),
                description: None,
                location: None,
                event_type: None,
                start_time: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn start_timer_is_idempotent() {
        let state = ready_state().await;
        let summary = create_round(&state, create_request(&future_rfc3339()))
            .await
            .unwrap();

        let job = ScheduledJob {
            guild_id: "100".into(),
            round_id: summary.round_id,
            kind: JobKind::RoundStart,
            fire_at: OffsetDateTime::now_utc(),
            channel_id: "200".into(),
        };
        start_round(&state, &job).await.unwrap();
        // Second fire is a no-op, not an error.
        start_round(&state, &job).await.unwrap();

        let round = load_round(&state, "100", summary.round_id).await.unwrap();
        assert_eq!(round.state, RoundState::InProgress);
    }

    #[tokio::test]
    async fn creator_can_delete_their_round() {
        let state = ready_state().await;
        let summary = create_round(&state, create_request(&future_rfc3339()))
            .await
            .unwrap();

        delete_round(
            &state,
            DeleteRoundRequest {
                guild_id: "100".into(),
                round_id: summary.round_id,
                requested_by: "300".into(),
            },
        )
        .await
        .unwrap();

        let err = load_round(&state, "100", summary.round_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn non_creator_without_role_cannot_delete() {
        let state = ready_state().await;
        let summary = create_round(&state, create_request(&future_rfc3339()))
            .await
            .unwrap();

        // Nobody answers the role check; authorization fails closed.
        let err = delete_round(
            &state,
            DeleteRoundRequest {
                guild_id: "100".into(),
                round_id: summary.round_id,
                requested_by: "999".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }
}
