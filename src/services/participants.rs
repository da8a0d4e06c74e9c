//! RSVP handling.
//!
//! Submitting the response a participant already holds toggles the RSVP
//! away; submitting a different one replaces it in place. Tag numbers are
//! resolved on playing responses in singles rounds only.

use tracing::info;
use validator::Validate;

use crate::{
    dao::storage::StorageError,
    dto::{
        events::{ParticipantSummary, RoundEvent},
        requests::JoinRoundRequest,
    },
    error::ServiceError,
    services::{round_events, round_lifecycle, tag_resolution},
    state::{
        SharedState,
        round::{Participant, RsvpResponse},
    },
};

/// What a join request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAction {
    /// The participant re-submitted their current response; drop the RSVP.
    Remove,
    /// Insert or replace the RSVP with the requested response.
    Set,
}

/// Toggle rule: re-asserting the response you already hold removes you.
pub fn decide_join_action(existing: Option<RsvpResponse>, requested: RsvpResponse) -> JoinAction {
    match existing {
        Some(current) if current == requested => JoinAction::Remove,
        _ => JoinAction::Set,
    }
}

/// Apply an RSVP to a round and publish the resulting roster event.
pub async fn join_round(
    state: &SharedState,
    request: JoinRoundRequest,
) -> Result<RoundEvent, ServiceError> {
    request.validate()?;
    if request.user_id.trim().is_empty() {
        return Err(ServiceError::InvalidInput("User id is required".into()));
    }

    let round = round_lifecycle::load_round(state, &request.guild_id, request.round_id).await?;

    let existing = round.participant(&request.user_id).cloned();
    let store = state.require_round_store().await?;

    match decide_join_action(existing.as_ref().map(|p| p.response), request.response) {
        JoinAction::Remove => {
            // decide_join_action returns Remove only for an existing RSVP.
            let Some(current) = existing else {
                return Err(ServiceError::NotFound(format!(
                    "participant `{}` in round `{}`",
                    request.user_id, request.round_id
                )));
            };
            store
                .remove_participant(&request.guild_id, request.round_id, &request.user_id)
                .await?;
            info!(
                round_id = %request.round_id,
                user_id = %request.user_id,
                "participant toggled their RSVP away"
            );

            let event = RoundEvent::ParticipantRemoved {
                guild_id: request.guild_id,
                round_id: request.round_id,
                user_id: request.user_id,
                current_status: current.response.as_str().to_owned(),
            };
            round_events::publish(state, &event);
            Ok(event)
        }
        JoinAction::Set => {
            let mut participant = existing
                .clone()
                .unwrap_or_else(|| Participant::new(request.user_id.clone(), request.response));
            participant.response = request.response;

            // Late-join marking applies only to fresh playing RSVPs once the
            // round has begun.
            let joined_late =
                round.state.has_begun() && request.response.is_playing() && existing.is_none();

            if request.response.is_playing() && !round.is_team_mode() {
                let resolved =
                    tag_resolution::resolve_tag_number(state, &request.guild_id, &request.user_id)
                        .await?;
                participant.tag_number = resolved.or(participant.tag_number);
            }

            let entity: crate::dao::models::ParticipantEntity = participant.clone().into();
            if let Err(err) = store
                .upsert_participant(&request.guild_id, request.round_id, entity.clone())
                .await
            {
                match err {
                    // Lost an insert race; the second attempt is an update.
                    StorageError::Conflict { .. } => {
                        store
                            .upsert_participant(&request.guild_id, request.round_id, entity)
                            .await?;
                    }
                    other => return Err(other.into()),
                }
            }

            let event = RoundEvent::Joined {
                guild_id: request.guild_id,
                round_id: request.round_id,
                participant: ParticipantSummary::from(&participant),
                joined_late,
            };
            round_events::publish(state, &event);
            Ok(event)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::{
        bus::{BusMessage, MessageBus, in_process::InProcessBus, topics},
        config::AppConfig,
        dao::memory::{MemoryRoundStore, MemoryUserDirectory},
        dto::{format_timestamp, requests::CreateRoundRequest},
        scheduler::delay_queue::DelayQueueScheduler,
        state::{AppState, lifecycle::RoundState},
    };

    async fn state_with_round() -> (SharedState, Arc<InProcessBus>, Uuid) {
        let bus: Arc<InProcessBus> = Arc::new(InProcessBus::new(32));
        let scheduler = DelayQueueScheduler::spawn(bus.clone());
        let state = AppState::new(AppConfig::default(), bus.clone(), scheduler);
        state
            .install_storage(
                Arc::new(MemoryRoundStore::new()),
                Arc::new(MemoryUserDirectory::new()),
            )
            .await;

        let summary = crate::services::round_lifecycle::create_round(
            &state,
            CreateRoundRequest {
                guild_id: "100".into(),
                channel_id: "200".into(),
                title: "Tuesday league".into(),
                description: None,
                location: "Maple Hill".into(),
                event_type: None,
                start_time: format_timestamp(OffsetDateTime::now_utc() + time::Duration::hours(4)),
                created_by: "300".into(),
            },
        )
        .await
        .unwrap();
        (state, bus, summary.round_id)
    }

    fn join(round_id: Uuid, user: &str, response: RsvpResponse) -> JoinRoundRequest {
        JoinRoundRequest {
            guild_id: "100".into(),
            round_id,
            user_id: user.into(),
            response,
        }
    }

    #[test]
    fn repeating_a_response_toggles_it_away() {
        assert_eq!(
            decide_join_action(Some(RsvpResponse::Accept), RsvpResponse::Accept),
            JoinAction::Remove
        );
        assert_eq!(
            decide_join_action(Some(RsvpResponse::Accept), RsvpResponse::Decline),
            JoinAction::Set
        );
        assert_eq!(
            decide_join_action(None, RsvpResponse::Tentative),
            JoinAction::Set
        );
    }

    #[tokio::test(start_paused = true)]
    async fn joining_twice_with_the_same_response_removes_the_rsvp() {
        let (state, _bus, round_id) = state_with_round().await;

        let first = join_round(&state, join(round_id, "42", RsvpResponse::Accept))
            .await
            .unwrap();
        assert!(matches!(first, RoundEvent::Joined { .. }));

        let second = join_round(&state, join(round_id, "42", RsvpResponse::Accept))
            .await
            .unwrap();
        assert!(matches!(
            second,
            RoundEvent::ParticipantRemoved { ref current_status, .. } if current_status == "ACCEPT"
        ));

        let round = round_lifecycle::load_round(&state, "100", round_id).await.unwrap();
        assert!(round.participant("42").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn changing_the_response_keeps_the_entry() {
        let (state, _bus, round_id) = state_with_round().await;

        join_round(&state, join(round_id, "42", RsvpResponse::Accept))
            .await
            .unwrap();
        join_round(&state, join(round_id, "42", RsvpResponse::Decline))
            .await
            .unwrap();

        let round = round_lifecycle::load_round(&state, "100", round_id).await.unwrap();
        assert_eq!(round.participant("42").unwrap().response, RsvpResponse::Decline);
    }

    #[tokio::test(start_paused = true)]
    async fn playing_join_resolves_a_tag_number() {
        let (state, bus, round_id) = state_with_round().await;
        let mut requests = bus.subscribe(topics::TAG_NUMBER_REQUEST);

        let responder = async {
            let request = requests.recv().await.unwrap();
            bus.publish(
                BusMessage::new(
                    topics::TAG_NUMBER_RESPONSE,
                    &serde_json::json!({"user_id": "42", "tag_number": 13}),
                )
                .unwrap()
                .with_correlation(request.correlation_id.unwrap()),
            )
            .unwrap();
        };

        let (event, ()) = tokio::join!(
            join_round(&state, join(round_id, "42", RsvpResponse::Accept)),
            responder
        );
        let event = event.unwrap();
        assert!(matches!(
            event,
            RoundEvent::Joined { ref participant, .. } if participant.tag_number == Some(13)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn joining_after_start_is_marked_late() {
        let (state, _bus, round_id) = state_with_round().await;
        let store = state.require_round_store().await.unwrap();
        store
            .update_round_state("100", round_id, RoundState::InProgress)
            .await
            .unwrap();

        let event = join_round(&state, join(round_id, "42", RsvpResponse::Accept))
            .await
            .unwrap();
        assert!(matches!(event, RoundEvent::Joined { joined_late: true, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn joining_a_finalized_round_succeeds_and_is_marked_late() {
        let (state, _bus, round_id) = state_with_round().await;
        let store = state.require_round_store().await.unwrap();
        store
            .update_round_state("100", round_id, RoundState::Finalized)
            .await
            .unwrap();

        let event = join_round(&state, join(round_id, "42", RsvpResponse::Accept))
            .await
            .unwrap();
        assert!(matches!(event, RoundEvent::Joined { joined_late: true, .. }));

        let round = round_lifecycle::load_round(&state, "100", round_id).await.unwrap();
        assert_eq!(round.participant("42").unwrap().response, RsvpResponse::Accept);
    }

    #[tokio::test(start_paused = true)]
    async fn decline_without_an_existing_rsvp_is_stored_and_never_late() {
        let (state, _bus, round_id) = state_with_round().await;
        let store = state.require_round_store().await.unwrap();
        store
            .update_round_state("100", round_id, RoundState::InProgress)
            .await
            .unwrap();

        let event = join_round(&state, join(round_id, "42", RsvpResponse::Decline))
            .await
            .unwrap();
        assert!(matches!(event, RoundEvent::Joined { joined_late: false, .. }));
    }
}
