//! Scorecard import pipeline: fetch, parse, normalize, ingest, apply.
//!
//! Stages are independent and retry-safe; an `ImportMetadata` built once
//! per attempt threads through all of them so every failure carries full
//! context. The attempt's state is recorded on the round (`pending`, then
//! `completed` or `failed`) for observability and conflict detection.

pub mod apply;
pub mod fetch;
pub mod ingest;
pub mod normalize;
pub mod parser;
pub mod types;

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    bus::{BusMessage, topics},
    dao::models::{ImportStateEntity, ImportStatusEntity},
    dto::{
        events::{ImportCompletedEvent, ImportFailedEvent, RoundEvent},
        requests::{FinalizeRoundRequest, ImportRequest, ImportSource},
    },
    import::types::{ImportError, ImportErrorCode, ImportMetadata, ImportReport},
    services::round_events,
    state::{SharedState, lifecycle::RoundState, round::Round},
};

/// Run the whole pipeline for one import request.
///
/// The caller is expected to have validated the request shape. Success and
/// failure are both announced as events in addition to the returned value.
pub async fn run_import(
    state: &SharedState,
    request: ImportRequest,
) -> Result<ImportReport, ImportError> {
    let metadata = ImportMetadata {
        guild_id: request.guild_id.clone(),
        round_id: request.round_id,
        import_id: Uuid::new_v4(),
        user_id: request.user_id.clone(),
        channel_id: request.channel_id.clone(),
        event_message_id: None,
    };

    match run_stages(state, request, metadata.clone()).await {
        Ok((metadata, report)) => {
            record_status(state, &metadata, ImportStateEntity::Completed, None, None).await;
            round_events::publish(
                state,
                &RoundEvent::ImportCompleted(ImportCompletedEvent {
                    guild_id: metadata.guild_id.clone(),
                    round_id: metadata.round_id,
                    import_id: metadata.import_id,
                    mode: report.mode.as_str().to_owned(),
                    updated: report.updated,
                    skipped: report.skipped.clone(),
                }),
            );
            maybe_request_finalization(state, &metadata).await;
            Ok(report)
        }
        Err(err) => {
            record_status(
                state,
                &err.metadata,
                ImportStateEntity::Failed,
                Some(err.code),
                Some(err.message.clone()),
            )
            .await;
            round_events::publish(
                state,
                &RoundEvent::ImportFailed(ImportFailedEvent {
                    guild_id: err.metadata.guild_id.clone(),
                    round_id: err.metadata.round_id,
                    import_id: err.metadata.import_id,
                    user_id: err.metadata.user_id.clone(),
                    channel_id: err.metadata.channel_id.clone(),
                    code: err.code.as_str().to_owned(),
                    message: err.message.clone(),
                }),
            );
            Err(err)
        }
    }
}

async fn run_stages(
    state: &SharedState,
    request: ImportRequest,
    mut metadata: ImportMetadata,
) -> Result<(ImportMetadata, ImportReport), ImportError> {
    let db_error = |message: String, metadata: &ImportMetadata| {
        ImportError::new(ImportErrorCode::DbError, message, metadata)
    };

    let store = state
        .round_store()
        .await
        .ok_or_else(|| db_error("storage is unavailable (degraded mode)".into(), &metadata))?;
    let directory = state
        .user_directory()
        .await
        .ok_or_else(|| db_error("storage is unavailable (degraded mode)".into(), &metadata))?;

    let entity = store
        .get_round(&metadata.guild_id, metadata.round_id)
        .await
        .map_err(|err| db_error(err.to_string(), &metadata))?
        .ok_or_else(|| db_error(format!("round `{}` not found", metadata.round_id), &metadata))?;
    metadata.event_message_id = entity.event_message_id.clone();

    if entity.state == RoundState::Finalized {
        return Err(ImportError::new(
            ImportErrorCode::ImportConflict,
            "round is already finalized; its scores are locked",
            &metadata,
        ));
    }
    if let Some(status) = &entity.import_status
        && status.state == ImportStateEntity::Pending
        && status.import_id != metadata.import_id
    {
        return Err(ImportError::new(
            ImportErrorCode::ImportConflict,
            format!("import `{}` is already running for this round", status.import_id),
            &metadata,
        ));
    }

    store
        .set_import_status(
            &metadata.guild_id,
            metadata.round_id,
            ImportStatusEntity {
                import_id: metadata.import_id,
                state: ImportStateEntity::Pending,
                code: None,
                message: None,
                updated_at: OffsetDateTime::now_utc(),
            },
        )
        .await
        .map_err(|err| db_error(err.to_string(), &metadata))?;

    let (filename, bytes) = match request.source {
        ImportSource::Url { url } => {
            let canonical = fetch::canonicalize_export_url(
                &url,
                &state.config().allowed_import_hosts,
                &metadata,
            )?;
            let bytes =
                fetch::fetch_export(&canonical, state.config().scorecard_max_bytes, &metadata)
                    .await?;
            // UDisc export endpoints serve CSV.
            ("scorecard.csv".to_owned(), bytes)
        }
        ImportSource::Upload { filename, content } => {
            fetch::check_upload_size(&content, state.config().scorecard_max_bytes, &metadata)?;
            (filename, content)
        }
    };

    let parsed = parser::parse_scorecard(&filename, &bytes, &metadata)?;
    let normalized = normalize::normalize(Some(&parsed), &metadata)?;
    let resolved = ingest::ingest(directory, normalized, &metadata).await?;
    let report = apply::apply(store, resolved, &metadata).await?;

    info!(
        round_id = %metadata.round_id,
        import_id = %metadata.import_id,
        mode = report.mode.as_str(),
        updated = report.updated,
        skipped = report.skipped.len(),
        "import completed"
    );
    Ok((metadata, report))
}

/// Persist the attempt's terminal state; failures here are logged, never
/// allowed to mask the import outcome itself.
async fn record_status(
    state: &SharedState,
    metadata: &ImportMetadata,
    import_state: ImportStateEntity,
    code: Option<ImportErrorCode>,
    message: Option<String>,
) {
    let Some(store) = state.round_store().await else {
        return;
    };
    let status = ImportStatusEntity {
        import_id: metadata.import_id,
        state: import_state,
        code: code.map(|code| code.as_str().to_owned()),
        message,
        updated_at: OffsetDateTime::now_utc(),
    };
    if let Err(err) = store
        .set_import_status(&metadata.guild_id, metadata.round_id, status)
        .await
    {
        warn!(
            round_id = %metadata.round_id,
            import_id = %metadata.import_id,
            error = %err,
            "failed to record import status"
        );
    }
}

/// A completed import can close a round whose start timer never fired:
/// when every playing participant now holds a score, request finalization
/// through the normal command path.
async fn maybe_request_finalization(state: &SharedState, metadata: &ImportMetadata) {
    let Some(store) = state.round_store().await else {
        return;
    };
    let round: Round = match store.get_round(&metadata.guild_id, metadata.round_id).await {
        Ok(Some(entity)) => entity.into(),
        Ok(None) => return,
        Err(err) => {
            warn!(round_id = %metadata.round_id, error = %err, "could not reload round after import");
            return;
        }
    };
    if round.state == RoundState::Finalized || !round.all_playing_scored() {
        return;
    }

    let finalize = FinalizeRoundRequest {
        guild_id: metadata.guild_id.clone(),
        round_id: metadata.round_id,
    };
    match BusMessage::new(topics::ROUND_FINALIZE, &finalize) {
        Ok(message) => {
            if let Err(err) = state.bus().publish(message) {
                warn!(round_id = %metadata.round_id, error = %err, "failed to request post-import finalization");
            }
        }
        Err(err) => {
            warn!(round_id = %metadata.round_id, error = %err, "failed to encode post-import finalization");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::{
        bus::{MessageBus, in_process::InProcessBus},
        config::AppConfig,
        dao::{
            memory::{MemoryRoundStore, MemoryUserDirectory},
            user_directory::UserRecord,
        },
        dto::{format_timestamp, requests::CreateRoundRequest, requests::JoinRoundRequest},
        scheduler::delay_queue::DelayQueueScheduler,
        services::{participants, round_lifecycle},
        state::{AppState, round::RsvpResponse},
    };

    async fn ready_state() -> (SharedState, Arc<InProcessBus>, Uuid) {
        let bus: Arc<InProcessBus> = Arc::new(InProcessBus::new(32));
        let scheduler = DelayQueueScheduler::spawn(bus.clone());
        let state = AppState::new(AppConfig::default(), bus.clone(), scheduler);
        let directory = Arc::new(MemoryUserDirectory::new());
        directory.insert_user(
            "100",
            UserRecord {
                user_id: "41".into(),
                username: "Alice".into(),
                display_name: None,
            },
        );
        directory.insert_user(
            "100",
            UserRecord {
                user_id: "42".into(),
                username: "Bob".into(),
                display_name: None,
            },
        );
        state
            .install_storage(Arc::new(MemoryRoundStore::new()), directory)
            .await;

        let summary = round_lifecycle::create_round(
            &state,
            CreateRoundRequest {
                guild_id: "100".into(),
                channel_id: "200".into(),
                title: "Tuesday league".into(),
                description: None,
                location: "Maple Hill".into(),
                event_type: None,
                start_time: format_timestamp(
                    OffsetDateTime::now_utc() + time::Duration::hours(4),
                ),
                created_by: "300".into(),
            },
        )
        .await
        .unwrap();
        (state, bus, summary.round_id)
    }

    fn upload(round_id: Uuid, filename: &str, content: &str) -> ImportRequest {
        ImportRequest {
            guild_id: "100".into(),
            round_id,
            user_id: "300".into(),
            channel_id: "200".into(),
            source: ImportSource::Upload {
                filename: filename.into(),
                content: content.as_bytes().to_vec(),
            },
        }
    }

    async fn rsvp(state: &SharedState, round_id: Uuid, user: &str) {
        participants::join_round(
            state,
            JoinRoundRequest {
                guild_id: "100".into(),
                round_id,
                user_id: user.into(),
                response: RsvpResponse::Accept,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn csv_upload_imports_singles_scores_end_to_end() {
        let (state, bus, round_id) = ready_state().await;
        let mut finalize_rx = bus.subscribe(topics::ROUND_FINALIZE);
        rsvp(&state, round_id, "41").await;
        rsvp(&state, round_id, "42").await;

        let csv = "PlayerName,Total,Hole1\nPar,3,3\nAlice,54,3\nBob,56,3\n";
        let report = run_import(&state, upload(round_id, "scores.csv", csv))
            .await
            .unwrap();
        assert_eq!(report.updated, 2);
        assert!(report.skipped.is_empty());

        let round = round_lifecycle::load_round(&state, "100", round_id).await.unwrap();
        assert_eq!(round.participant("41").unwrap().score, Some(54));

        // Everyone playing is scored, so the import requests finalization.
        let command = finalize_rx.recv().await.unwrap();
        let request: FinalizeRoundRequest = command.decode().unwrap();
        assert_eq!(request.round_id, round_id);
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_extension_fails_with_a_code_and_an_event() {
        let (state, bus, round_id) = ready_state().await;
        let mut failed_rx = bus.subscribe(topics::IMPORT_FAILED);

        let err = run_import(&state, upload(round_id, "scores.pdf", "%PDF"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ImportErrorCode::UnsupportedFormat);

        let event = failed_rx.recv().await.unwrap();
        assert_eq!(event.payload["data"]["code"], "UNSUPPORTED_FORMAT");
    }

    #[tokio::test(start_paused = true)]
    async fn pending_import_blocks_a_second_attempt() {
        let (state, _bus, round_id) = ready_state().await;
        let store = state.require_round_store().await.unwrap();
        store
            .set_import_status(
                "100",
                round_id,
                ImportStatusEntity {
                    import_id: Uuid::new_v4(),
                    state: ImportStateEntity::Pending,
                    code: None,
                    message: None,
                    updated_at: OffsetDateTime::now_utc(),
                },
            )
            .await
            .unwrap();

        let csv = "PlayerName,Total,Hole1\nAlice,54,3\n";
        let err = run_import(&state, upload(round_id, "scores.csv", csv))
            .await
            .unwrap_err();
        assert_eq!(err.code, ImportErrorCode::ImportConflict);
    }

    #[tokio::test(start_paused = true)]
    async fn doubles_upload_creates_groups_and_guests() {
        let (state, _bus, round_id) = ready_state().await;
        rsvp(&state, round_id, "41").await;

        let csv = "Team,Total,Hole1\nAlice & Zed,49,3\nBob / Stranger,51,3\n";
        let report = run_import(&state, upload(round_id, "scores.csv", csv))
            .await
            .unwrap();
        assert_eq!(report.mode.as_str(), "doubles");
        assert_eq!(report.updated, 4);
        assert_eq!(report.skipped, vec!["Zed".to_string(), "Stranger".to_string()]);

        let round = round_lifecycle::load_round(&state, "100", round_id).await.unwrap();
        assert_eq!(round.teams.len(), 2);
        let guests: Vec<_> = round
            .participants
            .iter()
            .filter(|p| p.user_id.is_empty())
            .collect();
        assert_eq!(guests.len(), 2);
    }
}
