//! Apply stage: persist resolved scores, branching on mode.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{ParticipantEntity, TeamEntity},
        round_store::RoundStore,
        user_directory::canonicalize_name,
    },
    import::types::{
        ImportError, ImportErrorCode, ImportMetadata, ImportReport, ResolvedScorecard,
    },
    state::round::RsvpResponse,
};

/// Persist a resolved scorecard.
///
/// Singles rows are written one by one and individual failures are logged
/// and skipped; team mode merges into the full roster and persists it in
/// one all-or-nothing batch.
pub async fn apply(
    store: Arc<dyn RoundStore>,
    resolved: ResolvedScorecard,
    metadata: &ImportMetadata,
) -> Result<ImportReport, ImportError> {
    if resolved.mode.is_team() {
        apply_team_scores(store, resolved, metadata).await
    } else {
        apply_singles_scores(store, resolved, metadata).await
    }
}

async fn apply_singles_scores(
    store: Arc<dyn RoundStore>,
    resolved: ResolvedScorecard,
    metadata: &ImportMetadata,
) -> Result<ImportReport, ImportError> {
    let mut skipped = resolved.skipped;
    let mut updated = 0usize;

    for player in resolved.players {
        match store
            .update_participant_score(
                &metadata.guild_id,
                metadata.round_id,
                &player.user_id,
                player.score,
            )
            .await
        {
            Ok(()) => updated += 1,
            // Partial success is fine in singles mode; the row is reported,
            // not fatal.
            Err(err) => {
                warn!(
                    round_id = %metadata.round_id,
                    user_id = %player.user_id,
                    error = %err,
                    "skipping singles score row"
                );
                skipped.push(player.raw_name);
            }
        }
    }

    if updated == 0 {
        return Err(ImportError::new(
            ImportErrorCode::NoUpdates,
            "no participant score could be updated",
            metadata,
        ));
    }

    info!(round_id = %metadata.round_id, updated, "applied singles scorecard");
    Ok(ImportReport {
        mode: resolved.mode,
        updated,
        skipped,
    })
}

async fn apply_team_scores(
    store: Arc<dyn RoundStore>,
    resolved: ResolvedScorecard,
    metadata: &ImportMetadata,
) -> Result<ImportReport, ImportError> {
    let db_error = |message: String| ImportError::new(ImportErrorCode::DbError, message, metadata);

    let has_groups = store
        .round_has_groups(&metadata.guild_id, metadata.round_id)
        .await
        .map_err(|err| db_error(err.to_string()))?;

    // Re-ingest must not duplicate groups; creation happens at most once.
    if !has_groups {
        let groups: Vec<TeamEntity> = resolved
            .teams
            .iter()
            .map(|team| TeamEntity {
                id: Uuid::new_v4(),
                name: team.name.clone(),
            })
            .collect();
        store
            .create_round_groups(&metadata.guild_id, metadata.round_id, groups)
            .await
            .map_err(|err| db_error(err.to_string()))?;
    }

    let round = store
        .get_round(&metadata.guild_id, metadata.round_id)
        .await
        .map_err(|err| db_error(err.to_string()))?
        .ok_or_else(|| db_error(format!("round `{}` not found", metadata.round_id)))?;

    let group_ids: IndexMap<String, Uuid> = round
        .teams
        .iter()
        .map(|team| (canonicalize_name(&team.name), team.id))
        .collect();

    // Merge by identity on a copy of the roster; one batch write persists
    // the whole list so a failure leaves nothing half-applied.
    let mut roster: IndexMap<String, ParticipantEntity> = round
        .participants
        .into_iter()
        .map(|participant| (participant_key(&participant), participant))
        .collect();

    let mut updated = 0usize;
    for team in &resolved.teams {
        let team_id = group_ids.get(&canonicalize_name(&team.name)).copied();
        for member in &team.members {
            let key = match &member.user_id {
                Some(user_id) => format!("user:{user_id}"),
                None => format!("guest:{}", canonicalize_name(&member.raw_name)),
            };
            match roster.get_mut(&key) {
                Some(existing) => {
                    existing.score = Some(team.score);
                    existing.team_id = team_id;
                }
                None => {
                    roster.insert(
                        key,
                        ParticipantEntity {
                            user_id: member.user_id.clone().unwrap_or_default(),
                            response: RsvpResponse::Accept,
                            tag_number: None,
                            score: Some(team.score),
                            team_id,
                            raw_name: member
                                .user_id
                                .is_none()
                                .then(|| member.raw_name.clone()),
                        },
                    );
                }
            }
            updated += 1;
        }
    }

    store
        .update_rounds_and_participants(
            &metadata.guild_id,
            vec![crate::dao::models::RoundUpdateEntity {
                round_id: metadata.round_id,
                participants: roster.into_values().collect(),
            }],
        )
        .await
        .map_err(|err| db_error(err.to_string()))?;

    info!(
        round_id = %metadata.round_id,
        updated,
        mode = resolved.mode.as_str(),
        "applied team scorecard"
    );
    Ok(ImportReport {
        mode: resolved.mode,
        updated,
        skipped: resolved.skipped,
    })
}

fn participant_key(participant: &ParticipantEntity) -> String {
    if participant.user_id.is_empty() {
        format!(
            "guest:{}",
            canonicalize_name(participant.raw_name.as_deref().unwrap_or_default())
        )
    } else {
        format!("user:{}", participant.user_id)
    }
}
