//! Identity resolution: scorecard names to user ids.

use std::sync::Arc;

use tracing::debug;

use crate::{
    dao::user_directory::{UserDirectory, UserRecord, canonicalize_name},
    import::types::{
        ImportError, ImportErrorCode, ImportMetadata, NormalizedScorecard, ResolvedMember,
        ResolvedPlayer, ResolvedScorecard, ResolvedTeam,
    },
};

/// Resolve every normalized name to a user identity.
///
/// Resolution order: exact canonical username, exact canonical display
/// name, then partial match only when it returns exactly one candidate.
/// An ambiguous partial match is reported as unmatched, never guessed.
/// Unmatched names land in `skipped`; zero matches overall is `NO_MATCHES`.
pub async fn ingest(
    directory: Arc<dyn UserDirectory>,
    normalized: NormalizedScorecard,
    metadata: &ImportMetadata,
) -> Result<ResolvedScorecard, ImportError> {
    let mut resolved = ResolvedScorecard {
        mode: normalized.mode,
        players: Vec::new(),
        teams: Vec::new(),
        skipped: Vec::new(),
    };
    let mut matched = 0usize;

    for player in normalized.players {
        match resolve_identity(directory.as_ref(), &metadata.guild_id, &player.raw_name, metadata)
            .await?
        {
            Some(user) => {
                matched += 1;
                resolved.players.push(ResolvedPlayer {
                    user_id: user.user_id,
                    raw_name: player.raw_name,
                    score: player.score,
                });
            }
            None => resolved.skipped.push(player.raw_name),
        }
    }

    for team in normalized.teams {
        let mut members = Vec::with_capacity(team.members.len());
        for member in team.members {
            let user =
                resolve_identity(directory.as_ref(), &metadata.guild_id, &member.raw_name, metadata)
                    .await?;
            match user {
                Some(user) => {
                    matched += 1;
                    members.push(ResolvedMember {
                        user_id: Some(user.user_id),
                        raw_name: member.raw_name,
                    });
                }
                None => {
                    // Guests stay on the team under their raw name, and are
                    // reported so the importer knows who never linked up.
                    resolved.skipped.push(member.raw_name.clone());
                    members.push(ResolvedMember {
                        user_id: None,
                        raw_name: member.raw_name,
                    });
                }
            }
        }
        resolved.teams.push(ResolvedTeam {
            name: team.name,
            score: team.score,
            members,
        });
    }

    if matched == 0 {
        return Err(ImportError::new(
            ImportErrorCode::NoMatches,
            "no scorecard name matched a known user",
            metadata,
        ));
    }
    Ok(resolved)
}

async fn resolve_identity(
    directory: &dyn UserDirectory,
    guild_id: &str,
    raw_name: &str,
    metadata: &ImportMetadata,
) -> Result<Option<UserRecord>, ImportError> {
    let canonical = canonicalize_name(raw_name);
    if canonical.is_empty() {
        return Ok(None);
    }
    let db_error =
        |err: crate::dao::storage::StorageError| ImportError::new(ImportErrorCode::DbError, err.to_string(), metadata);

    if let Some(user) = directory
        .find_by_normalized_username(guild_id, &canonical)
        .await
        .map_err(db_error)?
    {
        return Ok(Some(user));
    }
    if let Some(user) = directory
        .find_by_normalized_display_name(guild_id, &canonical)
        .await
        .map_err(db_error)?
    {
        return Ok(Some(user));
    }

    let mut candidates = directory
        .find_by_partial_name(guild_id, &canonical)
        .await
        .map_err(db_error)?;
    if candidates.len() == 1 {
        return Ok(candidates.pop());
    }
    if candidates.len() > 1 {
        debug!(
            raw_name,
            candidates = candidates.len(),
            "ambiguous partial match; leaving unmatched"
        );
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::import::types::{NormalizedPlayer, NormalizedTeam, ScorecardMode, TeamMember};
    use crate::dao::memory::MemoryUserDirectory;

    fn metadata() -> ImportMetadata {
        ImportMetadata {
            guild_id: "100".into(),
            round_id: Uuid::new_v4(),
            import_id: Uuid::new_v4(),
            user_id: "300".into(),
            channel_id: "200".into(),
            event_message_id: None,
        }
    }

    fn directory_with(users: &[(&str, &str, Option<&str>)]) -> Arc<MemoryUserDirectory> {
        let directory = MemoryUserDirectory::new();
        for (id, username, display) in users {
            directory.insert_user(
                "100",
                UserRecord {
                    user_id: id.to_string(),
                    username: username.to_string(),
                    display_name: display.map(str::to_owned),
                },
            );
        }
        Arc::new(directory)
    }

    fn singles(names: &[(&str, i32)]) -> NormalizedScorecard {
        NormalizedScorecard {
            mode: ScorecardMode::Singles,
            players: names
                .iter()
                .map(|(name, score)| NormalizedPlayer {
                    raw_name: name.to_string(),
                    score: *score,
                })
                .collect(),
            teams: Vec::new(),
        }
    }

    #[tokio::test]
    async fn exact_username_wins_over_everything() {
        let directory = directory_with(&[("1", "Alice", Some("The Ace"))]);
        let resolved = ingest(directory, singles(&[("  aLiCe ", 54)]), &metadata())
            .await
            .unwrap();
        assert_eq!(resolved.players[0].user_id, "1");
        assert!(resolved.skipped.is_empty());
    }

    #[tokio::test]
    async fn display_name_matches_when_username_does_not() {
        let directory = directory_with(&[("1", "xx_alice_xx", Some("Alice Miller"))]);
        let resolved = ingest(directory, singles(&[("alice miller", 54)]), &metadata())
            .await
            .unwrap();
        assert_eq!(resolved.players[0].user_id, "1");
    }

    #[tokio::test]
    async fn unique_partial_match_resolves() {
        let directory = directory_with(&[("1", "alicewonder", None), ("2", "bob", None)]);
        let resolved = ingest(directory, singles(&[("alice", 54)]), &metadata())
            .await
            .unwrap();
        assert_eq!(resolved.players[0].user_id, "1");
    }

    #[tokio::test]
    async fn ambiguous_partial_match_is_never_guessed() {
        let directory = directory_with(&[("1", "alice_a", None), ("2", "alice_b", None), ("3", "bob", None)]);
        let resolved = ingest(
            directory,
            singles(&[("alice", 54), ("bob", 58)]),
            &metadata(),
        )
        .await
        .unwrap();
        assert_eq!(resolved.players.len(), 1);
        assert_eq!(resolved.players[0].user_id, "3");
        assert_eq!(resolved.skipped, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn zero_matches_fails_with_no_matches() {
        let directory = directory_with(&[]);
        let err = ingest(directory, singles(&[("alice", 54)]), &metadata())
            .await
            .unwrap_err();
        assert_eq!(err.code, ImportErrorCode::NoMatches);
    }

    #[tokio::test]
    async fn unmatched_team_members_become_guests_and_are_reported() {
        let directory = directory_with(&[("1", "alice", None)]);
        let normalized = NormalizedScorecard {
            mode: ScorecardMode::Doubles,
            players: Vec::new(),
            teams: vec![NormalizedTeam {
                name: "Alice & Zed".into(),
                score: 49,
                members: vec![
                    TeamMember { raw_name: "Alice".into() },
                    TeamMember { raw_name: "Zed".into() },
                ],
            }],
        };
        let resolved = ingest(directory, normalized, &metadata()).await.unwrap();
        let team = &resolved.teams[0];
        assert_eq!(team.members[0].user_id.as_deref(), Some("1"));
        assert_eq!(team.members[1].user_id, None);
        assert_eq!(resolved.skipped, vec!["Zed".to_string()]);
    }
}
