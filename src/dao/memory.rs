//! In-memory storage backend used by tests and storage-less development.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    dao::{
        models::{ImportStatusEntity, ParticipantEntity, RoundEntity, RoundUpdateEntity, TeamEntity},
        round_store::RoundStore,
        storage::{StorageError, StorageResult},
        user_directory::{UserDirectory, UserRecord, canonicalize_name},
    },
    state::lifecycle::RoundState,
};

/// Jaro-Winkler score above which a stored name counts as a partial match.
const PARTIAL_MATCH_THRESHOLD: f64 = 0.85;

/// Round storage backed by a concurrent map. Always healthy.
#[derive(Default)]
pub struct MemoryRoundStore {
    rounds: Arc<DashMap<(String, Uuid), RoundEntity>>,
}

impl MemoryRoundStore {
    /// Fresh, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_round<T>(
        &self,
        guild_id: &str,
        round_id: Uuid,
        apply: impl FnOnce(&mut RoundEntity) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let key = (guild_id.to_owned(), round_id);
        let mut entry = self
            .rounds
            .get_mut(&key)
            .filter(|round| round.state != RoundState::Deleted)
            .ok_or_else(|| StorageError::not_found(format!("round `{round_id}`")))?;
        let result = apply(entry.value_mut());
        if result.is_ok() {
            entry.updated_at = OffsetDateTime::now_utc();
        }
        result
    }
}

impl RoundStore for MemoryRoundStore {
    fn create_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let key = (round.guild_id.clone(), round.id);
        let result = match self.rounds.entry(key) {
            dashmap::Entry::Occupied(_) => {
                Err(StorageError::conflict(format!("round `{}` already exists", round.id)))
            }
            dashmap::Entry::Vacant(slot) => {
                slot.insert(round);
                Ok(())
            }
        };
        Box::pin(future::ready(result))
    }

    fn get_round(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let found = self
            .rounds
            .get(&(guild_id.to_owned(), round_id))
            .map(|entry| entry.value().clone())
            .filter(|round| round.state != RoundState::Deleted);
        Box::pin(future::ready(Ok(found)))
    }

    fn update_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let guild_id = round.guild_id.clone();
        let result = self.with_round(&guild_id, round.id, |stored| {
            // Import status is owned by set_import_status.
            let import_status = stored.import_status.take();
            *stored = round;
            stored.import_status = import_status;
            Ok(())
        });
        Box::pin(future::ready(result))
    }

    fn update_round_state(
        &self,
        guild_id: &str,
        round_id: Uuid,
        state: RoundState,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.with_round(guild_id, round_id, |stored| {
            stored.state = state;
            Ok(())
        });
        Box::pin(future::ready(result))
    }

    fn upsert_participant(
        &self,
        guild_id: &str,
        round_id: Uuid,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.with_round(guild_id, round_id, |stored| {
            match stored
                .participants
                .iter_mut()
                .find(|existing| existing.user_id == participant.user_id)
            {
                Some(existing) => *existing = participant,
                None => stored.participants.push(participant),
            }
            Ok(())
        });
        Box::pin(future::ready(result))
    }

    fn remove_participant(
        &self,
        guild_id: &str,
        round_id: Uuid,
        user_id: &str,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let user_id = user_id.to_owned();
        let result = self.with_round(guild_id, round_id, |stored| {
            let before = stored.participants.len();
            stored.participants.retain(|entry| entry.user_id != user_id);
            if stored.participants.len() == before {
                return Err(StorageError::not_found(format!("participant `{user_id}`")));
            }
            Ok(())
        });
        Box::pin(future::ready(result))
    }

    fn participants(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let result = self.with_round(guild_id, round_id, |stored| Ok(stored.participants.clone()));
        Box::pin(future::ready(result))
    }

    fn update_participant_score(
        &self,
        guild_id: &str,
        round_id: Uuid,
        user_id: &str,
        score: i32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let user_id = user_id.to_owned();
        let result = self.with_round(guild_id, round_id, |stored| {
            let participant = stored
                .participants
                .iter_mut()
                .find(|entry| entry.user_id == user_id)
                .ok_or_else(|| StorageError::not_found(format!("participant `{user_id}`")))?;
            participant.score = Some(score);
            Ok(())
        });
        Box::pin(future::ready(result))
    }

    fn round_has_groups(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let result = self.with_round(guild_id, round_id, |stored| Ok(!stored.teams.is_empty()));
        Box::pin(future::ready(result))
    }

    fn create_round_groups(
        &self,
        guild_id: &str,
        round_id: Uuid,
        groups: Vec<TeamEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.with_round(guild_id, round_id, |stored| {
            if !stored.teams.is_empty() {
                return Err(StorageError::conflict(format!(
                    "round `{round_id}` already has groups"
                )));
            }
            stored.teams = groups;
            Ok(())
        });
        Box::pin(future::ready(result))
    }

    fn update_rounds_and_participants(
        &self,
        guild_id: &str,
        updates: Vec<RoundUpdateEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        // Validate every target first so the batch is all-or-nothing.
        let guild = guild_id.to_owned();
        let mut result = Ok(());
        for update in &updates {
            let key = (guild.clone(), update.round_id);
            let exists = self
                .rounds
                .get(&key)
                .map(|round| round.state != RoundState::Deleted)
                .unwrap_or(false);
            if !exists {
                result = Err(StorageError::not_found(format!("round `{}`", update.round_id)));
                break;
            }
        }
        if result.is_ok() {
            for update in updates {
                let _ = self.with_round(&guild, update.round_id, |stored| {
                    stored.participants = update.participants.clone();
                    Ok(())
                });
            }
        }
        Box::pin(future::ready(result))
    }

    fn upcoming_rounds(
        &self,
        guild_id: &str,
        until: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let mut rounds: Vec<RoundEntity> = self
            .rounds
            .iter()
            .filter(|entry| entry.key().0 == guild_id)
            .map(|entry| entry.value().clone())
            .filter(|round| round.state == RoundState::Upcoming && round.start_time <= until)
            .collect();
        rounds.sort_by_key(|round| round.start_time);
        Box::pin(future::ready(Ok(rounds)))
    }

    fn delete_round(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.with_round(guild_id, round_id, |stored| {
            stored.state = RoundState::Deleted;
            Ok(())
        });
        Box::pin(future::ready(result))
    }

    fn event_message_id(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let result = self.with_round(guild_id, round_id, |stored| Ok(stored.event_message_id.clone()));
        Box::pin(future::ready(result))
    }

    fn update_event_message_id(
        &self,
        guild_id: &str,
        round_id: Uuid,
        message_id: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.with_round(guild_id, round_id, |stored| {
            stored.event_message_id = Some(message_id);
            Ok(())
        });
        Box::pin(future::ready(result))
    }

    fn set_import_status(
        &self,
        guild_id: &str,
        round_id: Uuid,
        status: ImportStatusEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.with_round(guild_id, round_id, |stored| {
            stored.import_status = Some(status);
            Ok(())
        });
        Box::pin(future::ready(result))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(future::ready(Ok(())))
    }
}

/// User directory backed by a concurrent map keyed by guild.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: DashMap<String, Vec<UserRecord>>,
}

impl MemoryUserDirectory {
    /// Fresh, empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user in a guild.
    pub fn insert_user(&self, guild_id: &str, user: UserRecord) {
        self.users.entry(guild_id.to_owned()).or_default().push(user);
    }

    fn guild_users(&self, guild_id: &str) -> Vec<UserRecord> {
        self.users
            .get(guild_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn find_by_normalized_username(
        &self,
        guild_id: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Option<UserRecord>>> {
        let found = self
            .guild_users(guild_id)
            .into_iter()
            .find(|user| canonicalize_name(&user.username) == name);
        Box::pin(future::ready(Ok(found)))
    }

    fn find_by_normalized_display_name(
        &self,
        guild_id: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Option<UserRecord>>> {
        let found = self.guild_users(guild_id).into_iter().find(|user| {
            user.display_name
                .as_deref()
                .map(canonicalize_name)
                .is_some_and(|display| display == name)
        });
        Box::pin(future::ready(Ok(found)))
    }

    fn find_by_partial_name(
        &self,
        guild_id: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<UserRecord>>> {
        let query = name.to_owned();
        let candidates = self
            .guild_users(guild_id)
            .into_iter()
            .filter(|user| {
                let username = canonicalize_name(&user.username);
                let display = user.display_name.as_deref().map(canonicalize_name);
                is_partial_match(&username, &query)
                    || display.is_some_and(|display| is_partial_match(&display, &query))
            })
            .collect();
        Box::pin(future::ready(Ok(candidates)))
    }
}

/// Substring containment either way, or high Jaro-Winkler similarity.
fn is_partial_match(stored: &str, query: &str) -> bool {
    if stored.is_empty() || query.is_empty() {
        return false;
    }
    stored.contains(query)
        || query.contains(stored)
        || strsim::jaro_winkler(stored, query) >= PARTIAL_MATCH_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::round::RsvpResponse;

    fn entity(guild: &str) -> RoundEntity {
        let now = OffsetDateTime::now_utc();
        RoundEntity {
            id: Uuid::new_v4(),
            guild_id: guild.into(),
            title: "Tuesday league".into(),
            description: None,
            location: "Maple Hill".into(),
            event_type: None,
            start_time: now + time::Duration::hours(2),
            state: RoundState::Upcoming,
            created_by: "creator".into(),
            channel_id: "chan".into(),
            event_message_id: None,
            participants: Vec::new(),
            teams: Vec::new(),
            import_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn participant(user: &str) -> ParticipantEntity {
        ParticipantEntity {
            user_id: user.into(),
            response: RsvpResponse::Accept,
            tag_number: None,
            score: None,
            team_id: None,
            raw_name: None,
        }
    }

    #[tokio::test]
    async fn deleted_rounds_are_invisible() {
        let store = MemoryRoundStore::new();
        let round = entity("g");
        let id = round.id;
        store.create_round(round).await.unwrap();
        store.delete_round("g", id).await.unwrap();
        assert!(store.get_round("g", id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let store = MemoryRoundStore::new();
        let round = entity("g");
        store.create_round(round.clone()).await.unwrap();
        let err = store.create_round(round).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn update_round_preserves_import_status() {
        let store = MemoryRoundStore::new();
        let round = entity("g");
        let id = round.id;
        store.create_round(round.clone()).await.unwrap();
        store
            .set_import_status(
                "g",
                id,
                ImportStatusEntity {
                    import_id: Uuid::new_v4(),
                    state: crate::dao::models::ImportStateEntity::Pending,
                    code: None,
                    message: None,
                    updated_at: OffsetDateTime::now_utc(),
                },
            )
            .await
            .unwrap();

        let mut changed = round;
        changed.title = "Renamed".into();
        store.update_round(changed).await.unwrap();

        let stored = store.get_round("g", id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert!(stored.import_status.is_some());
    }

    #[tokio::test]
    async fn group_creation_is_guarded_against_duplicates() {
        let store = MemoryRoundStore::new();
        let round = entity("g");
        let id = round.id;
        store.create_round(round).await.unwrap();

        let groups = vec![TeamEntity {
            id: Uuid::new_v4(),
            name: "alice & bob".into(),
        }];
        store.create_round_groups("g", id, groups.clone()).await.unwrap();
        assert!(store.round_has_groups("g", id).await.unwrap());
        let err = store.create_round_groups("g", id, groups).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn batch_update_fails_whole_when_a_round_is_missing() {
        let store = MemoryRoundStore::new();
        let round = entity("g");
        let id = round.id;
        store.create_round(round).await.unwrap();

        let updates = vec![
            RoundUpdateEntity {
                round_id: Uuid::new_v4(),
                participants: vec![participant("a")],
            },
            RoundUpdateEntity {
                round_id: id,
                participants: vec![participant("b")],
            },
        ];
        let err = store
            .update_rounds_and_participants("g", updates)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        // The existing round's roster was not touched.
        assert!(store.participants("g", id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_name_match_uses_similarity() {
        let directory = MemoryUserDirectory::new();
        directory.insert_user(
            "g",
            UserRecord {
                user_id: "1".into(),
                username: "janedoe".into(),
                display_name: Some("Jane Doe".into()),
            },
        );

        let hits = directory.find_by_partial_name("g", "jane").await.unwrap();
        assert_eq!(hits.len(), 1);
        let misses = directory.find_by_partial_name("g", "zzz").await.unwrap();
        assert!(misses.is_empty());
    }
}
