use futures::future::BoxFuture;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    dao::{
        models::{ImportStatusEntity, ParticipantEntity, RoundEntity, RoundUpdateEntity, TeamEntity},
        storage::StorageResult,
    },
    state::lifecycle::RoundState,
};

/// Abstraction over the persistence layer for rounds and their rosters.
///
/// Every call is guild-scoped. Same-round serialization is the backend's
/// responsibility; the engine only assumes each call is atomic on its own.
pub trait RoundStore: Send + Sync {
    /// Persist a freshly created round.
    fn create_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a round by id. Soft-deleted rounds are not returned.
    fn get_round(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;
    /// Replace the round's descriptive fields and roster. The import status
    /// field is preserved as-is.
    fn update_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Move the round to a new lifecycle state.
    fn update_round_state(
        &self,
        guild_id: &str,
        round_id: Uuid,
        state: RoundState,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Insert or update a single participant keyed by user id.
    ///
    /// Raises a conflict when a concurrent insert wins the race on the same
    /// (round, user) key.
    fn upsert_participant(
        &self,
        guild_id: &str,
        round_id: Uuid,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove a participant's RSVP entry.
    fn remove_participant(
        &self,
        guild_id: &str,
        round_id: Uuid,
        user_id: &str,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Ordered roster of the round.
    fn participants(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>>;
    /// Store a submitted score for one participant.
    fn update_participant_score(
        &self,
        guild_id: &str,
        round_id: Uuid,
        user_id: &str,
        score: i32,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Whether the round already has team groups.
    fn round_has_groups(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Attach team groups to a round. Callers guard with
    /// [`RoundStore::round_has_groups`] so re-ingest never duplicates them.
    fn create_round_groups(
        &self,
        guild_id: &str,
        round_id: Uuid,
        groups: Vec<TeamEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Apply batch roster replacements. All-or-nothing per batch.
    fn update_rounds_and_participants(
        &self,
        guild_id: &str,
        updates: Vec<RoundUpdateEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Rounds still upcoming whose start time is before `until`.
    fn upcoming_rounds(
        &self,
        guild_id: &str,
        until: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>>;
    /// Soft-delete a round.
    fn delete_round(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Discord message currently rendering the round, if reported.
    fn event_message_id(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<String>>>;
    /// Record the Discord message rendering the round.
    fn update_event_message_id(
        &self,
        guild_id: &str,
        round_id: Uuid,
        message_id: String,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Record the state of an import attempt for observability and
    /// concurrent-import detection.
    fn set_import_status(
        &self,
        guild_id: &str,
        round_id: Uuid,
        status: ImportStatusEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
