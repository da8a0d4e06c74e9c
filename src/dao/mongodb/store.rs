//! `RoundStore` and `UserDirectory` implementations backed by MongoDB.

use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoRoundDocument, MongoUserDocument, round_filter, to_bson_datetime},
};
use crate::{
    dao::{
        models::{ImportStatusEntity, ParticipantEntity, RoundEntity, RoundUpdateEntity, TeamEntity},
        round_store::RoundStore,
        storage::{StorageError, StorageResult},
        user_directory::{UserDirectory, UserRecord},
    },
    state::lifecycle::RoundState,
};

const ROUND_COLLECTION_NAME: &str = "rounds";
const USER_COLLECTION_NAME: &str = "users";

#[derive(Clone)]
pub struct MongoRoundStore {
    inner: Arc<MongoInner>,
}

/// Directory view over the same connection as [`MongoRoundStore`].
#[derive(Clone)]
pub struct MongoUserDirectory {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }

    async fn client(&self) -> Client {
        let guard = self.state.read().await;
        guard.client.clone()
    }

    async fn rounds(&self) -> Collection<MongoRoundDocument> {
        let guard = self.state.read().await;
        guard
            .database
            .collection::<MongoRoundDocument>(ROUND_COLLECTION_NAME)
    }

    async fn users(&self) -> Collection<MongoUserDocument> {
        let guard = self.state.read().await;
        guard
            .database
            .collection::<MongoUserDocument>(USER_COLLECTION_NAME)
    }
}

impl MongoRoundStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Directory handle sharing this store's connection.
    pub fn user_directory(&self) -> MongoUserDirectory {
        MongoUserDirectory {
            inner: self.inner.clone(),
        }
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let rounds = self.inner.rounds().await;
        let round_index = mongodb::IndexModel::builder()
            .keys(doc! {"guild_id": 1, "start_time": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("round_guild_start_idx".to_owned()))
                    .build(),
            )
            .build();
        rounds
            .create_index(round_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROUND_COLLECTION_NAME,
                index: "guild_id,start_time",
                source,
            })?;

        let users = self.inner.users().await;
        let user_index = mongodb::IndexModel::builder()
            .keys(doc! {"guild_id": 1, "username_normalized": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("user_guild_name_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        users
            .create_index(user_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: USER_COLLECTION_NAME,
                index: "guild_id,username_normalized",
                source,
            })?;

        Ok(())
    }

    async fn load_document(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> StorageResult<Option<MongoRoundDocument>> {
        let collection = self.inner.rounds().await;
        collection
            .find_one(round_filter(guild_id, round_id))
            .await
            .map_err(|source| MongoDaoError::LoadRound {
                id: round_id,
                source,
            })
            .map_err(Into::into)
    }

    async fn require_document(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> StorageResult<MongoRoundDocument> {
        self.load_document(guild_id, round_id)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("round `{round_id}`")))
    }

    /// Replace the stored document in place, stamping `updated_at`.
    async fn replace_document(&self, mut document: MongoRoundDocument) -> StorageResult<()> {
        document.updated_at = to_bson_datetime(OffsetDateTime::now_utc());
        let id = document.id;
        let guild_id = document.guild_id.clone();
        let collection = self.inner.rounds().await;
        collection
            .replace_one(round_filter(&guild_id, id), &document)
            .await
            .map_err(|source| MongoDaoError::UpdateRound { id, source })?;
        Ok(())
    }
}

impl RoundStore for MongoRoundStore {
    fn create_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = round.id;
            let document: MongoRoundDocument = round.into();
            let collection = store.inner.rounds().await;
            match collection.insert_one(&document).await {
                Ok(_) => Ok(()),
                Err(err) if is_duplicate_key(&err) => Err(StorageError::conflict(format!(
                    "round `{id}` already exists"
                ))),
                Err(source) => Err(MongoDaoError::SaveRound { id, source }.into()),
            }
        })
    }

    fn get_round(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        Box::pin(async move {
            let document = store.load_document(&guild_id, round_id).await?;
            Ok(document.map(Into::into))
        })
    }

    fn update_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let existing = store.require_document(&round.guild_id, round.id).await?;
            let mut document: MongoRoundDocument = round.into();
            // Import status is owned by set_import_status.
            document.import_status = existing.import_status;
            document.created_at = existing.created_at;
            store.replace_document(document).await
        })
    }

    fn update_round_state(
        &self,
        guild_id: &str,
        round_id: Uuid,
        state: RoundState,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        Box::pin(async move {
            let collection = store.inner.rounds().await;
            let now = to_bson_datetime(OffsetDateTime::now_utc());
            let result = collection
                .update_one(
                    round_filter(&guild_id, round_id),
                    doc! {"$set": {"state": state.as_str(), "updated_at": now}},
                )
                .await
                .map_err(|source| MongoDaoError::UpdateRound {
                    id: round_id,
                    source,
                })?;
            if result.matched_count == 0 {
                return Err(StorageError::not_found(format!("round `{round_id}`")));
            }
            Ok(())
        })
    }

    fn upsert_participant(
        &self,
        guild_id: &str,
        round_id: Uuid,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        Box::pin(async move {
            let mut document = store.require_document(&guild_id, round_id).await?;
            match document
                .participants
                .iter_mut()
                .find(|existing| existing.user_id == participant.user_id)
            {
                Some(existing) => *existing = participant,
                None => document.participants.push(participant),
            }
            store.replace_document(document).await
        })
    }

    fn remove_participant(
        &self,
        guild_id: &str,
        round_id: Uuid,
        user_id: &str,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        let user_id = user_id.to_owned();
        Box::pin(async move {
            let collection = store.inner.rounds().await;
            let result = collection
                .update_one(
                    round_filter(&guild_id, round_id),
                    doc! {"$pull": {"participants": {"user_id": &user_id}}},
                )
                .await
                .map_err(|source| MongoDaoError::UpdateRound {
                    id: round_id,
                    source,
                })?;
            if result.matched_count == 0 {
                return Err(StorageError::not_found(format!("round `{round_id}`")));
            }
            if result.modified_count == 0 {
                return Err(StorageError::not_found(format!("participant `{user_id}`")));
            }
            Ok(())
        })
    }

    fn participants(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        Box::pin(async move {
            let document = store.require_document(&guild_id, round_id).await?;
            Ok(document.participants)
        })
    }

    fn update_participant_score(
        &self,
        guild_id: &str,
        round_id: Uuid,
        user_id: &str,
        score: i32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        let user_id = user_id.to_owned();
        Box::pin(async move {
            let collection = store.inner.rounds().await;
            let now = to_bson_datetime(OffsetDateTime::now_utc());
            let result = collection
                .update_one(
                    round_filter(&guild_id, round_id),
                    doc! {"$set": {"participants.$[p].score": score, "updated_at": now}},
                )
                .array_filters(vec![doc! {"p.user_id": &user_id}])
                .await
                .map_err(|source| MongoDaoError::UpdateRound {
                    id: round_id,
                    source,
                })?;
            if result.matched_count == 0 {
                return Err(StorageError::not_found(format!("round `{round_id}`")));
            }
            if result.modified_count == 0 {
                // Either the participant is absent or the same score was
                // already stored; only the former is an error.
                let document = store.require_document(&guild_id, round_id).await?;
                let known = document
                    .participants
                    .iter()
                    .any(|participant| participant.user_id == user_id);
                if !known {
                    return Err(StorageError::not_found(format!("participant `{user_id}`")));
                }
            }
            Ok(())
        })
    }

    fn round_has_groups(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        Box::pin(async move {
            let document = store.require_document(&guild_id, round_id).await?;
            Ok(!document.teams.is_empty())
        })
    }

    fn create_round_groups(
        &self,
        guild_id: &str,
        round_id: Uuid,
        groups: Vec<TeamEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        Box::pin(async move {
            let mut document = store.require_document(&guild_id, round_id).await?;
            if !document.teams.is_empty() {
                return Err(StorageError::conflict(format!(
                    "round `{round_id}` already has groups"
                )));
            }
            document.teams = groups;
            store.replace_document(document).await
        })
    }

    fn update_rounds_and_participants(
        &self,
        guild_id: &str,
        updates: Vec<RoundUpdateEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        Box::pin(async move {
            let client = store.inner.client().await;
            let collection = store.inner.rounds().await;

            let mut session = client
                .start_session()
                .await
                .map_err(|source| MongoDaoError::BatchUpdate { source })?;
            session
                .start_transaction()
                .await
                .map_err(|source| MongoDaoError::BatchUpdate { source })?;

            let now = to_bson_datetime(OffsetDateTime::now_utc());
            for update in updates {
                let outcome = collection
                    .update_one(
                        round_filter(&guild_id, update.round_id),
                        doc! {"$set": {
                            "participants": participants_to_bson(&update.participants)?,
                            "updated_at": now,
                        }},
                    )
                    .session(&mut session)
                    .await;

                let failed = match outcome {
                    Ok(result) if result.matched_count == 0 => {
                        Some(StorageError::not_found(format!("round `{}`", update.round_id)))
                    }
                    Ok(_) => None,
                    Err(source) => Some(MongoDaoError::BatchUpdate { source }.into()),
                };

                if let Some(err) = failed {
                    let _ = session.abort_transaction().await;
                    return Err(err);
                }
            }

            session
                .commit_transaction()
                .await
                .map_err(|source| MongoDaoError::BatchUpdate { source })?;
            Ok(())
        })
    }

    fn upcoming_rounds(
        &self,
        guild_id: &str,
        until: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        Box::pin(async move {
            let collection = store.inner.rounds().await;
            let documents: Vec<MongoRoundDocument> = collection
                .find(doc! {
                    "guild_id": &guild_id,
                    "state": "upcoming",
                    "start_time": { "$lte": to_bson_datetime(until) },
                })
                .sort(doc! {"start_time": 1})
                .await
                .map_err(|source| MongoDaoError::ListRounds {
                    guild_id: guild_id.clone(),
                    source,
                })?
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::ListRounds {
                    guild_id: guild_id.clone(),
                    source,
                })?;

            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn delete_round(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.update_round_state(guild_id, round_id, RoundState::Deleted)
    }

    fn event_message_id(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        Box::pin(async move {
            let document = store.require_document(&guild_id, round_id).await?;
            Ok(document.event_message_id)
        })
    }

    fn update_event_message_id(
        &self,
        guild_id: &str,
        round_id: Uuid,
        message_id: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        Box::pin(async move {
            let collection = store.inner.rounds().await;
            let now = to_bson_datetime(OffsetDateTime::now_utc());
            let result = collection
                .update_one(
                    round_filter(&guild_id, round_id),
                    doc! {"$set": {"event_message_id": &message_id, "updated_at": now}},
                )
                .await
                .map_err(|source| MongoDaoError::UpdateRound {
                    id: round_id,
                    source,
                })?;
            if result.matched_count == 0 {
                return Err(StorageError::not_found(format!("round `{round_id}`")));
            }
            Ok(())
        })
    }

    fn set_import_status(
        &self,
        guild_id: &str,
        round_id: Uuid,
        status: ImportStatusEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let guild_id = guild_id.to_owned();
        Box::pin(async move {
            let mut document = store.require_document(&guild_id, round_id).await?;
            document.import_status = Some(status);
            store.replace_document(document).await
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

impl UserDirectory for MongoUserDirectory {
    fn find_by_normalized_username(
        &self,
        guild_id: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Option<UserRecord>>> {
        let directory = self.clone();
        let filter = doc! {"guild_id": guild_id, "username_normalized": name};
        Box::pin(async move {
            let users = directory.inner.users().await;
            let found = users
                .find_one(filter)
                .await
                .map_err(|source| MongoDaoError::FindUsers { source })?;
            Ok(found.map(user_record))
        })
    }

    fn find_by_normalized_display_name(
        &self,
        guild_id: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Option<UserRecord>>> {
        let directory = self.clone();
        let filter = doc! {"guild_id": guild_id, "display_name_normalized": name};
        Box::pin(async move {
            let users = directory.inner.users().await;
            let found = users
                .find_one(filter)
                .await
                .map_err(|source| MongoDaoError::FindUsers { source })?;
            Ok(found.map(user_record))
        })
    }

    fn find_by_partial_name(
        &self,
        guild_id: &str,
        name: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<UserRecord>>> {
        let directory = self.clone();
        let pattern = regex_escape(name);
        let filter = doc! {
            "guild_id": guild_id,
            "$or": [
                {"username_normalized": {"$regex": &pattern}},
                {"display_name_normalized": {"$regex": &pattern}},
            ],
        };
        Box::pin(async move {
            let users = directory.inner.users().await;
            let documents: Vec<MongoUserDocument> = users
                .find(filter)
                .await
                .map_err(|source| MongoDaoError::FindUsers { source })?
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::FindUsers { source })?;
            Ok(documents.into_iter().map(user_record).collect())
        })
    }
}

fn user_record(document: MongoUserDocument) -> UserRecord {
    UserRecord {
        user_id: document.user_id,
        username: document.username,
        display_name: document.display_name,
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == 11_000
    )
}

fn participants_to_bson(
    participants: &[ParticipantEntity],
) -> StorageResult<mongodb::bson::Bson> {
    mongodb::bson::serialize_to_bson(participants)
        .map_err(|source| StorageError::unavailable("failed to encode roster".into(), source))
}

fn regex_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if !c.is_alphanumeric() && c != ' ' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
