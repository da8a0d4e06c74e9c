use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    dao::models::{ImportStatusEntity, ParticipantEntity, RoundEntity, TeamEntity},
    state::lifecycle::RoundState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoundDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub guild_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub event_type: Option<String>,
    pub start_time: DateTime,
    pub state: RoundState,
    pub created_by: String,
    pub channel_id: String,
    pub event_message_id: Option<String>,
    pub participants: Vec<ParticipantEntity>,
    #[serde(default)]
    pub teams: Vec<TeamEntity>,
    #[serde(default)]
    pub import_status: Option<ImportStatusEntity>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl From<RoundEntity> for MongoRoundDocument {
    fn from(value: RoundEntity) -> Self {
        Self {
            id: value.id,
            guild_id: value.guild_id,
            title: value.title,
            description: value.description,
            location: value.location,
            event_type: value.event_type,
            start_time: to_bson_datetime(value.start_time),
            state: value.state,
            created_by: value.created_by,
            channel_id: value.channel_id,
            event_message_id: value.event_message_id,
            participants: value.participants,
            teams: value.teams,
            import_status: value.import_status,
            created_at: to_bson_datetime(value.created_at),
            updated_at: to_bson_datetime(value.updated_at),
        }
    }
}

impl From<MongoRoundDocument> for RoundEntity {
    fn from(value: MongoRoundDocument) -> Self {
        Self {
            id: value.id,
            guild_id: value.guild_id,
            title: value.title,
            description: value.description,
            location: value.location,
            event_type: value.event_type,
            start_time: from_bson_datetime(value.start_time),
            state: value.state,
            created_by: value.created_by,
            channel_id: value.channel_id,
            event_message_id: value.event_message_id,
            participants: value.participants,
            teams: value.teams,
            import_status: value.import_status,
            created_at: from_bson_datetime(value.created_at),
            updated_at: from_bson_datetime(value.updated_at),
        }
    }
}

/// Identity record as stored in the `users` collection. Normalized columns
/// are maintained alongside the display forms so lookups never lowercase on
/// the fly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    pub guild_id: String,
    pub user_id: String,
    pub username: String,
    pub username_normalized: String,
    pub display_name: Option<String>,
    pub display_name_normalized: Option<String>,
}

pub fn to_bson_datetime(value: OffsetDateTime) -> DateTime {
    DateTime::from_millis((value.unix_timestamp_nanos() / 1_000_000) as i64)
}

pub fn from_bson_datetime(value: DateTime) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(value.timestamp_millis()) * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

/// Guild-scoped round filter that never matches soft-deleted rounds.
pub fn round_filter(guild_id: &str, round_id: Uuid) -> Document {
    doc! {
        "_id": uuid_as_binary(round_id),
        "guild_id": guild_id,
        "state": { "$ne": "deleted" },
    }
}
