use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures specific to the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save round `{id}`")]
    SaveRound {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load round `{id}`")]
    LoadRound {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update round `{id}`")]
    UpdateRound {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list rounds for guild `{guild_id}`")]
    ListRounds {
        guild_id: String,
        #[source]
        source: MongoError,
    },
    #[error("batch roster update failed")]
    BatchUpdate {
        #[source]
        source: MongoError,
    },
    #[error("failed to query users")]
    FindUsers {
        #[source]
        source: MongoError,
    },
}
