use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::{lifecycle::RoundState, round::RsvpResponse};

/// Persisted RSVP/score record attached to a round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantEntity {
    /// Discord user id. Empty only for imported guest rows.
    pub user_id: String,
    /// Current RSVP answer.
    pub response: RsvpResponse,
    /// External ranking tag, singles mode only.
    #[serde(default)]
    pub tag_number: Option<u32>,
    /// Submitted total strokes, if any.
    #[serde(default)]
    pub score: Option<i32>,
    /// Group membership in team mode.
    #[serde(default)]
    pub team_id: Option<Uuid>,
    /// Scorecard name kept for rows that never resolved to a user id.
    #[serde(default)]
    pub raw_name: Option<String>,
}

/// Persisted doubles/triples group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Stable group identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

/// Terminal state of a scorecard import attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImportStateEntity {
    /// Import accepted and running.
    Pending,
    /// Import applied successfully.
    Completed,
    /// Import failed with a structured code.
    Failed,
}

/// Observability record for an in-flight or finished import, stored on the
/// round so concurrent attempts can be detected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportStatusEntity {
    /// Identifier of the import attempt.
    pub import_id: Uuid,
    /// Pending, completed, or failed.
    pub state: ImportStateEntity,
    /// Structured failure code, set only for failed imports.
    #[serde(default)]
    pub code: Option<String>,
    /// Human readable failure message, set only for failed imports.
    #[serde(default)]
    pub message: Option<String>,
    /// When the status last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Aggregate round entity persisted by the storage layer.
///
/// `import_status` is owned by `set_import_status`; `update_round` must
/// leave it untouched so a roster write cannot clobber an in-flight import.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundEntity {
    /// Primary key of the round.
    pub id: Uuid,
    /// Guild the round belongs to.
    pub guild_id: String,
    /// Display title.
    pub title: String,
    /// Optional free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Course/venue.
    pub location: String,
    /// Optional event categorisation.
    #[serde(default)]
    pub event_type: Option<String>,
    /// Scheduled tee-off time.
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    /// Lifecycle state.
    pub state: RoundState,
    /// User who created the round.
    pub created_by: String,
    /// Channel hosting the round's announcement.
    pub channel_id: String,
    /// Discord message rendering this round.
    #[serde(default)]
    pub event_message_id: Option<String>,
    /// Ordered RSVP list.
    pub participants: Vec<ParticipantEntity>,
    /// Team groups; non-empty means team mode.
    #[serde(default)]
    pub teams: Vec<TeamEntity>,
    /// Latest import attempt, if any.
    #[serde(default)]
    pub import_status: Option<ImportStatusEntity>,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last mutation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Batch unit replacing a round's whole participant list.
///
/// Applying one is all-or-nothing for that round; team-mode imports rely on
/// this to avoid partial roster writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundUpdateEntity {
    /// Round whose roster is replaced.
    pub round_id: Uuid,
    /// Full replacement participant list.
    pub participants: Vec<ParticipantEntity>,
}
