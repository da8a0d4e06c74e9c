//! Inbound command payloads with their validation rules.
//!
//! Derived rules cover shape-level problems; business messages the
//! presentation layer shows verbatim ("Title is required", ...) are raised
//! by the services with explicit checks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{dto::validation::validate_snowflake, state::round::RsvpResponse};

/// Create a new round in the Upcoming state.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRoundRequest {
    /// Guild the round belongs to.
    #[validate(custom(function = "validate_snowflake"))]
    pub guild_id: String,
    /// Channel hosting the round announcement.
    #[validate(custom(function = "validate_snowflake"))]
    pub channel_id: String,
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
    /// Start time: RFC 3339, or `YYYY-MM-DD HH:MM` interpreted as UTC.
    pub start_time: String,
    /// User creating the round.
    #[validate(custom(function = "validate_snowflake"))]
    pub created_by: String,
}

/// Patch a round's descriptive fields. `None` fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateRoundRequest {
    /// Guild the round belongs to.
    #[validate(custom(function = "validate_snowflake"))]
    pub guild_id: String,
    /// Round to patch.
    pub round_id: Uuid,
    /// Replacement title.
    #[serde(default)]
    pub title: Option<String>,
    /// Replacement description.
    #[serde(default)]
    pub description: Option<String>,
    /// Replacement location.
    #[serde(default)]
    pub location: Option<String>,
    /// Replacement event type.
    #[serde(default)]
    pub event_type: Option<String>,
    /// Replacement start time, same formats as creation.
    #[serde(default)]
    pub start_time: Option<String>,
}

/// RSVP to a round. Submitting the response a participant already holds
/// toggles the RSVP away instead of re-asserting it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JoinRoundRequest {
    /// Guild the round belongs to.
    #[validate(custom(function = "validate_snowflake"))]
    pub guild_id: String,
    /// Round being joined.
    pub round_id: Uuid,
    /// User responding.
    pub user_id: String,
    /// Requested RSVP answer.
    pub response: RsvpResponse,
}

/// Submit a score for one participant.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScoreUpdateRequest {
    /// Guild the round belongs to.
    #[validate(custom(function = "validate_snowflake"))]
    pub guild_id: String,
    /// Round being scored.
    pub round_id: Uuid,
    /// Participant the score belongs to.
    pub user_id: String,
    /// Total strokes. Required; kept optional in the shape so the missing
    /// case yields a domain message instead of a deserialization error.
    #[serde(default)]
    pub score: Option<i32>,
}

/// Finalize a round and hand its scores to the scoring module.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FinalizeRoundRequest {
    /// Guild the round belongs to.
    #[validate(custom(function = "validate_snowflake"))]
    pub guild_id: String,
    /// Round to finalize.
    pub round_id: Uuid,
}

/// Delete a round. Allowed for the creator or a privileged role.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeleteRoundRequest {
    /// Guild the round belongs to.
    #[validate(custom(function = "validate_snowflake"))]
    pub guild_id: String,
    /// Round to delete.
    pub round_id: Uuid,
    /// User asking for the deletion.
    #[validate(custom(function = "validate_snowflake"))]
    pub requested_by: String,
}

/// Presentation module reports the message rendering a round.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetEventMessageRequest {
    /// Guild the round belongs to.
    #[validate(custom(function = "validate_snowflake"))]
    pub guild_id: String,
    /// Round the message belongs to.
    pub round_id: Uuid,
    /// Discord message id hosting the round embed.
    #[validate(custom(function = "validate_snowflake"))]
    pub event_message_id: String,
}

/// Where the scorecard bytes come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportSource {
    /// Fetch an export from an allowlisted host.
    Url {
        /// Export URL as supplied by the user.
        url: String,
    },
    /// Bytes uploaded directly through Discord.
    Upload {
        /// Original file name; the extension selects the parser.
        filename: String,
        /// Raw file content.
        content: Vec<u8>,
    },
}

/// Run the scorecard import pipeline against a round.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ImportRequest {
    /// Guild the round belongs to.
    #[validate(custom(function = "validate_snowflake"))]
    pub guild_id: String,
    /// Round to import into.
    pub round_id: Uuid,
    /// User who requested the import.
    #[validate(custom(function = "validate_snowflake"))]
    pub user_id: String,
    /// Channel the request came from, used for error reporting.
    #[validate(custom(function = "validate_snowflake"))]
    pub channel_id: String,
    /// Scorecard source.
    pub source: ImportSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn create_request_rejects_non_numeric_ids() {
        let request = CreateRoundRequest {
            guild_id: "not-a-snowflake".into(),
            channel_id: "123".into(),
            title: "Tuesday league".into(),
            description: None,
            location: "Maple Hill".into(),
            event_type: None,
            start_time: "2026-09-01T18:00:00Z".into(),
            created_by: "456".into(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn import_source_round_trips_through_json() {
        let source = ImportSource::Upload {
            filename: "scores.csv".into(),
            content: vec![1, 2, 3],
        };
        let json = serde_json::to_string(&source).unwrap();
        let back: ImportSource = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ImportSource::Upload { ref filename, .. } if filename == "scores.csv"));
    }
}
