//! Closed event union produced by the engine.
//!
//! One enum, exhaustively matched for topic routing, so adding a variant is
//! a compile-time-checked change everywhere it is consumed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    bus::topics,
    dto::format_timestamp,
    state::round::{Participant, Round, ScoreInfo},
};

/// Snapshot of a round carried on lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Round id.
    pub round_id: Uuid,
    /// Guild the round belongs to.
    pub guild_id: String,
    /// Channel hosting the announcement.
    pub channel_id: String,
    /// Display title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Course/venue.
    pub location: String,
    /// Optional event categorisation.
    pub event_type: Option<String>,
    /// RFC 3339 start time.
    pub start_time: String,
    /// Lifecycle state label.
    pub state: String,
    /// Creator user id.
    pub created_by: String,
    /// Discord message rendering the round, when known.
    pub event_message_id: Option<String>,
    /// Number of participants currently on the roster.
    pub participant_count: usize,
}

impl From<&Round> for RoundSummary {
    fn from(round: &Round) -> Self {
        Self {
            round_id: round.id,
            guild_id: round.guild_id.clone(),
            channel_id: round.channel_id.clone(),
            title: round.title.clone(),
            description: round.description.clone(),
            location: round.location.clone(),
            event_type: round.event_type.clone(),
            start_time: format_timestamp(round.start_time),
            state: round.state.as_str().to_owned(),
            created_by: round.created_by.clone(),
            event_message_id: round.event_message_id.clone(),
            participant_count: round.participants.len(),
        }
    }
}

/// Snapshot of one participant carried on RSVP/score events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    /// User id; empty for guests.
    pub user_id: String,
    /// RSVP label (`ACCEPT`, `TENTATIVE`, `DECLINE`).
    pub response: String,
    /// Tag number, when resolved.
    pub tag_number: Option<u32>,
    /// Submitted score, when present.
    pub score: Option<i32>,
    /// Raw scorecard name for guests.
    pub raw_name: Option<String>,
}

impl From<&Participant> for ParticipantSummary {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id.clone(),
            response: participant.response.as_str().to_owned(),
            tag_number: participant.tag_number,
            score: participant.score,
            raw_name: participant.raw_name.clone(),
        }
    }
}

/// One scored entry handed to the scoring module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// User id; empty for guests.
    pub user_id: String,
    /// Total strokes.
    pub score: i32,
    /// Tag number, singles mode only.
    pub tag_number: Option<u32>,
    /// Raw scorecard name for guests.
    pub raw_name: Option<String>,
}

impl From<&ScoreInfo> for ScoreEntry {
    fn from(info: &ScoreInfo) -> Self {
        Self {
            user_id: info.user_id.clone(),
            score: info.score,
            tag_number: info.tag_number,
            raw_name: info.raw_name.clone(),
        }
    }
}

/// Import pipeline completion payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportCompletedEvent {
    /// Guild the round belongs to.
    pub guild_id: String,
    /// Round scores were applied to.
    pub round_id: Uuid,
    /// Import attempt id.
    pub import_id: Uuid,
    /// Scorecard mode label (`singles`, `doubles`, `triples`).
    pub mode: String,
    /// Number of participants whose scores were written.
    pub updated: usize,
    /// Scorecard names that could not be resolved to users.
    pub skipped: Vec<String>,
}

/// Import pipeline failure payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFailedEvent {
    /// Guild the round belongs to.
    pub guild_id: String,
    /// Round the import targeted.
    pub round_id: Uuid,
    /// Import attempt id.
    pub import_id: Uuid,
    /// Requesting user.
    pub user_id: String,
    /// Channel for error reporting.
    pub channel_id: String,
    /// Stable failure code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

/// Everything the engine announces to downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RoundEvent {
    /// A round was created.
    Created(RoundSummary),
    /// A round's descriptive fields changed.
    Updated(RoundSummary),
    /// A participant joined or changed their RSVP.
    Joined {
        /// Guild the round belongs to.
        guild_id: String,
        /// Round joined.
        round_id: Uuid,
        /// The participant after the change.
        participant: ParticipantSummary,
        /// Whether the round had already begun.
        joined_late: bool,
    },
    /// A participant's RSVP was toggled away.
    ParticipantRemoved {
        /// Guild the round belongs to.
        guild_id: String,
        /// Round left.
        round_id: Uuid,
        /// User removed.
        user_id: String,
        /// RSVP label the participant held before removal.
        current_status: String,
    },
    /// A score was stored.
    ScoreUpdated {
        /// Guild the round belongs to.
        guild_id: String,
        /// Round scored.
        round_id: Uuid,
        /// Participant scored.
        user_id: String,
        /// Total strokes.
        score: i32,
        /// Whether every playing participant now has a score.
        all_scored: bool,
    },
    /// A round reached the finalized state.
    Finalized(RoundSummary),
    /// Scores are ready for the downstream scoring module.
    ScoresReady {
        /// Guild the round belongs to.
        guild_id: String,
        /// Finalized round.
        round_id: Uuid,
        /// Every participant with a submitted score.
        scores: Vec<ScoreEntry>,
    },
    /// A round was deleted.
    Deleted {
        /// Guild the round belongs to.
        guild_id: String,
        /// Deleted round.
        round_id: Uuid,
    },
    /// A round moved to in-progress.
    Started(RoundSummary),
    /// A reminder should be rendered to the round's channel.
    ReminderDue {
        /// Guild the round belongs to.
        guild_id: String,
        /// Round starting soon.
        round_id: Uuid,
        /// Channel to notify.
        channel_id: String,
        /// Round title for the notification text.
        title: String,
        /// RFC 3339 start time.
        start_time: String,
    },
    /// An import finished and scores were applied.
    ImportCompleted(ImportCompletedEvent),
    /// An import failed with a structured code.
    ImportFailed(ImportFailedEvent),
}

impl RoundEvent {
    /// Topic the event is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            RoundEvent::Created(_) => topics::ROUND_CREATED,
            RoundEvent::Updated(_) => topics::ROUND_UPDATED,
            RoundEvent::Joined { .. } => topics::PARTICIPANT_JOINED,
            RoundEvent::ParticipantRemoved { .. } => topics::PARTICIPANT_REMOVED,
            RoundEvent::ScoreUpdated { .. } => topics::ROUND_SCORE_UPDATED,
            RoundEvent::Finalized(_) => topics::ROUND_FINALIZED,
            RoundEvent::ScoresReady { .. } => topics::ROUND_SCORES_READY,
            RoundEvent::Deleted { .. } => topics::ROUND_DELETED,
            RoundEvent::Started(_) => topics::ROUND_STARTED,
            RoundEvent::ReminderDue { .. } => topics::ROUND_REMINDER,
            RoundEvent::ImportCompleted(_) => topics::IMPORT_COMPLETED,
            RoundEvent::ImportFailed(_) => topics::IMPORT_FAILED,
        }
    }
}
