use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    dao::models::{ParticipantEntity, RoundEntity, TeamEntity},
    state::lifecycle::RoundState,
};

/// A participant's RSVP answer.
///
/// Serialized in SCREAMING_SNAKE_CASE because that is the wire form the
/// Discord presentation module matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsvpResponse {
    /// Playing.
    Accept,
    /// Might play.
    Tentative,
    /// Not playing.
    Decline,
}

impl RsvpResponse {
    /// Wire/label form of the response (`ACCEPT`, `TENTATIVE`, `DECLINE`).
    pub fn as_str(self) -> &'static str {
        match self {
            RsvpResponse::Accept => "ACCEPT",
            RsvpResponse::Tentative => "TENTATIVE",
            RsvpResponse::Decline => "DECLINE",
        }
    }

    /// Whether this response makes the participant count toward scoring.
    pub fn is_playing(self) -> bool {
        matches!(self, RsvpResponse::Accept | RsvpResponse::Tentative)
    }
}

impl std::fmt::Display for RsvpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's RSVP/score/tag record attached to a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Discord user id. Empty only for imported guest rows.
    pub user_id: String,
    /// Current RSVP answer.
    pub response: RsvpResponse,
    /// External ranking tag, only meaningful in singles mode.
    pub tag_number: Option<u32>,
    /// Submitted total strokes, if any.
    pub score: Option<i32>,
    /// Group the participant belongs to in team mode.
    pub team_id: Option<Uuid>,
    /// Scorecard name for rows that never resolved to a user id.
    pub raw_name: Option<String>,
}

impl Participant {
    /// Fresh RSVP entry for a known user.
    pub fn new(user_id: impl Into<String>, response: RsvpResponse) -> Self {
        Self {
            user_id: user_id.into(),
            response,
            tag_number: None,
            score: None,
            team_id: None,
            raw_name: None,
        }
    }

    /// Whether this entry is an imported guest with no linked identity.
    pub fn is_guest(&self) -> bool {
        self.user_id.is_empty()
    }
}

/// A doubles/triples group inside a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Stable group identifier.
    pub id: Uuid,
    /// Display name, usually the joint scorecard cell (`"Alice & Bob"`).
    pub name: String,
}

/// Transient scoring record moved between pipeline stages.
///
/// Decoupled from [`Participant`] so import stages never mutate persisted
/// shapes in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreInfo {
    /// Resolved user id; empty for guest rows.
    pub user_id: String,
    /// Total strokes.
    pub score: i32,
    /// Tag number carried through when already known.
    pub tag_number: Option<u32>,
    /// Group assignment in team mode.
    pub team_id: Option<Uuid>,
    /// Original scorecard name, kept for guests and reporting.
    pub raw_name: Option<String>,
}

/// A single scheduled scoring event with lifecycle state and participants.
#[derive(Debug, Clone)]
pub struct Round {
    /// Primary key.
    pub id: Uuid,
    /// Guild the round belongs to; every operation is scoped by it.
    pub guild_id: String,
    /// Display title.
    pub title: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Course/venue.
    pub location: String,
    /// Optional event categorisation (league night, casual, ...).
    pub event_type: Option<String>,
    /// Scheduled tee-off time.
    pub start_time: OffsetDateTime,
    /// Lifecycle state.
    pub state: RoundState,
    /// User who created the round.
    pub created_by: String,
    /// Channel hosting the round's announcement.
    pub channel_id: String,
    /// Discord message rendering this round, once the presentation
    /// module reports it.
    pub event_message_id: Option<String>,
    /// Ordered RSVP list.
    pub participants: Vec<Participant>,
    /// Team groups; non-empty means the round is in team mode and
    /// participant tag numbers are not meaningful.
    pub teams: Vec<Team>,
    /// Creation timestamp.
    pub created_at: OffsetDateTime,
    /// Last mutation timestamp.
    pub updated_at: OffsetDateTime,
}

impl Round {
    /// Whether the round tracks group scores rather than individual tags.
    pub fn is_team_mode(&self) -> bool {
        !self.teams.is_empty()
    }

    /// Look up a participant by user id. Guest rows are never returned.
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        if user_id.is_empty() {
            return None;
        }
        self.participants
            .iter()
            .find(|participant| participant.user_id == user_id)
    }

    /// True when every Accept/Tentative participant has submitted a score.
    ///
    /// An empty roster (or one with only declines) never counts as fully
    /// scored, so it cannot trigger finalization by itself.
    pub fn all_playing_scored(&self) -> bool {
        let mut playing = 0;
        for participant in &self.participants {
            if participant.response.is_playing() {
                playing += 1;
                if participant.score.is_none() {
                    return false;
                }
            }
        }
        playing > 0
    }

    /// Scoring records for every participant with a submitted score.
    pub fn scored_entries(&self) -> Vec<ScoreInfo> {
        self.participants
            .iter()
            .filter_map(|participant| {
                participant.score.map(|score| ScoreInfo {
                    user_id: participant.user_id.clone(),
                    score,
                    tag_number: participant.tag_number,
                    team_id: participant.team_id,
                    raw_name: participant.raw_name.clone(),
                })
            })
            .collect()
    }
}

impl From<ParticipantEntity> for Participant {
    fn from(value: ParticipantEntity) -> Self {
        Self {
            user_id: value.user_id,
            response: value.response,
            tag_number: value.tag_number,
            score: value.score,
            team_id: value.team_id,
            raw_name: value.raw_name,
        }
    }
}

impl From<Participant> for ParticipantEntity {
    fn from(value: Participant) -> Self {
        Self {
            user_id: value.user_id,
            response: value.response,
            tag_number: value.tag_number,
            score: value.score,
            team_id: value.team_id,
            raw_name: value.raw_name,
        }
    }
}

impl From<TeamEntity> for Team {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

impl From<Team> for TeamEntity {
    fn from(value: Team) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

impl From<RoundEntity> for Round {
    fn from(value: RoundEntity) -> Self {
        Self {
            id: value.id,
            guild_id: value.guild_id,
            title: value.title,
            description: value.description,
            location: value.location,
            event_type: value.event_type,
            start_time: value.start_time,
            state: value.state,
            created_by: value.created_by,
            channel_id: value.channel_id,
            event_message_id: value.event_message_id,
            participants: value.participants.into_iter().map(Into::into).collect(),
            teams: value.teams.into_iter().map(Into::into).collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<Round> for RoundEntity {
    fn from(value: Round) -> Self {
        Self {
            id: value.id,
            guild_id: value.guild_id,
            title: value.title,
            description: value.description,
            location: value.location,
            event_type: value.event_type,
            start_time: value.start_time,
            state: value.state,
            created_by: value.created_by,
            channel_id: value.channel_id,
            event_message_id: value.event_message_id,
            participants: value.participants.into_iter().map(Into::into).collect(),
            teams: value.teams.into_iter().map(Into::into).collect(),
            import_status: None,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_with(participants: Vec<Participant>) -> Round {
        let now = OffsetDateTime::now_utc();
        Round {
            id: Uuid::new_v4(),
            guild_id: "guild-1".into(),
            title: "Tuesday league".into(),
            description: None,
            location: "Maple Hill".into(),
            event_type: None,
            start_time: now,
            state: RoundState::InProgress,
            created_by: "user-1".into(),
            channel_id: "chan-1".into(),
            event_message_id: None,
            participants,
            teams: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn scored(user: &str, score: i32) -> Participant {
        Participant {
            score: Some(score),
            ..Participant::new(user, RsvpResponse::Accept)
        }
    }

    #[test]
    fn all_playing_scored_requires_every_active_score() {
        let mut round = round_with(vec![
            scored("a", 54),
            Participant::new("b", RsvpResponse::Tentative),
        ]);
        assert!(!round.all_playing_scored());

        round.participants[1].score = Some(58);
        assert!(round.all_playing_scored());
    }

    #[test]
    fn declines_do_not_block_full_scoring() {
        let round = round_with(vec![
            scored("a", 54),
            Participant::new("b", RsvpResponse::Decline),
        ]);
        assert!(round.all_playing_scored());
    }

    #[test]
    fn empty_roster_is_never_fully_scored() {
        let round = round_with(Vec::new());
        assert!(!round.all_playing_scored());
    }

    #[test]
    fn guest_lookup_by_empty_id_finds_nothing() {
        let mut guest = Participant::new("", RsvpResponse::Accept);
        guest.raw_name = Some("Wandering Pro".into());
        let round = round_with(vec![guest]);
        assert!(round.participant("").is_none());
    }
}
