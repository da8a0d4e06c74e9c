use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a round.
///
/// States move forward only: `Upcoming → InProgress → Finalized`. A forward
/// skip (`Upcoming → Finalized`) is allowed so a completed import can close a
/// round whose start timer never fired. `Deleted` is reachable from any
/// non-finalized state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    /// Scheduled but not yet started; participants can RSVP freely.
    Upcoming,
    /// The start trigger fired; scores are being submitted.
    InProgress,
    /// Scores are locked in and handed to the scoring module.
    Finalized,
    /// Soft-deleted; invisible to every other operation.
    Deleted,
}

/// Error returned when a lifecycle transition is not allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid round transition: {from:?} cannot move to {to:?}")]
pub struct InvalidTransition {
    /// State the round was in.
    pub from: RoundState,
    /// State the caller asked for.
    pub to: RoundState,
}

impl RoundState {
    /// Validate that this state may transition to `to`.
    pub fn validate_transition(self, to: RoundState) -> Result<(), InvalidTransition> {
        use RoundState::*;

        match (self, to) {
            (Upcoming, InProgress) => Ok(()),
            (Upcoming, Finalized) => Ok(()),
            (InProgress, Finalized) => Ok(()),
            (Upcoming, Deleted) | (InProgress, Deleted) => Ok(()),
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }

    /// Whether a new Accept/Tentative RSVP in this state counts as a late join.
    pub fn has_begun(self) -> bool {
        matches!(self, RoundState::InProgress | RoundState::Finalized)
    }

    /// Whether the round still accepts score submissions. RSVPs stay open
    /// in every visible state; playing RSVPs after the start are late joins.
    pub fn is_active(self) -> bool {
        matches!(self, RoundState::Upcoming | RoundState::InProgress)
    }

    /// Stable lowercase label used in persisted documents and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            RoundState::Upcoming => "upcoming",
            RoundState::InProgress => "in_progress",
            RoundState::Finalized => "finalized",
            RoundState::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for RoundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
