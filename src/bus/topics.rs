//! Well-known topic names shared by the engine and its sibling modules.

/// Create a round.
pub const ROUND_CREATE: &str = "round.create";
/// Patch a round's descriptive fields.
pub const ROUND_UPDATE: &str = "round.update";
/// RSVP to a round (or toggle an existing RSVP away).
pub const ROUND_JOIN: &str = "round.join";
/// Submit or change a participant score.
pub const ROUND_SCORE_UPDATE: &str = "round.score.update";
/// Finalize a round and hand scores to the scoring module.
pub const ROUND_FINALIZE: &str = "round.finalize";
/// Delete a round (authorization-gated).
pub const ROUND_DELETE: &str = "round.delete";
/// Run the scorecard import pipeline.
pub const ROUND_IMPORT: &str = "round.import";
/// Presentation module reports the Discord message hosting a round.
pub const ROUND_EVENT_MESSAGE: &str = "round.event_message_id";

/// Scheduler fired a reminder job.
pub const TIMER_REMINDER_DUE: &str = "round.timer.reminder";
/// Scheduler fired a round-start job.
pub const TIMER_START_DUE: &str = "round.timer.start";

/// A round was created.
pub const ROUND_CREATED: &str = "round.created";
/// A round's descriptive fields changed.
pub const ROUND_UPDATED: &str = "round.updated";
/// A participant joined or changed their RSVP.
pub const PARTICIPANT_JOINED: &str = "round.participant.joined";
/// A participant's RSVP was toggled away.
pub const PARTICIPANT_REMOVED: &str = "round.participant.removed";
/// A score was stored.
pub const ROUND_SCORE_UPDATED: &str = "round.score.updated";
/// A round reached the finalized state.
pub const ROUND_FINALIZED: &str = "round.finalized";
/// Scores are ready for the downstream scoring module.
pub const ROUND_SCORES_READY: &str = "round.scores.ready";
/// A round was deleted.
pub const ROUND_DELETED: &str = "round.deleted";
/// A round moved to in-progress.
pub const ROUND_STARTED: &str = "round.started";
/// A reminder should be rendered to the round's channel.
pub const ROUND_REMINDER: &str = "round.reminder";
/// An import finished and scores were applied.
pub const IMPORT_COMPLETED: &str = "round.import.completed";
/// An import failed with a structured code.
pub const IMPORT_FAILED: &str = "round.import.failed";

/// Ask the leaderboard module for a user's tag number.
pub const TAG_NUMBER_REQUEST: &str = "leaderboard.tag.request";
/// Leaderboard module's tag number answer.
pub const TAG_NUMBER_RESPONSE: &str = "leaderboard.tag.response";
/// Ask the user module whether a user holds one of a set of roles.
pub const ROLE_CHECK_REQUEST: &str = "user.role.request";
/// User module's role check answer.
pub const ROLE_CHECK_RESPONSE: &str = "user.role.response";

/// Failure companion topic for a command topic.
pub fn failed(topic: &str) -> String {
    format!("{topic}.failed")
}
