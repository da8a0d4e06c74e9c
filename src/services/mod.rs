/// Outbound domain event publishing.
pub mod round_events;
/// Round creation, editing, deletion and timer-driven transitions.
pub mod round_lifecycle;
/// RSVP handling with toggle semantics.
pub mod participants;
/// Reminder and start job planning.
pub mod scheduling;
/// Score submission and finalization.
pub mod scoring;
/// Storage backend supervision and degraded-mode tracking.
pub mod storage_supervisor;
/// Cross-module tag and role lookups.
pub mod tag_resolution;
