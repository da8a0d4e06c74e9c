//! Shapes threaded through the import pipeline stages.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Context built once per import attempt and carried unchanged through
/// every stage, so any failure can be reported with full context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportMetadata {
    /// Guild the round belongs to.
    pub guild_id: String,
    /// Round the import targets.
    pub round_id: Uuid,
    /// Identifier of this import attempt.
    pub import_id: Uuid,
    /// User who requested the import.
    pub user_id: String,
    /// Channel the request came from.
    pub channel_id: String,
    /// Discord message rendering the round, when known.
    pub event_message_id: Option<String>,
}

/// One row of a parsed scorecard, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPlayerScore {
    /// Name cell as written on the scorecard.
    pub player_name: String,
    /// Total column value, when present.
    pub total: Option<i32>,
    /// Per-hole strokes in hole order.
    pub hole_scores: Vec<i32>,
    /// Individual names split out of a joint team cell.
    pub team_names: Vec<String>,
    /// Whether the row's name cell named more than one player.
    pub is_team: bool,
}

impl ParsedPlayerScore {
    /// Total strokes: the Total column when present, else the hole sum.
    pub fn score(&self) -> Option<i32> {
        self.total.or_else(|| {
            if self.hole_scores.is_empty() {
                None
            } else {
                Some(self.hole_scores.iter().sum())
            }
        })
    }
}

/// Raw parse output: par values plus one entry per score row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedScorecard {
    /// Per-hole par values from the "Par" row, when present.
    pub par_scores: Vec<i32>,
    /// Score rows in scorecard order.
    pub player_scores: Vec<ParsedPlayerScore>,
}

/// Scoring mode inferred from the scorecard shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorecardMode {
    /// One player per row; tag numbers apply.
    Singles,
    /// Two players per row.
    Doubles,
    /// Three players per row.
    Triples,
}

impl ScorecardMode {
    /// Stable label used in events and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ScorecardMode::Singles => "singles",
            ScorecardMode::Doubles => "doubles",
            ScorecardMode::Triples => "triples",
        }
    }

    /// Whether rows describe groups rather than individuals.
    pub fn is_team(self) -> bool {
        !matches!(self, ScorecardMode::Singles)
    }
}

/// One singles row after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPlayer {
    /// Name as written on the scorecard.
    pub raw_name: String,
    /// Total strokes.
    pub score: i32,
}

/// One member of a normalized team row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMember {
    /// Name as written on the scorecard.
    pub raw_name: String,
}

/// One team row after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTeam {
    /// Joint display name, usually the original cell.
    pub name: String,
    /// Total strokes for the group.
    pub score: i32,
    /// Individual members.
    pub members: Vec<TeamMember>,
}

/// Mode-aware intermediate form produced by normalization, prior to
/// identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedScorecard {
    /// Inferred scoring mode.
    pub mode: ScorecardMode,
    /// Singles rows; empty in team mode.
    pub players: Vec<NormalizedPlayer>,
    /// Team rows; empty in singles mode.
    pub teams: Vec<NormalizedTeam>,
}

/// A singles row with its resolved identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlayer {
    /// Resolved user id.
    pub user_id: String,
    /// Original scorecard name.
    pub raw_name: String,
    /// Total strokes.
    pub score: i32,
}

/// A team member after identity resolution. `user_id` is `None` for
/// guests that stay on the roster under their raw name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMember {
    /// Resolved user id, if any.
    pub user_id: Option<String>,
    /// Original scorecard name.
    pub raw_name: String,
}

/// A team row after identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTeam {
    /// Joint display name.
    pub name: String,
    /// Total strokes for the group.
    pub score: i32,
    /// Members, matched or guest.
    pub members: Vec<ResolvedMember>,
}

/// Ingest output handed to the apply stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScorecard {
    /// Scoring mode carried through from normalization.
    pub mode: ScorecardMode,
    /// Singles rows with identities; empty in team mode.
    pub players: Vec<ResolvedPlayer>,
    /// Team rows; empty in singles mode.
    pub teams: Vec<ResolvedTeam>,
    /// Names that could not be resolved, reported to the user.
    pub skipped: Vec<String>,
}

/// Stable failure codes the presentation layer maps to user-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportErrorCode {
    /// Storage call failed.
    DbError,
    /// No scorecard name resolved to a user identity.
    NoMatches,
    /// Every row update failed in singles mode.
    NoUpdates,
    /// File extension or content shape not supported.
    UnsupportedFormat,
    /// Download or upload exceeded the size cap.
    FileTooLarge,
    /// Export URL off the allowlist or unrecognizable.
    InvalidUdiscUrl,
    /// Another import for the round is still pending.
    ImportConflict,
    /// Download failed.
    FetchFailed,
    /// File content could not be parsed.
    ParseFailed,
}

impl ImportErrorCode {
    /// Wire form of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            ImportErrorCode::DbError => "DB_ERROR",
            ImportErrorCode::NoMatches => "NO_MATCHES",
            ImportErrorCode::NoUpdates => "NO_UPDATES",
            ImportErrorCode::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ImportErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ImportErrorCode::InvalidUdiscUrl => "INVALID_UDISC_URL",
            ImportErrorCode::ImportConflict => "IMPORT_CONFLICT",
            ImportErrorCode::FetchFailed => "FETCH_FAILED",
            ImportErrorCode::ParseFailed => "PARSE_FAILED",
        }
    }
}

impl std::fmt::Display for ImportErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure of one pipeline stage.
#[derive(Debug, Clone, Error)]
#[error("import failed ({code}): {message}")]
pub struct ImportError {
    /// Stable code.
    pub code: ImportErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Full attempt context.
    pub metadata: ImportMetadata,
}

impl ImportError {
    /// Build a stage failure.
    pub fn new(code: ImportErrorCode, message: impl Into<String>, metadata: &ImportMetadata) -> Self {
        Self {
            code,
            message: message.into(),
            metadata: metadata.clone(),
        }
    }

    /// Whether retrying the import may succeed without changing the input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ImportErrorCode::DbError | ImportErrorCode::FetchFailed
        )
    }
}

/// Summary of a successful import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    /// Scoring mode that was applied.
    pub mode: ScorecardMode,
    /// Number of participants whose scores were written.
    pub updated: usize,
    /// Names that could not be resolved or applied.
    pub skipped: Vec<String>,
}
