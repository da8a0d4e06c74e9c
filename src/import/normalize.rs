//! Normalization: raw parsed rows into a mode-aware scorecard.

use crate::import::types::{
    ImportError, ImportErrorCode, ImportMetadata, NormalizedPlayer, NormalizedScorecard,
    NormalizedTeam, ParsedScorecard, ScorecardMode, TeamMember,
};

/// Build the mode-aware intermediate form.
///
/// Mode is inferred from team-name multiplicity: any row naming several
/// players makes the whole card a team card, sized by the widest row. Rows
/// without any score value are dropped.
pub fn normalize(
    parsed: Option<&ParsedScorecard>,
    metadata: &ImportMetadata,
) -> Result<NormalizedScorecard, ImportError> {
    let parsed = parsed.ok_or_else(|| {
        ImportError::new(
            ImportErrorCode::UnsupportedFormat,
            "no parsed scorecard to normalize",
            metadata,
        )
    })?;

    let widest = parsed
        .player_scores
        .iter()
        .map(|row| row.team_names.len().max(1))
        .max()
        .unwrap_or(1);
    let mode = match widest {
        0 | 1 => ScorecardMode::Singles,
        2 => ScorecardMode::Doubles,
        _ => ScorecardMode::Triples,
    };

    let mut normalized = NormalizedScorecard {
        mode,
        players: Vec::new(),
        teams: Vec::new(),
    };

    for row in &parsed.player_scores {
        let Some(score) = row.score() else {
            continue;
        };
        if mode.is_team() {
            let members = if row.team_names.is_empty() {
                // A lone row on a team card is a one-person team.
                vec![TeamMember {
                    raw_name: row.player_name.clone(),
                }]
            } else {
                row.team_names
                    .iter()
                    .map(|name| TeamMember {
                        raw_name: name.clone(),
                    })
                    .collect()
            };
            normalized.teams.push(NormalizedTeam {
                name: row.player_name.clone(),
                score,
                members,
            });
        } else {
            normalized.players.push(NormalizedPlayer {
                raw_name: row.player_name.clone(),
                score,
            });
        }
    }

    if normalized.players.is_empty() && normalized.teams.is_empty() {
        return Err(ImportError::new(
            ImportErrorCode::UnsupportedFormat,
            "scorecard has no usable score rows",
            metadata,
        ));
    }
    Ok(normalized)
}
