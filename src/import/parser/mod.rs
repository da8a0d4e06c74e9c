//! Scorecard file parsing, selected by file extension.

mod csv;
mod xlsx;

use crate::import::types::{
    ImportError, ImportErrorCode, ImportMetadata, ParsedPlayerScore, ParsedScorecard,
};

/// Internal parser failure, mapped to an import code at the boundary.
#[derive(Debug)]
pub(crate) enum ParseError {
    /// Extension has no registered parser.
    Unsupported(String),
    /// The file was recognized but its content could not be read.
    Malformed(String),
}

/// Parse raw scorecard bytes into rows, dispatching on the extension.
pub fn parse_scorecard(
    filename: &str,
    bytes: &[u8],
    metadata: &ImportMetadata,
) -> Result<ParsedScorecard, ImportError> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let result = match extension.as_str() {
        "csv" => csv::parse(bytes),
        "xlsx" => xlsx::parse(bytes),
        other => Err(ParseError::Unsupported(other.to_owned())),
    };

    result.map_err(|err| match err {
        ParseError::Unsupported(ext) => ImportError::new(
            ImportErrorCode::UnsupportedFormat,
            format!("`.{ext}` scorecards are not supported; use .csv or .xlsx"),
            metadata,
        ),
        ParseError::Malformed(message) => ImportError::new(
            ImportErrorCode::ParseFailed,
            format!("could not parse `{filename}`: {message}"),
            metadata,
        ),
    })
}

/// Interpret a grid of cells as a scorecard.
///
/// Row one is the header; a name column leads, `Hole<N>` columns carry
/// per-hole strokes and an optional `Total` column carries the sum. A row
/// named "Par" supplies par values instead of scores. Joint name cells
/// (`"Alice & Bob"`, `"Alice / Bob"`) mark team rows.
pub(crate) fn parse_grid(rows: Vec<Vec<String>>) -> Result<ParsedScorecard, ParseError> {
    let mut iter = rows.into_iter();
    let header = iter
        .next()
        .ok_or_else(|| ParseError::Malformed("scorecard has no rows".into()))?;

    let mut hole_columns: Vec<usize> = Vec::new();
    let mut total_column: Option<usize> = None;
    for (index, cell) in header.iter().enumerate() {
        let label = cell.trim().to_lowercase();
        if label == "total" {
            total_column = Some(index);
        } else if let Some(rest) = label.strip_prefix("hole")
            && rest.trim().parse::<u32>().is_ok()
        {
            hole_columns.push(index);
        }
    }
    if hole_columns.is_empty() && total_column.is_none() {
        return Err(ParseError::Malformed(
            "header has neither hole columns nor a total column".into(),
        ));
    }

    let mut scorecard = ParsedScorecard::default();
    for row in iter {
        let Some(name) = row.first().map(|cell| cell.trim()) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let holes: Vec<i32> = hole_columns
            .iter()
            .filter_map(|&column| row.get(column))
            .filter_map(|cell| cell.trim().parse::<i32>().ok())
            .collect();

        if name.eq_ignore_ascii_case("par") {
            scorecard.par_scores = holes;
            continue;
        }

        let total = total_column
            .and_then(|column| row.get(column))
            .and_then(|cell| cell.trim().parse::<i32>().ok());

        let team_names: Vec<String> = name
            .split(['&', '/'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_owned)
            .collect();
        let is_team = team_names.len() > 1;

        scorecard.player_scores.push(ParsedPlayerScore {
            player_name: name.to_owned(),
            total,
            hole_scores: holes,
            team_names: if is_team { team_names } else { Vec::new() },
            is_team,
        });
    }

    if scorecard.player_scores.is_empty() {
        return Err(ParseError::Malformed("scorecard has no score rows".into()));
    }
    Ok(scorecard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn metadata() -> ImportMetadata {
        ImportMetadata {
            guild_id: "100".into(),
            round_id: Uuid::new_v4(),
            import_id: Uuid::new_v4(),
            user_id: "300".into(),
            channel_id: "200".into(),
            event_message_id: None,
        }
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn unknown_extensions_are_unsupported() {
        let err = parse_scorecard("scores.pdf", b"%PDF", &metadata()).unwrap_err();
        assert_eq!(err.code, ImportErrorCode::UnsupportedFormat);
    }

    #[test]
    fn par_row_supplies_pars_not_a_player() {
        let parsed = parse_grid(grid(&[
            &["Player", "Hole1", "Hole2", "Total"],
            &["Par", "3", "4", "7"],
            &["Alice", "3", "5", "8"],
        ]))
        .unwrap();
        assert_eq!(parsed.par_scores, vec![3, 4]);
        assert_eq!(parsed.player_scores.len(), 1);
        assert_eq!(parsed.player_scores[0].player_name, "Alice");
        assert_eq!(parsed.player_scores[0].score(), Some(8));
    }

    #[test]
    fn total_wins_over_hole_sum_but_holes_back_it_up() {
        let parsed = parse_grid(grid(&[
            &["Player", "Hole1", "Hole2", "Total"],
            &["Alice", "3", "5", "9"],
            &["Bob", "4", "4", ""],
        ]))
        .unwrap();
        // Total column is authoritative when present.
        assert_eq!(parsed.player_scores[0].score(), Some(9));
        // Blank total falls back to the hole sum.
        assert_eq!(parsed.player_scores[1].score(), Some(8));
    }

    #[test]
    fn joint_name_cells_become_team_rows() {
        let parsed = parse_grid(grid(&[
            &["Team", "Hole1", "Total"],
            &["Alice & Bob", "3", "54"],
            &["Carol / Dan / Erin", "4", "51"],
        ]))
        .unwrap();
        let first = &parsed.player_scores[0];
        assert!(first.is_team);
        assert_eq!(first.team_names, vec!["Alice", "Bob"]);
        assert_eq!(parsed.player_scores[1].team_names.len(), 3);
    }

    #[test]
    fn headerless_garbage_is_malformed() {
        assert!(matches!(
            parse_grid(grid(&[&["just", "some", "cells"], &["Alice", "3", "4"]])),
            Err(ParseError::Malformed(_))
        ));
    }
}
