//! CSV scorecard parsing.

use crate::import::{
    parser::{ParseError, parse_grid},
    types::ParsedScorecard,
};

/// Read a CSV export into the shared grid shape.
pub(crate) fn parse(bytes: &[u8]) -> Result<ParsedScorecard, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| ParseError::Malformed(err.to_string()))?;
        rows.push(record.iter().map(str::to_owned).collect());
    }
    parse_grid(rows)
}
