//! XLSX scorecard parsing via `calamine`.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};

use crate::import::{
    parser::{ParseError, parse_grid},
    types::ParsedScorecard,
};

/// Read the first worksheet into the shared grid shape.
pub(crate) fn parse(bytes: &[u8]) -> Result<ParsedScorecard, ParseError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook =
        Xlsx::new(cursor).map_err(|err| ParseError::Malformed(err.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Malformed("workbook has no worksheets".into()))?
        .map_err(|err| ParseError::Malformed(err.to_string()))?;

    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    parse_grid(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.clone(),
        Data::Int(value) => value.to_string(),
        // Whole-number floats are the common XLSX encoding for scores.
        Data::Float(value) if value.fract() == 0.0 => (*value as i64).to_string(),
        Data::Float(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        other => other.to_string(),
    }
}
