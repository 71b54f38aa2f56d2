use std::borrow::Cow;

use csv::{ReaderBuilder, Terminator};

use crate::errors::ParserError;
use crate::model::RawTable;

/// Splits an export into rows of cells.
///
/// Quoted fields may contain commas, doubled quotes and line breaks. Records end at
/// `\n`, a final record without a trailing newline is kept, and rows are passed
/// through with whatever arity they have. A `\r` outside quotes is dropped, so CRLF
/// exports parse like LF ones and a stray `\r` never splits a row.
pub fn parse_table(content: &str) -> Result<RawTable, ParserError> {
    let content = strip_unquoted_carriage_returns(content);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| ParserError::Csv { source })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable::new(rows))
}

// Doubled quotes toggle twice, which leaves the state unchanged.
fn strip_unquoted_carriage_returns(content: &str) -> Cow<'_, str> {
    if !content.contains('\r') {
        return Cow::Borrowed(content);
    }

    let mut in_quotes = false;
    let mut out = String::with_capacity(content.len());
    for ch in content.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                out.push(ch);
            }
            '\r' if !in_quotes => {}
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}
