use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::ParserError;
use crate::model::{
    ChannelDepthTable, ChannelKind, ColumnDescriptor, DepthSource, CENTIMETERS_PER_INCH,
};

static LABELLED_CHANNEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z])(\d+)\s*\(\s*(\d+(?:\.\d+)?)\s*\)$").expect("labelled channel regex")
});

static BARE_CHANNEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z])(\d+)$").expect("bare channel regex"));

static CENTIMETER_DEPTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*cm\b").expect("centimeter depth regex"));

/// Maps header cells to sensor depths for one channel kind.
///
/// Each cell is tried against three rules and the first that matches wins:
/// a `<letter><channel>(<cm>)` label, a bare `<letter><channel>` label looked up in
/// `fallback`, and a descriptive header naming the kind followed by a `<n> cm` depth.
/// Cells matching none of them are skipped.
pub fn identify_columns(
    header: &[String],
    kind: ChannelKind,
    fallback: Option<&ChannelDepthTable>,
) -> Result<Vec<ColumnDescriptor>, ParserError> {
    let columns: Vec<ColumnDescriptor> = header
        .iter()
        .enumerate()
        .filter_map(|(column_index, cell)| classify_column(column_index, cell, kind, fallback))
        .collect();

    if columns.is_empty() {
        return Err(ParserError::NoRecognizedColumns {
            kind,
            header_len: header.len(),
        });
    }

    Ok(columns)
}

fn classify_column(
    column_index: usize,
    cell: &str,
    kind: ChannelKind,
    fallback: Option<&ChannelDepthTable>,
) -> Option<ColumnDescriptor> {
    let label = cell.trim();
    if label.is_empty() {
        return None;
    }

    if let Some(captures) = LABELLED_CHANNEL.captures(label) {
        if !matches_letter(&captures[1], kind) {
            return None;
        }
        let centimeters = captures[3].parse::<f64>().ok()?;
        return descriptor(
            column_index,
            label,
            captures[2].parse().ok(),
            centimeters / CENTIMETERS_PER_INCH,
            DepthSource::LabelCentimeters,
        );
    }

    if let Some(captures) = BARE_CHANNEL.captures(label) {
        if !matches_letter(&captures[1], kind) {
            return None;
        }
        let channel = captures[2].parse::<u32>().ok()?;
        let inches = fallback?.get(channel)?;
        return descriptor(
            column_index,
            label,
            Some(channel),
            inches,
            DepthSource::ChannelTable,
        );
    }

    let centimeters = free_text_depth(label, kind)?;
    descriptor(
        column_index,
        label,
        None,
        centimeters / CENTIMETERS_PER_INCH,
        DepthSource::FreeText,
    )
}

fn matches_letter(letter: &str, kind: ChannelKind) -> bool {
    letter
        .chars()
        .next()
        .is_some_and(|ch| ch.eq_ignore_ascii_case(&kind.type_letter()))
}

fn free_text_depth(label: &str, kind: ChannelKind) -> Option<f64> {
    // ASCII lowercasing keeps byte offsets aligned with `label`.
    let lower = label.to_ascii_lowercase();
    let keyword_end = kind
        .keywords()
        .iter()
        .filter_map(|keyword| lower.find(keyword).map(|pos| (pos, pos + keyword.len())))
        .min_by_key(|(start, _)| *start)
        .map(|(_, end)| end)?;

    let captures = CENTIMETER_DEPTH.captures(&label[keyword_end..])?;
    captures[1].parse::<f64>().ok()
}

fn descriptor(
    column_index: usize,
    label: &str,
    channel: Option<u32>,
    physical_depth: f64,
    source: DepthSource,
) -> Option<ColumnDescriptor> {
    if !physical_depth.is_finite() || physical_depth <= 0.0 {
        return None;
    }
    Some(ColumnDescriptor {
        column_index,
        physical_depth,
        label: label.to_string(),
        channel,
        source,
    })
}
