use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use soilwatch_parser::{parse_optional_f64, ColumnDescriptor, RawTable};
use tracing::debug;

use crate::timestamp_resolver::resolve_timestamp;

/// Exports always carry the logger timestamp in the first column.
pub const DATE_COLUMN: usize = 0;

/// Medians at or below this are treated as volumetric fractions.
pub const FRACTIONAL_MEDIAN_LIMIT: f64 = 1.0;
pub const PERCENT_SCALE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    /// Raw (unscaled) values keyed by column index.
    pub values: BTreeMap<usize, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Time-ordered samples of one column, already multiplied by the unit factor.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub column_index: usize,
    pub samples: Vec<Sample>,
}

impl Series {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn map_values(mut self, f: impl Fn(f64) -> f64) -> Self {
        for sample in &mut self.samples {
            sample.value = f(sample.value);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingSet {
    /// In input row order, which is not necessarily chronological.
    pub readings: Vec<Reading>,
    pub unit_factor: f64,
    pub skipped_rows: usize,
}

impl ReadingSet {
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn most_recent(&self) -> Option<&Reading> {
        self.readings
            .iter()
            .fold(None, |best: Option<&Reading>, reading| match best {
                Some(current) if reading.timestamp < current.timestamp => Some(current),
                _ => Some(reading),
            })
    }

    /// Scaled samples of a single column, sorted by time. Rows that lacked a value for
    /// the column are left out. Equal timestamps keep their input order.
    pub fn series(&self, column_index: usize) -> Series {
        let mut samples: Vec<Sample> = self
            .readings
            .iter()
            .filter_map(|reading| {
                reading.values.get(&column_index).map(|value| Sample {
                    timestamp: reading.timestamp,
                    value: value * self.unit_factor,
                })
            })
            .collect();
        samples.sort_by_key(|sample| sample.timestamp);
        Series {
            column_index,
            samples,
        }
    }
}

/// Joins the data rows of `table` with resolved timestamps and numeric cells.
///
/// Rows with a blank or unparseable date, or without a single numeric value among
/// `columns`, are skipped. When `detect_units` is set the median of the most recent
/// reading decides whether values are fractions that need scaling to percent.
pub fn build_readings(
    table: &RawTable,
    columns: &[ColumnDescriptor],
    tz: Tz,
    detect_units: bool,
) -> ReadingSet {
    let mut readings = Vec::with_capacity(table.data_rows().len());
    let mut skipped_rows = 0usize;

    for (offset, row) in table.data_rows().iter().enumerate() {
        let row_index = offset + 1;
        let date_cell = table.cell(row_index, DATE_COLUMN).trim();
        if date_cell.is_empty() {
            skipped_rows += 1;
            continue;
        }
        let timestamp = match resolve_timestamp(date_cell, tz) {
            Ok(ts) => ts,
            Err(err) => {
                debug!(row_index, error = %err, "skipping row with unparseable timestamp");
                skipped_rows += 1;
                continue;
            }
        };

        let values: BTreeMap<usize, f64> = columns
            .iter()
            .filter_map(|column| {
                row.get(column.column_index)
                    .and_then(|cell| parse_optional_f64(cell))
                    .map(|value| (column.column_index, value))
            })
            .collect();

        if values.is_empty() {
            skipped_rows += 1;
            continue;
        }

        readings.push(Reading { timestamp, values });
    }

    let mut set = ReadingSet {
        readings,
        unit_factor: 1.0,
        skipped_rows,
    };

    if detect_units {
        set.unit_factor = set
            .most_recent()
            .map(|reading| detect_unit_factor(reading.values.values().copied()))
            .unwrap_or(1.0);
    }

    debug!(
        readings = set.readings.len(),
        skipped_rows = set.skipped_rows,
        unit_factor = set.unit_factor,
        "built readings"
    );

    set
}

/// Returns 100 when the sample median is at most 1 (fractional values), 1 otherwise.
/// A median of exactly 1.0 is read as fractional.
pub fn detect_unit_factor(values: impl IntoIterator<Item = f64>) -> f64 {
    match median(values) {
        Some(m) if m <= FRACTIONAL_MEDIAN_LIMIT => PERCENT_SCALE,
        _ => 1.0,
    }
}

pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
