use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ParserError;

pub const CENTIMETERS_PER_INCH: f64 = 2.54;

/// Which family of probe channels a request is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Moisture,
    Temperature,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Moisture => "moisture",
            ChannelKind::Temperature => "temperature",
        }
    }

    /// Leading letter of the channel labels in probe exports (`A1(5)`, `T3(25)`).
    pub fn type_letter(&self) -> char {
        match self {
            ChannelKind::Moisture => 'A',
            ChannelKind::Temperature => 'T',
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            ChannelKind::Moisture => &["moisture", "water content"],
            ChannelKind::Temperature => &["temperature"],
        }
    }

    /// Moisture exports switch between volumetric fractions and percentages
    /// depending on the logger firmware, temperatures are always native degrees.
    pub fn detects_fractional_units(&self) -> bool {
        matches!(self, ChannelKind::Moisture)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a column's physical depth was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthSource {
    /// `A1(10)` style label with the depth in centimeters.
    LabelCentimeters,
    /// Bare `A1` label resolved through a [`ChannelDepthTable`].
    ChannelTable,
    /// Descriptive header such as `Soil Moisture 30 cm`.
    FreeText,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub column_index: usize,
    /// Installation depth in inches, always positive.
    pub physical_depth: f64,
    pub label: String,
    pub channel: Option<u32>,
    pub source: DepthSource,
}

/// Fallback depths (inches) for probes whose export omits the depth from the label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelDepthTable {
    depths: BTreeMap<u32, f64>,
}

impl ChannelDepthTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: u32, inches: f64) {
        self.depths.insert(channel, inches);
    }

    pub fn get(&self, channel: u32) -> Option<f64> {
        self.depths.get(&channel).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    /// Builds a table from string keyed entries, as they come out of a TOML table.
    pub fn from_string_keys<'a, I>(entries: I) -> Result<Self, ParserError>
    where
        I: IntoIterator<Item = (&'a String, &'a f64)>,
    {
        let mut table = Self::new();
        for (key, inches) in entries {
            let channel = key
                .trim()
                .parse::<u32>()
                .map_err(|err| ParserError::InvalidChannelDepth {
                    key: key.clone(),
                    message: format!("channel must be a positive integer: {err}"),
                })?;
            if !inches.is_finite() || *inches <= 0.0 {
                return Err(ParserError::InvalidChannelDepth {
                    key: key.clone(),
                    message: format!("depth must be a positive number of inches, got {inches}"),
                });
            }
            table.insert(channel, *inches);
        }
        Ok(table)
    }
}

impl FromIterator<(u32, f64)> for ChannelDepthTable {
    fn from_iter<T: IntoIterator<Item = (u32, f64)>>(iter: T) -> Self {
        Self {
            depths: iter.into_iter().collect(),
        }
    }
}

/// Rows of string cells exactly as they appeared in the export; row 0 is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    pub fn data_rows(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Ragged rows are tolerated: a missing cell reads as the empty string.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}
