use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::aggregate::{Aggregate, Extreme, Trend};
use crate::pipeline::TemperatureUnit;

/// Public figures are reported to one decimal place; aggregation runs at full precision.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoistureSummary {
    pub sensor: String,
    pub timezone: String,
    pub window_days: u32,
    pub depths: Vec<DepthReading>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthReading {
    pub depth_requested: f64,
    pub mapped_depth: f64,
    pub column: String,
    pub latest_value: Option<f64>,
    pub latest_at: Option<DateTime<Utc>>,
    pub window_average: Option<f64>,
    pub window_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureSummary {
    pub sensor: String,
    pub timezone: String,
    pub unit: TemperatureUnit,
    pub requested_depth: f64,
    pub mapped_depth: f64,
    pub column: String,
    pub today: TodaySummary,
    pub trend_7d: Option<TrendSummary>,
    pub trend_30d: Option<TrendSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodaySummary {
    pub current: Option<f64>,
    pub current_at: Option<DateTime<Utc>>,
    pub high: Option<ExtremeSummary>,
    pub low: Option<ExtremeSummary>,
    pub average: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtremeSummary {
    pub value: f64,
    pub at: DateTime<Utc>,
    /// `HH:MM` in the request's zone.
    pub local_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSummary {
    pub average: f64,
    pub delta: f64,
}

impl ExtremeSummary {
    fn from_extreme(extreme: &Extreme, tz: Tz) -> Self {
        Self {
            value: round1(extreme.value),
            at: extreme.at,
            local_time: extreme.at.with_timezone(&tz).format("%H:%M").to_string(),
        }
    }
}

impl From<&Trend> for TrendSummary {
    fn from(trend: &Trend) -> Self {
        Self {
            average: round1(trend.average),
            delta: round1(trend.delta),
        }
    }
}

impl TodaySummary {
    pub fn from_aggregate(aggregate: &Aggregate, tz: Tz) -> Self {
        let today = aggregate.today.as_ref();
        Self {
            current: aggregate.latest.map(|sample| round1(sample.value)),
            current_at: aggregate.latest.map(|sample| sample.timestamp),
            high: today.map(|stats| ExtremeSummary::from_extreme(&stats.high, tz)),
            low: today.map(|stats| ExtremeSummary::from_extreme(&stats.low, tz)),
            average: today.map(|stats| round1(stats.average)),
            count: today.map(|stats| stats.count).unwrap_or(0),
        }
    }
}
