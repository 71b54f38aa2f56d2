use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::readings::{Sample, Series};

pub const TREND_WINDOWS_DAYS: [u32; 2] = [7, 30];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extreme {
    pub value: f64,
    pub at: DateTime<Utc>,
}

/// Statistics over the samples that fall on the current calendar day of a zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayStats {
    pub date: NaiveDate,
    pub high: Extreme,
    pub low: Extreme,
    pub average: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub days: u32,
    pub average: f64,
    /// Latest value minus the window average.
    pub delta: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub latest: Option<Sample>,
    pub today: Option<DayStats>,
    pub trends: Vec<Trend>,
}

impl Aggregate {
    pub fn trend(&self, days: u32) -> Option<&Trend> {
        self.trends.iter().find(|trend| trend.days == days)
    }
}

pub fn aggregate(series: &Series, now: DateTime<Utc>, tz: Tz, trend_days: &[u32]) -> Aggregate {
    let latest = latest(series);
    let trends = trend_days
        .iter()
        .filter_map(|days| trend(series, now, *days))
        .collect();
    Aggregate {
        latest,
        today: day_stats(series, now, tz),
        trends,
    }
}

/// The chronologically last sample of the whole series.
pub fn latest(series: &Series) -> Option<Sample> {
    series.samples.last().copied()
}

/// High, low and mean of the samples dated today in `tz`. Ties on high or low keep the
/// earliest sample. `None` when nothing was recorded today.
pub fn day_stats(series: &Series, now: DateTime<Utc>, tz: Tz) -> Option<DayStats> {
    let today = now.with_timezone(&tz).date_naive();
    let mut todays = series
        .samples
        .iter()
        .filter(|sample| sample.timestamp.with_timezone(&tz).date_naive() == today);

    let first = todays.next()?;
    let mut high = Extreme {
        value: first.value,
        at: first.timestamp,
    };
    let mut low = high;
    let mut sum = first.value;
    let mut count = 1usize;

    for sample in todays {
        if sample.value > high.value {
            high = Extreme {
                value: sample.value,
                at: sample.timestamp,
            };
        }
        if sample.value < low.value {
            low = Extreme {
                value: sample.value,
                at: sample.timestamp,
            };
        }
        sum += sample.value;
        count += 1;
    }

    Some(DayStats {
        date: today,
        high,
        low,
        average: sum / count as f64,
        count,
    })
}

/// `now - days`, pinned to the earliest representable instant when that underflows
/// so an oversized window simply covers the whole series.
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Mean and count of samples at or after `now - days`.
pub fn rolling_mean(series: &Series, now: DateTime<Utc>, days: u32) -> Option<(f64, usize)> {
    let start = window_start(now, days);
    let (sum, count) = series
        .samples
        .iter()
        .filter(|sample| sample.timestamp >= start)
        .fold((0.0, 0usize), |(sum, count), sample| {
            (sum + sample.value, count + 1)
        });
    (count > 0).then(|| (sum / count as f64, count))
}

pub fn trend(series: &Series, now: DateTime<Utc>, days: u32) -> Option<Trend> {
    let latest = latest(series)?;
    let (average, count) = rolling_mean(series, now, days)?;
    Some(Trend {
        days,
        average,
        delta: latest.value - average,
        count,
    })
}
