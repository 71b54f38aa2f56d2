use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone as _, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp '{0}' is not of the form YYYY-MM-DD HH:MM[:SS]")]
    Unparseable(String),
    #[error("timestamp '{0}' has out of range date or time fields")]
    OutOfRange(String),
    #[error("timestamp '{0}' carries an invalid UTC offset")]
    InvalidOffset(String),
}

static STAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})[-/](\d{2})[-/](\d{2})[ T](\d{2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?\s*((?i:z|utc)|[+-]\d{2}(?::?\d{2})?)?$",
    )
    .expect("timestamp regex")
});

/// Resolves a logger timestamp to an absolute instant.
///
/// Stamps carrying `Z`, `UTC` or a numeric offset are taken at face value. Anything
/// else is read as the wall clock of `tz` and resolved with [`resolve_wall_clock`].
pub fn resolve_timestamp(raw: &str, tz: Tz) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = raw.trim();
    let captures = STAMP
        .captures(trimmed)
        .ok_or_else(|| TimestampError::Unparseable(trimmed.to_string()))?;

    let field = |idx: usize| -> u32 {
        captures
            .get(idx)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let year = captures[1]
        .parse::<i32>()
        .map_err(|_| TimestampError::Unparseable(trimmed.to_string()))?;
    let nanos = captures
        .get(7)
        .map(|m| fraction_to_nanos(m.as_str()))
        .unwrap_or(0);

    let date = NaiveDate::from_ymd_opt(year, field(2), field(3))
        .ok_or_else(|| TimestampError::OutOfRange(trimmed.to_string()))?;
    let time = NaiveTime::from_hms_nano_opt(field(4), field(5), field(6), nanos)
        .ok_or_else(|| TimestampError::OutOfRange(trimmed.to_string()))?;
    let naive = NaiveDateTime::new(date, time);

    match captures.get(8) {
        Some(marker) => {
            let offset = parse_offset(marker.as_str())
                .ok_or_else(|| TimestampError::InvalidOffset(trimmed.to_string()))?;
            offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| TimestampError::InvalidOffset(trimmed.to_string()))
        }
        None => Ok(resolve_wall_clock(naive, tz)),
    }
}

/// Converts a wall-clock reading in `tz` to UTC without assuming a fixed offset.
///
/// The fields are first read as if they were UTC. That guess is rendered back into
/// `tz`, and the gap between the intended and the rendered wall clock is added to
/// the guess. Times inside a spring-forward gap or a fall-back overlap land on
/// whatever the zone rules give at the guessed instant.
pub fn resolve_wall_clock(wall_clock: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    let guess = wall_clock.and_utc();
    let rendered = guess.with_timezone(&tz).naive_local();
    guess + (wall_clock - rendered)
}

fn parse_offset(marker: &str) -> Option<FixedOffset> {
    if marker.eq_ignore_ascii_case("z") || marker.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, digits) = match marker.split_at(1) {
        ("+", rest) => (1, rest),
        ("-", rest) => (-1, rest),
        _ => return None,
    };
    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    let hours: i32 = digits.get(0..2)?.parse().ok()?;
    let minutes: i32 = match digits.get(2..4) {
        Some(mm) => mm.parse().ok()?,
        None => 0,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn fraction_to_nanos(fraction: &str) -> u32 {
    let padded = format!("{fraction:0<9}");
    padded.get(0..9).and_then(|s| s.parse().ok()).unwrap_or(0)
}
