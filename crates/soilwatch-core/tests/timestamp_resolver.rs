use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::America::{New_York, Phoenix};
use chrono_tz::Asia::Kolkata;
use chrono_tz::UTC;
use soilwatch_core::timestamp_resolver::{resolve_timestamp, resolve_wall_clock, TimestampError};

fn parse_naive(ts: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").expect("parse timestamp")
}

fn utc(ts: &str) -> DateTime<Utc> {
    parse_naive(ts).and_utc()
}

#[test]
fn fixed_offset_zones_match_direct_conversion() {
    let stamps = [
        "2024-01-15 00:00:00",
        "2024-03-10 02:30:00",
        "2024-07-01 12:45:10",
        "2024-11-03 01:30:00",
        "2024-12-31 23:59:59",
    ];

    for stamp in stamps {
        let naive = parse_naive(stamp);

        let phoenix = resolve_timestamp(stamp, Phoenix).expect("phoenix");
        assert_eq!(phoenix, (naive + Duration::hours(7)).and_utc(), "{stamp}");

        let kolkata = resolve_timestamp(stamp, Kolkata).expect("kolkata");
        assert_eq!(
            kolkata,
            (naive - Duration::minutes(5 * 60 + 30)).and_utc(),
            "{stamp}"
        );
    }
}

#[test]
fn summer_time_away_from_transitions_uses_daylight_offset() {
    let resolved = resolve_timestamp("2024-07-01 12:00:00", New_York).expect("resolve");
    assert_eq!(resolved, utc("2024-07-01 16:00:00"));

    let winter = resolve_timestamp("2024-01-15 08:00", New_York).expect("resolve");
    assert_eq!(winter, utc("2024-01-15 13:00:00"));
}

#[test]
fn spring_forward_gap_follows_two_pass_correction() {
    // 02:30Z renders as 21:30 EST the previous evening, so the guess moves forward 5h.
    let resolved = resolve_timestamp("2024-03-10 02:30:00", New_York).expect("resolve");
    assert_eq!(resolved, utc("2024-03-10 07:30:00"));
    assert_eq!(
        resolved.with_timezone(&New_York).format("%H:%M").to_string(),
        "03:30"
    );
}

#[test]
fn fall_back_overlap_resolves_to_first_occurrence() {
    let resolved = resolve_timestamp("2024-11-03 01:30:00", New_York).expect("resolve");
    assert_eq!(resolved, utc("2024-11-03 05:30:00"));
}

#[test]
fn transition_day_afternoon_is_exact() {
    let resolved = resolve_timestamp("2024-03-10 12:00:00", New_York).expect("resolve");
    assert_eq!(resolved, utc("2024-03-10 16:00:00"));
}

#[test]
fn wall_clock_resolution_is_deterministic() {
    let naive = parse_naive("2024-03-10 02:30:00");
    assert_eq!(
        resolve_wall_clock(naive, New_York),
        resolve_wall_clock(naive, New_York)
    );
}

#[test]
fn explicit_offsets_bypass_zone() {
    assert_eq!(
        resolve_timestamp("2024-07-01T12:00:00Z", New_York).expect("zulu"),
        utc("2024-07-01 12:00:00")
    );
    assert_eq!(
        resolve_timestamp("2024-07-01 12:00:00 UTC", New_York).expect("utc marker"),
        utc("2024-07-01 12:00:00")
    );
    assert_eq!(
        resolve_timestamp("2024-07-01 12:00:00+02:00", New_York).expect("plus offset"),
        utc("2024-07-01 10:00:00")
    );
    assert_eq!(
        resolve_timestamp("2024-07-01 12:00 -0500", New_York).expect("minus offset"),
        utc("2024-07-01 17:00:00")
    );
}

#[test]
fn slash_dates_and_optional_seconds() {
    assert_eq!(
        resolve_timestamp("2024/07/01 12:00", UTC).expect("slashes"),
        utc("2024-07-01 12:00:00")
    );
    assert_eq!(
        resolve_timestamp("  2024-07-01T06:15:30.5 ", UTC).expect("fraction"),
        utc("2024-07-01 06:15:30") + Duration::milliseconds(500)
    );
}

#[test]
fn other_shapes_are_unparseable() {
    for raw in ["07/01/2024 12:00", "2024-07-01", "", "yesterday", "2024-7-1 12:00"] {
        assert!(
            matches!(
                resolve_timestamp(raw, UTC),
                Err(TimestampError::Unparseable(_))
            ),
            "{raw:?} should be unparseable"
        );
    }

    assert!(matches!(
        resolve_timestamp("2024-13-01 00:00", UTC),
        Err(TimestampError::OutOfRange(_))
    ));
    assert!(matches!(
        resolve_timestamp("2024-02-30 25:00", UTC),
        Err(TimestampError::OutOfRange(_))
    ));
}
