use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::UTC;
use soilwatch_core::readings::{build_readings, detect_unit_factor, median};
use soilwatch_parser::{identify_columns, parse_table, ChannelKind};

const MIXED_EXPORT: &str = "\
Date Time,A1(5),A2(15),A3(25)
2024-07-01 00:00:00,0.30,0.31,0.33
bad date,0.1,0.1,0.1
,0.2,0.2,0.2
2024-07-01 00:30:00,x,0.32,
2024-07-01 01:00:00,,,
2024-07-01 01:30:00,0.29,0.31,0.35
";

fn utc(ts: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
        .expect("parse timestamp")
        .and_utc()
}

fn approx(left: f64, right: f64) -> bool {
    (left - right).abs() < 1e-9
}

#[test]
fn skips_bad_rows_and_keeps_partial_rows() {
    let table = parse_table(MIXED_EXPORT).expect("parse");
    let columns =
        identify_columns(table.header().expect("header"), ChannelKind::Moisture, None)
            .expect("columns");

    let set = build_readings(&table, &columns, UTC, true);

    assert_eq!(set.readings.len(), 3);
    assert_eq!(set.skipped_rows, 3);
    assert_eq!(set.readings[1].timestamp, utc("2024-07-01 00:30:00"));
    assert_eq!(set.readings[1].values.len(), 1);
    assert!(approx(set.readings[1].values[&2], 0.32));
}

#[test]
fn fractional_latest_sample_scales_whole_series() {
    let table = parse_table(MIXED_EXPORT).expect("parse");
    let columns =
        identify_columns(table.header().expect("header"), ChannelKind::Moisture, None)
            .expect("columns");

    let set = build_readings(&table, &columns, UTC, true);
    assert!(approx(set.unit_factor, 100.0));

    let series = set.series(2);
    let values: Vec<f64> = series.samples.iter().map(|s| s.value).collect();
    assert_eq!(values.len(), 3);
    assert!(approx(values[0], 31.0));
    assert!(approx(values[1], 32.0));
    assert!(approx(values[2], 31.0));
}

#[test]
fn percentage_latest_sample_is_left_alone() {
    let csv = "Date Time,A1(15)\n2024-07-01 00:00:00,0.5\n2024-07-01 00:30:00,31.2\n";
    let table = parse_table(csv).expect("parse");
    let columns =
        identify_columns(table.header().expect("header"), ChannelKind::Moisture, None)
            .expect("columns");

    let set = build_readings(&table, &columns, UTC, true);
    assert!(approx(set.unit_factor, 1.0));
    let series = set.series(1);
    assert!(approx(series.samples[1].value, 31.2));
    assert!(approx(series.samples[0].value, 0.5));
}

#[test]
fn unit_detection_uses_chronologically_latest_row() {
    // The newest row comes first in the file.
    let csv = "Date Time,A1(15)\n2024-07-02 00:00:00,0.31\n2024-07-01 00:00:00,35.0\n";
    let table = parse_table(csv).expect("parse");
    let columns =
        identify_columns(table.header().expect("header"), ChannelKind::Moisture, None)
            .expect("columns");

    let set = build_readings(&table, &columns, UTC, true);
    assert_eq!(
        set.most_recent().map(|r| r.timestamp),
        Some(utc("2024-07-02 00:00:00"))
    );
    assert!(approx(set.unit_factor, 100.0));

    let series = set.series(1);
    assert_eq!(series.samples[0].timestamp, utc("2024-07-01 00:00:00"));
    assert_eq!(series.samples[1].timestamp, utc("2024-07-02 00:00:00"));
}

#[test]
fn detection_can_be_disabled_for_native_units() {
    let csv = "Date Time,T1(15)\n2024-01-10 06:00:00,0.4\n";
    let table = parse_table(csv).expect("parse");
    let columns = identify_columns(
        table.header().expect("header"),
        ChannelKind::Temperature,
        None,
    )
    .expect("columns");

    let set = build_readings(&table, &columns, UTC, false);
    assert!(approx(set.unit_factor, 1.0));
    assert!(approx(set.series(1).samples[0].value, 0.4));
}

#[test]
fn unit_factor_boundaries() {
    assert!(approx(detect_unit_factor([0.31]), 100.0));
    assert!(approx(detect_unit_factor([31.2]), 1.0));
    assert!(approx(detect_unit_factor([1.0]), 100.0));
    assert!(approx(detect_unit_factor([1.0001]), 1.0));
    assert!(approx(detect_unit_factor([0.5, 2.0]), 1.0));
    assert!(approx(detect_unit_factor(Vec::<f64>::new()), 1.0));
}

#[test]
fn median_of_odd_and_even_samples() {
    assert_eq!(median([3.0, 1.0, 2.0]), Some(2.0));
    assert_eq!(median([4.0, 1.0, 3.0, 2.0]), Some(2.5));
    assert_eq!(median(Vec::<f64>::new()), None);
}
