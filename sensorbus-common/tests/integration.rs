//! Integration tests for sensorbus-common library.

use chrono::{TimeZone, Utc};
use sensorbus_common::{
    Format, SensorRecord, decode, encode, encode_rows, format_timestamp, parse_timestamp,
};

#[test]
fn test_cycle_rows_share_timestamp() {
    let cycle = Utc.with_ymd_and_hms(2024, 6, 2, 8, 30, 15).unwrap();
    let rows = vec![
        SensorRecord::new(cycle, "tempA", "20.1"),
        SensorRecord::new(cycle, "tempB", "IOError(121): Remote I/O error"),
        SensorRecord::new(cycle, "humidity", "TIMEOUT"),
    ];

    let encoded = String::from_utf8(encode_rows(&rows).expect("encode failed")).unwrap();
    let parsed: Vec<SensorRecord> = encoded
        .lines()
        .map(|line| SensorRecord::parse_line(line).expect("parse failed"))
        .collect();

    assert_eq!(parsed, rows);
    assert!(parsed.iter().all(|row| row.timestamp == cycle));
}

#[test]
fn test_watermark_format_matches_rows() {
    let cycle = Utc.with_ymd_and_hms(2024, 6, 2, 8, 30, 15).unwrap();
    let text = format_timestamp(&cycle);

    assert!(text.ends_with("+00:00"));
    assert_eq!(parse_timestamp(&text).unwrap(), cycle);
}

#[test]
fn test_record_payload_encoding() {
    let cycle = Utc.with_ymd_and_hms(2024, 6, 2, 8, 30, 15).unwrap();
    let record = SensorRecord::new(cycle, "tempA", "20.1");

    let json = encode(&record, Format::Json).expect("JSON encode failed");
    let decoded: SensorRecord = decode(&json, Format::Json).expect("JSON decode failed");
    assert_eq!(decoded.sensor, "tempA");
    assert_eq!(decoded.timestamp, cycle);
}
