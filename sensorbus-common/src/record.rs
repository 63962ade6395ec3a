//! Sensor log rows and their on-disk format.
//!
//! The poller appends one row per polled sensor and the republisher tails the
//! same file, so both sides go through this module:
//!
//! ```text
//! 2024-03-01T12:00:00.250000+00:00,tempA,21.5
//! ```
//!
//! Columns are timestamp, sensor name, and the value or fault text. Fields are
//! quoted only when they contain a delimiter, a quote or a line break.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timestamp layout used in log rows and in the watermark file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f+00:00";

/// One row of the sensor log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRecord {
    /// Cycle timestamp (identical for every row of one poll cycle).
    pub timestamp: DateTime<Utc>,

    /// Sensor name as advertised by the device.
    pub sensor: String,

    /// Raw reading or fault text.
    pub value: String,
}

impl SensorRecord {
    /// Create a new record.
    pub fn new(
        timestamp: DateTime<Utc>,
        sensor: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            sensor: sensor.into(),
            value: value.into(),
        }
    }

    /// Parse a single log line (with or without its line terminator).
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(Error::Row("empty line".to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(line.as_bytes());

        let row = reader
            .records()
            .next()
            .ok_or_else(|| Error::Row(format!("no fields in '{}'", line)))??;

        if row.len() != 3 {
            return Err(Error::Row(format!(
                "expected 3 fields, found {} in '{}'",
                row.len(),
                line
            )));
        }

        Ok(Self {
            timestamp: parse_timestamp(&row[0])?,
            sensor: row[1].to_string(),
            value: row[2].to_string(),
        })
    }
}

/// Encode records as newline-terminated CSV rows.
pub fn encode_rows(records: &[SensorRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for record in records {
        let timestamp = format_timestamp(&record.timestamp);
        writer.write_record([
            timestamp.as_str(),
            record.sensor.as_str(),
            record.value.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a log or watermark timestamp.
///
/// Accepts RFC 3339 with any offset, and legacy values without an offset,
/// which are taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::microseconds(250)
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(&ts()), "2024-03-01T12:00:00.000250+00:00");
    }

    #[test]
    fn test_format_whole_seconds_keeps_fraction() {
        let whole = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(format_timestamp(&whole), "2024-03-01T12:00:00.000000+00:00");
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert_eq!(
            parse_timestamp("2024-03-01T12:00:00.000250+00:00").unwrap(),
            ts()
        );
        assert_eq!(parse_timestamp("2024-03-01T12:00:00.000250").unwrap(), ts());
        assert_eq!(
            parse_timestamp("2024-03-01T12:00:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_encode_rows() {
        let rows = vec![
            SensorRecord::new(ts(), "tempA", "21.5"),
            SensorRecord::new(ts(), "tempB", "TIMEOUT"),
        ];

        let encoded = String::from_utf8(encode_rows(&rows).unwrap()).unwrap();
        assert_eq!(
            encoded,
            "2024-03-01T12:00:00.000250+00:00,tempA,21.5\n\
             2024-03-01T12:00:00.000250+00:00,tempB,TIMEOUT\n"
        );
    }

    #[test]
    fn test_quoted_value_parses_back() {
        let row = SensorRecord::new(ts(), "status", "IOError(5): \"bad\", retry");
        let encoded = String::from_utf8(encode_rows(std::slice::from_ref(&row)).unwrap()).unwrap();

        assert!(encoded.contains("\"IOError(5): \"\"bad\"\", retry\""));
        assert_eq!(SensorRecord::parse_line(&encoded).unwrap(), row);
    }

    #[test]
    fn test_parse_line_rejects_bad_rows() {
        assert!(SensorRecord::parse_line("").is_err());
        assert!(SensorRecord::parse_line("2024-03-01T12:00:00+00:00,tempA").is_err());
        assert!(SensorRecord::parse_line("not-a-time,tempA,1").is_err());
    }
}
