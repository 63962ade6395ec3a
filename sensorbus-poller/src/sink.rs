//! Consumers of one cycle's readings.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sensorbus_common::encode_rows;
use thiserror::Error;
use tracing::debug;

use crate::poll::PollResult;

/// Separator printed before each cycle's echo.
pub const ECHO_SEPARATOR: &str = "*****";

/// Error type for sink operations.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] sensorbus_common::Error),
}

/// Receives the readings of every cycle.
pub trait ReadingSink: Send {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Record one cycle. Every row shares `timestamp`.
    fn record(&mut self, timestamp: DateTime<Utc>, readings: &PollResult) -> Result<(), SinkError>;
}

/// Appends one CSV row per reading to the sensor log.
///
/// Each cycle's rows are written under an exclusive advisory lock and flushed
/// before the lock is released, so a reader holding a shared lock never sees
/// half a cycle.
#[derive(Debug)]
pub struct CsvLogSink {
    path: PathBuf,
    file: File,
}

impl CsvLogSink {
    /// Open (or create) the log for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    fn append_locked(&mut self, rows: &[u8]) -> io::Result<()> {
        self.file.lock()?;
        let written = self
            .file
            .write_all(rows)
            .and_then(|()| self.file.flush());
        let unlocked = self.file.unlock();
        written.and(unlocked)
    }
}

impl ReadingSink for CsvLogSink {
    fn name(&self) -> &str {
        "csv-log"
    }

    fn record(&mut self, timestamp: DateTime<Utc>, readings: &PollResult) -> Result<(), SinkError> {
        let records = readings.to_records(timestamp);
        if records.is_empty() {
            return Ok(());
        }

        let rows = encode_rows(&records)?;
        self.append_locked(&rows)?;

        debug!(rows = records.len(), path = %self.path.display(), "Appended readings");
        Ok(())
    }
}

/// Prints each cycle's readings for someone watching the terminal.
pub struct ConsoleSink<W> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    /// Echo to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ReadingSink for ConsoleSink<W> {
    fn name(&self) -> &str {
        "console"
    }

    fn record(
        &mut self,
        _timestamp: DateTime<Utc>,
        readings: &PollResult,
    ) -> Result<(), SinkError> {
        writeln!(self.out, "{}", ECHO_SEPARATOR)?;

        for (address, sensors) in readings.iter() {
            let mut line = format!("Address {}:", address);
            for entry in sensors {
                line.push_str(&format!(
                    " {} = {}",
                    entry.sensor,
                    entry.reading.to_string().escape_debug()
                ));
            }
            writeln!(self.out, "{}", line)?;
        }

        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusError;
    use crate::poll::{Reading, SensorReading};
    use chrono::TimeZone;
    use sensorbus_common::SensorRecord;

    fn readings() -> PollResult {
        let mut result = PollResult::new();
        result.insert(
            8,
            vec![
                SensorReading {
                    sensor: "tempA".into(),
                    reading: Reading::Value("21.5".into()),
                },
                SensorReading {
                    sensor: "tempB".into(),
                    reading: Reading::TimedOut,
                },
            ],
        );
        result.insert(
            9,
            vec![SensorReading {
                sensor: "status".into(),
                reading: Reading::Value("ok, \"warm\"\r".into()),
            }],
        );
        result
    }

    fn cycle_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_csv_sink_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sensors.csv");

        let mut sink = CsvLogSink::open(&path).unwrap();
        sink.record(cycle_time(), &readings()).unwrap();
        sink.record(cycle_time(), &PollResult::new()).unwrap();

        let mut again = CsvLogSink::open(&path).unwrap();
        again.record(cycle_time(), &readings()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "2024-03-01T12:00:00.000000+00:00,tempA,21.5");
        assert_eq!(lines[1], "2024-03-01T12:00:00.000000+00:00,tempB,TIMEOUT");
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_csv_rows_parse_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sensors.csv");

        let mut sink = CsvLogSink::open(&path).unwrap();
        let mut result = PollResult::new();
        result.insert(
            8,
            vec![
                SensorReading {
                    sensor: "note".into(),
                    reading: Reading::Value("a,b \"c\"".into()),
                },
                SensorReading {
                    sensor: "bad".into(),
                    reading: Reading::Failed(BusError::with_code(121, "Remote I/O error")),
                },
            ],
        );
        sink.record(cycle_time(), &result).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<SensorRecord> = content
            .lines()
            .map(|line| SensorRecord::parse_line(line).unwrap())
            .collect();
        assert_eq!(parsed[0], SensorRecord::new(cycle_time(), "note", "a,b \"c\""));
        assert_eq!(
            parsed[1],
            SensorRecord::new(cycle_time(), "bad", "IOError(121): Remote I/O error")
        );
    }

    #[test]
    fn test_console_echo() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.record(cycle_time(), &readings()).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "*****\n\
             Address 8: tempA = 21.5 tempB = TIMEOUT\n\
             Address 9: status = ok, \\\"warm\\\"\\r\n"
        );
    }

    #[test]
    fn test_console_echo_empty_cycle() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.record(cycle_time(), &PollResult::new()).unwrap();

        assert_eq!(sink.into_inner(), b"*****\n");
    }
}
