//! The tail → filter → publish → advance loop.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sensorbus_common::{SensorRecord, format_timestamp};
use sensorbus_framework::Shutdown;
use tracing::{debug, error, info, warn};

use crate::config::PayloadFormat;
use crate::error::{PublishError, Result};
use crate::publisher::{Publish, Topics, encode_payload};
use crate::status::ServiceStatus;
use crate::tail::{LogLine, LogTailer};
use crate::watermark::Watermark;

/// What one scan of the log did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Rows published.
    pub published: usize,
    /// Rows at or before the watermark.
    pub skipped: usize,
    /// Lines that were not valid rows.
    pub malformed: usize,
    /// Rows whose sensor name is not a valid key.
    pub rejected: usize,
    /// Whether the scan stopped at a failed publish.
    pub interrupted: bool,
}

/// Rows of one poll cycle, which all share a timestamp.
struct RowGroup {
    offset: u64,
    timestamp: DateTime<Utc>,
    records: Vec<SensorRecord>,
    /// Malformed lines read after the first row.
    malformed: usize,
}

/// Republishes new log rows and tracks progress in the watermark.
pub struct Republisher<P> {
    tailer: LogTailer,
    watermark: Watermark,
    publisher: P,
    topics: Topics,
    payload: PayloadFormat,
    interval: Duration,
}

impl<P: Publish> Republisher<P> {
    pub fn new(
        tailer: LogTailer,
        watermark: Watermark,
        publisher: P,
        topics: Topics,
        payload: PayloadFormat,
        interval: Duration,
    ) -> Self {
        Self {
            tailer,
            watermark,
            publisher,
            topics,
            payload,
            interval,
        }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark.get()
    }

    /// Publish every complete row added since the last scan.
    ///
    /// Rows are handled one cycle at a time. A cycle at or before the
    /// watermark is skipped; otherwise all its rows are published and the
    /// watermark then moves to its timestamp. When a publish fails the scan
    /// stops and the tailer is rewound to the start of that cycle, so it is
    /// retried on the next scan. When the watermark cannot be written the
    /// tailer is rewound to the next cycle and the error returned.
    ///
    /// The log is read in bounded batches. The last cycle of a batch may be
    /// cut short, so it is held back and re-read with the next batch. A
    /// cycle larger than a batch is read whole.
    pub async fn scan_once(&mut self) -> Result<ScanStats> {
        let mut stats = ScanStats::default();
        let mut groups = Vec::new();

        loop {
            let lines = self.tailer.read_new()?;
            let more = self.tailer.has_more();
            push_rows(&mut groups, lines, &mut stats);

            if more && groups.len() < 2 {
                continue;
            }

            if more && let Some(held) = groups.pop() {
                self.tailer.rewind(held.offset);
            }

            let batch = std::mem::take(&mut groups);
            if !self.publish_groups(batch, &mut stats).await? || !more {
                return Ok(stats);
            }
        }
    }

    /// Returns `Ok(false)` when a publish failed and the scan should stop.
    async fn publish_groups(
        &mut self,
        groups: Vec<RowGroup>,
        stats: &mut ScanStats,
    ) -> Result<bool> {
        let mut groups = groups.into_iter().peekable();

        while let Some(group) = groups.next() {
            stats.malformed += group.malformed;

            if group.timestamp <= self.watermark.get() {
                stats.skipped += group.records.len();
                continue;
            }

            if let Err(e) = self.publish_group(&group, stats).await {
                warn!(
                    "Failed to publish readings of {}, will retry: {}",
                    format_timestamp(&group.timestamp),
                    e
                );
                self.tailer.rewind(group.offset);
                stats.interrupted = true;
                return Ok(false);
            }

            if let Err(e) = self.watermark.advance(group.timestamp) {
                if let Some(next) = groups.peek() {
                    self.tailer.rewind(next.offset);
                }
                return Err(e);
            }
        }

        Ok(true)
    }

    async fn publish_group(
        &mut self,
        group: &RowGroup,
        stats: &mut ScanStats,
    ) -> std::result::Result<(), PublishError> {
        for record in &group.records {
            let key = self.topics.sensor_key(&record.sensor);
            let payload = match encode_payload(record, self.payload) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(sensor = %record.sensor, "Skipping unencodable reading: {}", e);
                    continue;
                }
            };

            match self.publisher.publish(&key, payload).await {
                Ok(()) => {
                    debug!("Published {} to {}", record.value, key);
                    stats.published += 1;
                }
                Err(e @ PublishError::InvalidKey { .. }) => {
                    warn!("Skipping reading of sensor '{}': {}", record.sensor, e);
                    stats.rejected += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Scan the log until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!(
            "Republishing {} to {}/* every {}ms (watermark: {})",
            self.tailer.path().display(),
            self.topics.base(),
            self.interval.as_millis(),
            format_timestamp(&self.watermark.get())
        );

        self.publish_status(ServiceStatus::running(self.topics.instance())).await;

        while !shutdown.is_triggered() {
            match self.scan_once().await {
                Ok(stats) if stats.published > 0 => {
                    info!(
                        published = stats.published,
                        skipped = stats.skipped,
                        malformed = stats.malformed,
                        rejected = stats.rejected,
                        "Republished readings"
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Log scan failed: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.triggered() => break,
            }
        }

        self.publish_status(ServiceStatus::offline(self.topics.instance())).await;
        info!("Republisher stopped");
    }

    async fn publish_status(&mut self, status: ServiceStatus) {
        if let Err(e) = status.publish(&mut self.publisher, &self.topics).await {
            error!("Failed to publish {} status: {}", status.status, e);
        }
    }
}

/// Parse lines into rows, grouped by consecutive equal timestamps.
///
/// Rows continuing the last group in `groups` are added to it.
fn push_rows(groups: &mut Vec<RowGroup>, lines: Vec<LogLine>, stats: &mut ScanStats) {
    for line in lines {
        let record = match SensorRecord::parse_line(&line.text) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed log line at byte {}: {}", line.offset, e);
                match groups.last_mut() {
                    Some(group) => group.malformed += 1,
                    None => stats.malformed += 1,
                }
                continue;
            }
        };

        match groups.last_mut() {
            Some(group) if group.timestamp == record.timestamp => group.records.push(record),
            _ => groups.push(RowGroup {
                offset: line.offset,
                timestamp: record.timestamp,
                records: vec![record],
                malformed: 0,
            }),
        }
    }
}
