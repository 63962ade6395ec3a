//! Persisted "last published" timestamp.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sensorbus_common::{format_timestamp, parse_timestamp};
use tracing::{debug, warn};

use crate::error::{RepublishError, Result};

/// The watermark file, held under an exclusive lock for the process lifetime.
///
/// The lock doubles as a single-instance guard: a second republisher using
/// the same file fails to open it.
#[derive(Debug)]
pub struct Watermark {
    path: PathBuf,
    file: File,
    value: DateTime<Utc>,
}

impl Watermark {
    /// Open (or create) and lock the watermark file.
    ///
    /// An empty or unreadable file starts from the Unix epoch, so every row
    /// in the log is published.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let io_error = |source| RepublishError::Watermark {
            path: path.display().to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(RepublishError::WatermarkLocked {
                    path: path.display().to_string(),
                });
            }
            Err(TryLockError::Error(e)) => return Err(io_error(e)),
        }

        let mut content = String::new();
        let read = file.read_to_string(&mut content);

        let value = match read.map(|_| parse_timestamp(content.trim())) {
            Ok(Ok(value)) => value,
            _ => {
                warn!(
                    "Cannot read last updated time from {}. Will upload all data.",
                    path.display()
                );
                DateTime::<Utc>::UNIX_EPOCH
            }
        };

        debug!(path = %path.display(), watermark = %format_timestamp(&value), "Watermark loaded");

        Ok(Self { path, file, value })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Timestamp of the newest published row.
    pub fn get(&self) -> DateTime<Utc> {
        self.value
    }

    /// Persist a newer timestamp.
    pub fn advance(&mut self, timestamp: DateTime<Utc>) -> Result<()> {
        self.write(&format_timestamp(&timestamp))
            .map_err(|source| RepublishError::Watermark {
                path: self.path.display().to_string(),
                source,
            })?;
        self.value = timestamp;
        Ok(())
    }

    fn write(&mut self, text: &str) -> std::io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(text.as_bytes())?;
        self.file.flush()
    }
}

#[cfg(test)]
impl Watermark {
    /// Swap the handle for one that cannot be written, or back.
    pub(crate) fn set_read_only(&mut self, read_only: bool) {
        self.file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(&self.path)
            .unwrap();
    }
}
