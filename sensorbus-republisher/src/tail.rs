//! Incremental reading of the sensor log.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{RepublishError, Result};

/// Bytes of complete lines returned by one [`LogTailer::read_new`].
pub const DEFAULT_READ_LIMIT: u64 = 1024 * 1024;

/// One complete log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Byte offset of the start of the line.
    pub offset: u64,
    /// Line text without the newline.
    pub text: String,
}

/// Follows the sensor log from a byte offset.
///
/// Each read takes a shared advisory lock, so it never overlaps a cycle
/// being appended by the poller. Only newline-terminated lines are returned;
/// an unterminated tail stays unread until its newline arrives. A read stops
/// once the read limit is reached, so a large backlog is consumed over
/// several calls.
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    file: Option<File>,
    offset: u64,
    limit: u64,
    more: bool,
}

impl LogTailer {
    /// Tail `path` from its beginning. The file need not exist yet.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
            offset: 0,
            limit: DEFAULT_READ_LIMIT,
            more: false,
        }
    }

    /// Cap the bytes returned by one read. A single line longer than the
    /// limit is still returned whole.
    pub fn with_read_limit(mut self, limit: u64) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of the first unread byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the last read stopped at the read limit rather than at the
    /// end of the log.
    pub fn has_more(&self) -> bool {
        self.more
    }

    /// Resume reading at `offset`, typically the start of a line that could
    /// not be handled.
    pub fn rewind(&mut self, offset: u64) {
        self.offset = offset;
    }

    /// Read the complete lines added since the last call, up to the read
    /// limit.
    pub fn read_new(&mut self) -> Result<Vec<LogLine>> {
        self.more = false;

        let path = self.path.display().to_string();
        let log_error = |source| RepublishError::Log {
            path: path.clone(),
            source,
        };

        if !self.ensure_open().map_err(log_error)? {
            return Ok(Vec::new());
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(Vec::new());
        };

        let len = file.metadata().map_err(log_error)?.len();
        if len < self.offset {
            warn!(
                "Sensor log {} shrank from {} to {} bytes; reading from the start",
                path, self.offset, len
            );
            self.offset = 0;
        }

        let chunk = read_locked(file, self.offset, self.limit).map_err(log_error)?;
        self.offset = chunk.end;
        self.more = chunk.more;
        let lines = chunk.lines;

        if !lines.is_empty() {
            debug!(lines = lines.len(), offset = self.offset, "Read new log lines");
        }

        Ok(lines)
    }

    fn ensure_open(&mut self) -> io::Result<bool> {
        if self.file.is_some() {
            return Ok(true);
        }

        match File::open(&self.path) {
            Ok(file) => {
                self.file = Some(file);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Sensor log not created yet");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

struct Chunk {
    lines: Vec<LogLine>,
    /// Offset just past the last returned line.
    end: u64,
    more: bool,
}

fn read_locked(file: &mut File, offset: u64, limit: u64) -> io::Result<Chunk> {
    file.lock_shared()?;
    let read = read_lines(file, offset, limit);
    let unlocked = file.unlock();
    let chunk = read?;
    unlocked?;
    Ok(chunk)
}

fn read_lines(file: &mut File, offset: u64, limit: u64) -> io::Result<Chunk> {
    file.seek(SeekFrom::Start(offset))?;
    let mut reader = BufReader::new(file);
    let mut lines = Vec::new();
    let mut end = offset;
    let mut buf = Vec::new();

    loop {
        if end - offset >= limit {
            return Ok(Chunk { lines, end, more: true });
        }

        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 || buf.last() != Some(&b'\n') {
            return Ok(Chunk { lines, end, more: false });
        }

        let line = &buf[..buf.len() - 1];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        lines.push(LogLine {
            offset: end,
            text: String::from_utf8_lossy(line).into_owned(),
        });
        end += read as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_log_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut tailer = LogTailer::new(dir.path().join("Sensors.csv"));

        assert!(tailer.read_new().unwrap().is_empty());
        assert_eq!(tailer.offset(), 0);
    }

    #[test]
    fn test_reads_only_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sensors.csv");
        append(&path, "a\nb\n");

        let mut tailer = LogTailer::new(&path);
        let first = tailer.read_new().unwrap();
        assert_eq!(
            first,
            vec![
                LogLine { offset: 0, text: "a".into() },
                LogLine { offset: 2, text: "b".into() },
            ]
        );

        assert!(tailer.read_new().unwrap().is_empty());

        append(&path, "c\n");
        let second = tailer.read_new().unwrap();
        assert_eq!(second, vec![LogLine { offset: 4, text: "c".into() }]);
    }

    #[test]
    fn test_unterminated_line_waits_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sensors.csv");
        append(&path, "a\npart");

        let mut tailer = LogTailer::new(&path);
        assert_eq!(tailer.read_new().unwrap().len(), 1);
        assert_eq!(tailer.offset(), 2);

        append(&path, "ial\n");
        let lines = tailer.read_new().unwrap();
        assert_eq!(lines, vec![LogLine { offset: 2, text: "partial".into() }]);
    }

    #[test]
    fn test_rewind_rereads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sensors.csv");
        append(&path, "a\nb\n");

        let mut tailer = LogTailer::new(&path);
        let lines = tailer.read_new().unwrap();
        tailer.rewind(lines[1].offset);

        assert_eq!(tailer.read_new().unwrap()[0].text, "b");
    }

    #[test]
    fn test_large_log_read_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sensors.csv");
        let text: String = (0..100).map(|i| format!("row{:03}\n", i)).collect();
        append(&path, &text);

        let mut tailer = LogTailer::new(&path).with_read_limit(64);
        let mut rows = Vec::new();
        let mut reads = 0;
        loop {
            let lines = tailer.read_new().unwrap();
            assert!(lines.len() <= 10);
            rows.extend(lines.into_iter().map(|l| l.text));
            reads += 1;
            if !tailer.has_more() {
                break;
            }
        }

        assert!(reads >= 10);
        assert_eq!(rows.len(), 100);
        assert_eq!(rows[0], "row000");
        assert_eq!(rows[99], "row099");
        assert_eq!(tailer.offset(), text.len() as u64);
    }

    #[test]
    fn test_line_longer_than_limit_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sensors.csv");
        append(&path, "a-long-line\nb\n");

        let mut tailer = LogTailer::new(&path).with_read_limit(4);
        assert_eq!(tailer.read_new().unwrap()[0].text, "a-long-line");
        assert!(tailer.has_more());
        assert_eq!(tailer.read_new().unwrap()[0].text, "b");
        assert!(!tailer.has_more());
    }

    #[test]
    fn test_truncated_log_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sensors.csv");
        append(&path, "aaaa\nbbbb\n");

        let mut tailer = LogTailer::new(&path);
        tailer.read_new().unwrap();

        std::fs::write(&path, "c\n").unwrap();
        assert_eq!(tailer.read_new().unwrap()[0].text, "c");
    }
}
