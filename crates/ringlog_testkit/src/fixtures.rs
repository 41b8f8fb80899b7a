//! Test fixtures and log helpers.
//!
//! Provides convenience functions for setting up record logs
//! and common test scenarios.

use ringlog_core::{LogConfig, Record, RecordLog};
use ringlog_storage::FileBackend;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A test log with automatic cleanup.
pub struct TestLog {
    /// The log instance.
    pub log: Arc<RecordLog>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestLog {
    /// Creates a new in-memory log retaining `capacity` records.
    pub fn memory(capacity: usize) -> Self {
        let log = RecordLog::in_memory(LogConfig::new().capacity(capacity))
            .expect("Failed to open in-memory log");
        Self {
            log: Arc::new(log),
            temp_dir: None,
        }
    }

    /// Creates a new journaled log in a temporary directory.
    pub fn file(capacity: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("ringlog.data");
        let backend = FileBackend::open_locked(&path).expect("Failed to open journal");
        let log = RecordLog::with_journal(LogConfig::new().capacity(capacity), Box::new(backend))
            .expect("Failed to open journaled log");

        Self {
            log: Arc::new(log),
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the journal path if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir
            .as_ref()
            .map(|d| d.path().join("ringlog.data"))
    }

    /// Appends each line, adding a terminator where it is missing.
    pub fn append_lines<'a>(&self, lines: impl IntoIterator<Item = &'a str>) {
        for line in lines {
            self.log
                .append(terminated(line.as_bytes()))
                .expect("Failed to append record");
        }
    }

    /// Returns the whole log as a string.
    pub fn contents(&self) -> String {
        String::from_utf8(self.log.read_all().expect("Failed to read log"))
            .expect("Log is not UTF-8")
    }
}

impl std::ops::Deref for TestLog {
    type Target = RecordLog;

    fn deref(&self) -> &Self::Target {
        &self.log
    }
}

/// Builds a record from `bytes`, appending a terminator if it lacks one.
pub fn terminated(bytes: &[u8]) -> Record {
    let mut data = bytes.to_vec();
    if data.last() != Some(&ringlog_core::TERMINATOR) {
        data.push(ringlog_core::TERMINATOR);
    }
    Record::new(data)
}

/// Returns the log used by the storage scenarios: capacity 2 holding
/// `"bb\n"` and `"ccc\n"` after `"a\n"` was evicted.
pub fn evicted_pair() -> TestLog {
    let log = TestLog::memory(2);
    log.append_lines(["a", "bb", "ccc"]);
    log
}
