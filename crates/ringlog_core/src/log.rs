//! The shared, lock-guarded record log.

use crate::command::SeekTo;
use crate::config::LogConfig;
use crate::error::CoreResult;
use crate::reader::{ReadMaterializer, ReadRequest};
use crate::record::{Record, RecordFrames, RecordHandle};
use crate::store::{RecordStore, Snapshot};
use parking_lot::Mutex;
use ringlog_storage::StorageBackend;
use tracing::{debug, info, warn};

/// Summary of what journal replay found at open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Complete records found in the journal.
    pub records_found: usize,
    /// Records that fit in the ring and were kept.
    pub records_retained: usize,
    /// Bytes of an unterminated trailing record that were dropped.
    pub torn_bytes: u64,
    /// Whether the journal was rewritten down to the retained window.
    pub compacted: bool,
}

/// Point-in-time counters for a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    /// Records currently retained.
    pub records: usize,
    /// Ring capacity.
    pub capacity: usize,
    /// Length of the whole-log view.
    pub total_length: u64,
    /// Records appended since open (replayed records included).
    pub appended: u64,
    /// Records evicted since open.
    pub evicted: u64,
    /// Journal size, if the log has one.
    pub journal_bytes: Option<u64>,
}

struct LogState {
    store: RecordStore,
    journal: Option<Box<dyn StorageBackend>>,
}

/// A [`RecordStore`] behind one coarse lock, optionally journaled.
///
/// Every mutation and every read that needs a consistent whole-log view
/// takes the lock for exactly the duration of the store operation. Callers
/// must not hold it across network I/O; all public methods return owned
/// bytes so they never have to.
///
/// With a journal, an append is written, flushed and synced to the journal
/// before it enters the ring. If the journal write fails the journal is cut
/// back to its previous length and the ring is left untouched, so an append
/// either lands in both places or in neither.
pub struct RecordLog {
    config: LogConfig,
    state: Mutex<LogState>,
    recovery: RecoveryReport,
}

impl RecordLog {
    /// Creates an empty log with no durable medium.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn in_memory(config: LogConfig) -> CoreResult<Self> {
        config.validate()?;
        let store = RecordStore::new(config.capacity)?;

        Ok(Self {
            config,
            state: Mutex::new(LogState {
                store,
                journal: None,
            }),
            recovery: RecoveryReport::default(),
        })
    }

    /// Opens a log mirrored into `journal`, replaying what it already holds.
    ///
    /// The newest `capacity` complete records seed the ring. A trailing
    /// unterminated fragment is truncated away. If the journal held more
    /// records than the ring retains, it is rewritten to the retained window.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the journal
    /// cannot be read, truncated or rewritten.
    pub fn with_journal(config: LogConfig, mut journal: Box<dyn StorageBackend>) -> CoreResult<Self> {
        config.validate()?;
        let mut store = RecordStore::new(config.capacity)?;
        let recovery = replay(&mut store, journal.as_mut())?;

        let mut log = Self {
            config,
            state: Mutex::new(LogState {
                store,
                journal: Some(journal),
            }),
            recovery,
        };

        if recovery.records_found > recovery.records_retained {
            log.compact()?;
            log.recovery.compacted = true;
        }

        info!(
            found = log.recovery.records_found,
            retained = log.recovery.records_retained,
            torn_bytes = log.recovery.torn_bytes,
            compacted = log.recovery.compacted,
            "journal replayed"
        );

        Ok(log)
    }

    /// Returns the configuration the log was opened with.
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Returns what journal replay found at open.
    pub fn recovery_report(&self) -> RecoveryReport {
        self.recovery
    }

    /// Returns true if appends are mirrored into a journal.
    pub fn is_durable(&self) -> bool {
        self.state.lock().journal.is_some()
    }

    /// Appends a record, evicting the oldest one if the ring is full.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::MalformedRecord`] unless `record` is
    /// exactly one terminated line, or a storage error if the journal write
    /// fails. In both cases the log is unchanged.
    pub fn append(&self, record: Record) -> CoreResult<RecordHandle> {
        record.validate()?;

        let mut state = self.state.lock();
        let LogState { store, journal } = &mut *state;

        if let Some(journal) = journal.as_mut() {
            self.write_journal(journal.as_mut(), record.as_bytes())?;
        }

        let len = record.len();
        let handle = store.append(record);
        debug!(%handle, len, retained = store.len(), "record committed");
        Ok(handle)
    }

    fn write_journal(&self, journal: &mut dyn StorageBackend, bytes: &[u8]) -> CoreResult<()> {
        let before = journal.size()?;
        let written = if self.config.sync_on_append {
            journal.append_durable(bytes).map(|_| ())
        } else {
            journal.append(bytes).and_then(|_| journal.flush())
        };

        if let Err(e) = written {
            warn!(error = %e, "journal write failed, rolling back");
            if let Err(rollback) = journal.truncate(before) {
                warn!(error = %rollback, "journal rollback failed");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Serves a read request against one consistent store state.
    ///
    /// # Errors
    ///
    /// Returns an addressing error for an invalid command address.
    pub fn read(&self, request: ReadRequest) -> CoreResult<Vec<u8>> {
        let state = self.state.lock();
        ReadMaterializer::new(&state.store).materialize(request)
    }

    /// Returns the whole log.
    ///
    /// # Errors
    ///
    /// Returns an allocation error if the output cannot be reserved.
    pub fn read_all(&self) -> CoreResult<Vec<u8>> {
        self.read(ReadRequest::WholeLog)
    }

    /// Returns the log tail starting at a command address.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::InvalidAddress`] for an address outside
    /// the retained window.
    pub fn read_from_command(&self, seek: SeekTo) -> CoreResult<Vec<u8>> {
        self.read(ReadRequest::FromCommand(seek))
    }

    /// Returns the whole-log bytes from an absolute offset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::OutOfRange`] if `offset` is past the end.
    pub fn read_from(&self, offset: u64) -> CoreResult<Vec<u8>> {
        self.state.lock().store.read_from(offset)
    }

    /// Maps an absolute offset to `(record_index, intra_offset)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::OutOfRange`] if `offset` is past the end.
    pub fn locate(&self, offset: u64) -> CoreResult<(usize, usize)> {
        self.state.lock().store.locate(offset)
    }

    /// Maps `(record_index, intra_offset)` to an absolute offset.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::InvalidAddress`] for an address outside
    /// the retained window.
    pub fn locate_by_command(&self, record_index: usize, intra_offset: usize) -> CoreResult<u64> {
        self.state
            .lock()
            .store
            .locate_by_command(record_index, intra_offset)
    }

    /// Returns the length of the whole-log view.
    pub fn total_length(&self) -> u64 {
        self.state.lock().store.total_length()
    }

    /// Returns the number of retained records.
    pub fn len(&self) -> usize {
        self.state.lock().store.len()
    }

    /// Returns true if no records are retained.
    pub fn is_empty(&self) -> bool {
        self.state.lock().store.is_empty()
    }

    /// Takes a point-in-time copy of the retained records.
    pub fn snapshot(&self) -> Snapshot {
        self.state.lock().store.snapshot_for_read()
    }

    /// Runs `f` with the store locked.
    ///
    /// Keep `f` short and free of I/O; every other reader and writer waits.
    pub fn with_store<R>(&self, f: impl FnOnce(&RecordStore) -> R) -> R {
        f(&self.state.lock().store)
    }

    /// Returns current counters.
    pub fn stats(&self) -> LogStats {
        let state = self.state.lock();
        LogStats {
            records: state.store.len(),
            capacity: state.store.capacity(),
            total_length: state.store.total_length(),
            appended: state.store.appended(),
            evicted: state.store.evicted(),
            journal_bytes: state.journal.as_ref().and_then(|j| j.size().ok()),
        }
    }

    /// Rewrites the journal so it holds exactly the retained records.
    ///
    /// A no-op for logs without a journal.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the rewrite fails.
    pub fn compact(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        let LogState { store, journal } = &mut *state;
        let Some(journal) = journal.as_mut() else {
            return Ok(());
        };

        journal.truncate(0)?;
        for record in store.iter() {
            journal.append(record.as_bytes())?;
        }
        journal.flush()?;
        journal.sync()?;
        Ok(())
    }

    /// Syncs the journal, if any.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the sync fails.
    pub fn sync(&self) -> CoreResult<()> {
        if let Some(journal) = self.state.lock().journal.as_mut() {
            journal.flush()?;
            journal.sync()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RecordLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordLog")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

fn replay(store: &mut RecordStore, journal: &mut dyn StorageBackend) -> CoreResult<RecoveryReport> {
    let data = journal.read_all()?;
    let frames = RecordFrames::split(&data);

    let torn = frames.torn().len();
    if torn > 0 {
        warn!(torn_bytes = torn, "dropping unterminated journal tail");
        journal.truncate(frames.complete().len() as u64)?;
    }

    let mut found = 0;
    for record in frames.records() {
        store.append(record);
        found += 1;
    }

    Ok(RecoveryReport {
        records_found: found,
        records_retained: store.len(),
        torn_bytes: torn as u64,
        compacted: false,
    })
}
