//! Assembly of records from fragmented writes.

use crate::config::LogConfig;
use crate::error::{CoreError, CoreResult};
use crate::record::{Record, TERMINATOR};
use bytes::Bytes;

/// Result of feeding bytes to a [`WriteAssembler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblerOutcome {
    /// No terminator seen yet; keep feeding.
    NeedMore,
    /// A complete record, terminator included.
    RecordReady(Record),
}

/// Accumulates inbound chunks for one writer until a terminator arrives.
///
/// The scratch buffer grows geometrically, doubling and rounding up to the
/// configured increment, so a stream of tiny chunks costs amortized O(1)
/// reallocations. Only bytes that have not been scanned yet are searched for
/// the terminator.
///
/// A chunk may carry several terminators. `feed` returns the first completed
/// record and keeps the rest buffered; call [`WriteAssembler::poll`] until it
/// returns `NeedMore` to drain the remaining complete records.
///
/// # Example
///
/// ```rust
/// use ringlog_core::{AssemblerOutcome, LogConfig, WriteAssembler};
///
/// let mut assembler = WriteAssembler::new(&LogConfig::default());
/// assert_eq!(assembler.feed(b"hel").unwrap(), AssemblerOutcome::NeedMore);
///
/// match assembler.feed(b"lo\nwor").unwrap() {
///     AssemblerOutcome::RecordReady(record) => assert_eq!(record.as_bytes(), b"hello\n"),
///     AssemblerOutcome::NeedMore => unreachable!(),
/// }
/// assert_eq!(assembler.pending_len(), 3);
/// ```
#[derive(Debug)]
pub struct WriteAssembler {
    scratch: Vec<u8>,
    scanned: usize,
    increment: usize,
    max_record_len: usize,
}

impl WriteAssembler {
    /// Creates an assembler using the growth quantum and record limit from `config`.
    pub fn new(config: &LogConfig) -> Self {
        Self::with_limits(config.scratch_increment, config.max_record_len)
    }

    /// Creates an assembler with an explicit growth quantum and record limit.
    pub fn with_limits(increment: usize, max_record_len: usize) -> Self {
        Self {
            scratch: Vec::new(),
            scanned: 0,
            increment: increment.max(1),
            max_record_len,
        }
    }

    /// Appends `chunk` and checks the new bytes for a terminator.
    ///
    /// An empty chunk is a no-op returning `NeedMore`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordTooLarge`] if any record in the buffered
    /// bytes plus `chunk` would exceed the configured limit, or
    /// [`CoreError::Allocation`] if the scratch buffer cannot grow. The
    /// buffered bytes are left as they were.
    pub fn feed(&mut self, chunk: &[u8]) -> CoreResult<AssemblerOutcome> {
        if chunk.is_empty() {
            return Ok(AssemblerOutcome::NeedMore);
        }

        let longest = self.longest_record_with(chunk);
        if longest > self.max_record_len {
            return Err(CoreError::RecordTooLarge {
                len: longest,
                limit: self.max_record_len,
            });
        }

        self.reserve(chunk.len())?;
        self.scratch.extend_from_slice(chunk);
        Ok(self.poll())
    }

    /// Extracts the next complete record already sitting in the buffer.
    pub fn poll(&mut self) -> AssemblerOutcome {
        let unscanned = &self.scratch[self.scanned..];
        match unscanned.iter().position(|b| *b == TERMINATOR) {
            Some(pos) => {
                let end = self.scanned + pos + 1;
                let record = Record::new(Bytes::copy_from_slice(&self.scratch[..end]));
                self.scratch.drain(..end);
                self.scanned = 0;
                if self.scratch.is_empty() {
                    self.release_if_oversized();
                }
                AssemblerOutcome::RecordReady(record)
            }
            None => {
                self.scanned = self.scratch.len();
                AssemblerOutcome::NeedMore
            }
        }
    }

    /// Returns the number of buffered bytes not yet part of a record.
    pub fn pending_len(&self) -> usize {
        self.scratch.len()
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.scratch.is_empty()
    }

    /// Returns the current scratch capacity.
    pub fn capacity(&self) -> usize {
        self.scratch.capacity()
    }

    /// Discards any partial record.
    pub fn reset(&mut self) {
        self.scratch.clear();
        self.scanned = 0;
        self.release_if_oversized();
    }

    // Length of the longest record, complete or not, that appending `chunk`
    // would leave in the buffer. Bytes before `scanned` hold no terminator.
    fn longest_record_with(&self, chunk: &[u8]) -> usize {
        let unscanned = &self.scratch[self.scanned..];
        let mut current = match unscanned.iter().rposition(|b| *b == TERMINATOR) {
            Some(pos) => unscanned.len() - pos - 1,
            None => self.scratch.len(),
        };
        let mut longest = 0;

        for piece in chunk.split_inclusive(|b| *b == TERMINATOR) {
            current += piece.len();
            longest = longest.max(current);
            if piece.last() == Some(&TERMINATOR) {
                current = 0;
            }
        }
        longest
    }

    // Growth stops at the record limit unless several buffered records need more.
    fn reserve(&mut self, additional: usize) -> CoreResult<()> {
        let needed = self.scratch.len().saturating_add(additional);
        let capacity = self.scratch.capacity();
        if needed <= capacity {
            return Ok(());
        }

        let target = needed.max(capacity.saturating_mul(2));
        let target = target.div_ceil(self.increment).saturating_mul(self.increment);
        let target = target.min(self.max_record_len.max(needed));

        self.scratch
            .try_reserve_exact(target - self.scratch.len())
            .map_err(|_| CoreError::Allocation { requested: target })
    }

    // Large buffers left behind by one big record are not kept around for
    // every later small one.
    fn release_if_oversized(&mut self) {
        if self.scratch.capacity() > self.increment.saturating_mul(64) {
            self.scratch = Vec::new();
        }
    }
}
