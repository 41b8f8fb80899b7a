//! The bounded record ring.

use crate::error::{CoreError, CoreResult};
use crate::record::{Record, RecordHandle};
use std::collections::vec_deque;
use std::collections::VecDeque;

/// A ring of at most `capacity` records.
///
/// Records are kept oldest first. Once the ring is full, each append evicts
/// exactly the oldest record (dropping its bytes) before storing the new one.
/// The in-order concatenation of the retained records is the *whole-log
/// view*; absolute offsets address bytes in that view, and
/// `(record_index, intra_offset)` pairs address bytes relative to the
/// retained window, where index 0 is the oldest retained record.
///
/// # Invariants
///
/// - `len() <= capacity()`
/// - `total_length()` equals the sum of retained record lengths
/// - Iteration order equals append order
///
/// The store itself is not synchronized; [`crate::RecordLog`] wraps it in
/// the log lock.
#[derive(Debug, Clone)]
pub struct RecordStore {
    records: VecDeque<Record>,
    capacity: usize,
    total_len: u64,
    next_sequence: u64,
}

impl RecordStore {
    /// Creates an empty ring holding at most `capacity` records.
    ///
    /// Slot storage is reserved up front, so appends never reallocate.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a zero capacity, or
    /// [`CoreError::Allocation`] if the slots cannot be reserved.
    pub fn new(capacity: usize) -> CoreResult<Self> {
        if capacity == 0 {
            return Err(CoreError::invalid_config("capacity must be at least 1"));
        }

        let mut records = VecDeque::new();
        records
            .try_reserve_exact(capacity)
            .map_err(|_| CoreError::Allocation {
                requested: capacity.saturating_mul(std::mem::size_of::<Record>()),
            })?;

        Ok(Self {
            records,
            capacity,
            total_len: 0,
            next_sequence: 0,
        })
    }

    /// Returns the maximum number of retained records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of retained records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records are retained.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if the next append will evict.
    pub fn is_full(&self) -> bool {
        self.records.len() == self.capacity
    }

    /// Returns the length of the whole-log view in bytes.
    pub fn total_length(&self) -> u64 {
        self.total_len
    }

    /// Returns how many records have ever been appended.
    pub fn appended(&self) -> u64 {
        self.next_sequence
    }

    /// Returns how many records have been evicted.
    pub fn evicted(&self) -> u64 {
        self.next_sequence - self.records.len() as u64
    }

    /// Stores `record` as the newest entry, evicting the oldest when full.
    ///
    /// Returns a handle naming the stored record.
    pub fn append(&mut self, record: Record) -> RecordHandle {
        if self.records.len() == self.capacity {
            if let Some(oldest) = self.records.pop_front() {
                self.total_len -= oldest.len() as u64;
            }
        }

        self.total_len += record.len() as u64;
        self.records.push_back(record);

        let handle = RecordHandle::new(self.next_sequence);
        self.next_sequence += 1;
        handle
    }

    /// Returns the record at logical `index` (0 = oldest retained).
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Iterates the retained records, oldest first.
    pub fn iter(&self) -> vec_deque::Iter<'_, Record> {
        self.records.iter()
    }

    /// Resolves a handle to its current logical index.
    ///
    /// Returns `None` once the record has been evicted.
    pub fn index_of(&self, handle: RecordHandle) -> Option<usize> {
        let first = self.evicted();
        let sequence = handle.sequence();
        if sequence < first || sequence >= self.next_sequence {
            return None;
        }
        usize::try_from(sequence - first).ok()
    }

    /// Returns the handle of the record at logical `index`.
    pub fn handle_at(&self, index: usize) -> Option<RecordHandle> {
        (index < self.records.len()).then(|| RecordHandle::new(self.evicted() + index as u64))
    }

    /// Returns the absolute offset where the record at `index` starts.
    pub fn offset_of(&self, index: usize) -> Option<u64> {
        (index < self.records.len()).then(|| {
            self.records
                .iter()
                .take(index)
                .map(|r| r.len() as u64)
                .sum()
        })
    }

    /// Maps an absolute offset to `(record_index, intra_offset)`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfRange`] if `offset >= total_length()`.
    pub fn locate(&self, offset: u64) -> CoreResult<(usize, usize)> {
        let out_of_range = || CoreError::OutOfRange {
            offset,
            total: self.total_len,
        };

        if offset >= self.total_len {
            return Err(out_of_range());
        }

        let mut start = 0u64;
        for (index, record) in self.records.iter().enumerate() {
            let end = start + record.len() as u64;
            if offset < end {
                return Ok((index, (offset - start) as usize));
            }
            start = end;
        }

        Err(out_of_range())
    }

    /// Maps `(record_index, intra_offset)` to an absolute offset.
    ///
    /// Sums the lengths of every record before `record_index`, then adds
    /// `intra_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAddress`] if `record_index >= len()` or
    /// `intra_offset` is not inside that record.
    pub fn locate_by_command(&self, record_index: usize, intra_offset: usize) -> CoreResult<u64> {
        let invalid = || CoreError::InvalidAddress {
            record_index,
            intra_offset,
            count: self.records.len(),
        };

        let record = self.records.get(record_index).ok_or_else(invalid)?;
        if intra_offset >= record.len() {
            return Err(invalid());
        }

        let preceding: u64 = self
            .records
            .iter()
            .take(record_index)
            .map(|r| r.len() as u64)
            .sum();
        Ok(preceding + intra_offset as u64)
    }

    /// Materializes the whole-log view from `offset` through the end.
    ///
    /// `read_from(0)` is the whole log; `read_from(total_length())` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OutOfRange`] if `offset > total_length()`, or
    /// [`CoreError::Allocation`] if the output buffer cannot be reserved.
    pub fn read_from(&self, offset: u64) -> CoreResult<Vec<u8>> {
        if offset == self.total_len {
            return Ok(Vec::new());
        }

        let (index, intra) = self.locate(offset)?;
        let len = (self.total_len - offset) as usize;

        let mut out = Vec::new();
        out.try_reserve_exact(len)
            .map_err(|_| CoreError::Allocation { requested: len })?;

        let mut records = self.records.iter().skip(index);
        if let Some(first) = records.next() {
            out.extend_from_slice(&first.as_bytes()[intra..]);
        }
        for record in records {
            out.extend_from_slice(record.as_bytes());
        }

        Ok(out)
    }

    /// Returns up to `max` bytes starting at `offset`, never crossing the
    /// end of the record that contains `offset`.
    ///
    /// An offset at or past the end yields an empty slice.
    pub fn read_chunk(&self, offset: u64, max: usize) -> &[u8] {
        match self.locate(offset) {
            Ok((index, intra)) => {
                let rest = &self.records[index].as_bytes()[intra..];
                &rest[..rest.len().min(max)]
            }
            Err(_) => &[],
        }
    }

    /// Takes a point-in-time copy of the retained records.
    ///
    /// Record bytes are shared, not copied, and later evictions do not
    /// affect the snapshot.
    pub fn snapshot_for_read(&self) -> Snapshot {
        Snapshot {
            records: self.records.iter().cloned().collect(),
            first: RecordHandle::new(self.evicted()),
            total_len: self.total_len,
        }
    }
}

/// A point-in-time, ordered view of a record ring.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: Vec<Record>,
    first: RecordHandle,
    total_len: u64,
}

impl Snapshot {
    /// Returns the number of records in the snapshot.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the handle of the oldest record in the snapshot.
    pub fn first_handle(&self) -> RecordHandle {
        self.first
    }

    /// Returns the whole-log length at the time of the snapshot.
    pub fn total_length(&self) -> u64 {
        self.total_len
    }

    /// Iterates the records, oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Iterates `(absolute_offset, record)` pairs, oldest first.
    pub fn with_offsets(&self) -> impl Iterator<Item = (u64, &Record)> + '_ {
        self.records.iter().scan(0u64, |offset, record| {
            let start = *offset;
            *offset += record.len() as u64;
            Some((start, record))
        })
    }

    /// Concatenates the snapshot into the whole-log bytes.
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len as usize);
        for record in &self.records {
            out.extend_from_slice(record.as_bytes());
        }
        out
    }
}

impl IntoIterator for Snapshot {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
