//! Stored records and the handles that name them.

use crate::error::{CoreError, CoreResult};
use bytes::Bytes;
use std::fmt;

/// Byte that ends every record.
pub const TERMINATOR: u8 = b'\n';

/// One stored, newline-terminated byte sequence.
///
/// The terminator is part of the stored bytes. Records are immutable once
/// built; cloning one only bumps a reference count, so point-in-time
/// snapshots of the ring stay cheap.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Record {
    data: Bytes,
}

impl Record {
    /// Creates a record from owned bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Returns the stored bytes, terminator included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the record, returning its bytes.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Returns the record length including the terminator.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the record holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the last byte is the terminator.
    pub fn is_terminated(&self) -> bool {
        self.data.last() == Some(&TERMINATOR)
    }

    /// Checks that the record is exactly one line: terminated, with no
    /// other terminator before the end.
    ///
    /// Only such records survive a journal round trip unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedRecord`] otherwise.
    pub fn validate(&self) -> CoreResult<()> {
        let malformed = |message: &str| CoreError::MalformedRecord {
            len: self.len(),
            message: message.to_string(),
        };

        let Some((last, body)) = self.data.split_last() else {
            return Err(malformed("record is empty"));
        };
        if *last != TERMINATOR {
            return Err(malformed("missing terminator"));
        }
        if body.contains(&TERMINATOR) {
            return Err(malformed("terminator before end of record"));
        }
        Ok(())
    }
}

/// A byte stream cut at its last terminator.
///
/// Everything up to and including the last terminator is a run of complete
/// records; whatever follows is a torn tail that no reader should see.
///
/// # Example
///
/// ```rust
/// use ringlog_core::RecordFrames;
///
/// let frames = RecordFrames::split(b"a\nbb\npart");
/// assert_eq!(frames.records().count(), 2);
/// assert_eq!(frames.torn(), b"part");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFrames<'a> {
    complete: &'a [u8],
    torn: &'a [u8],
}

impl<'a> RecordFrames<'a> {
    /// Splits `data` into complete records and the torn tail.
    pub fn split(data: &'a [u8]) -> Self {
        let end = data
            .iter()
            .rposition(|b| *b == TERMINATOR)
            .map_or(0, |pos| pos + 1);
        let (complete, torn) = data.split_at(end);
        Self { complete, torn }
    }

    /// Returns the bytes of all complete records.
    pub fn complete(&self) -> &'a [u8] {
        self.complete
    }

    /// Returns the bytes after the last terminator.
    pub fn torn(&self) -> &'a [u8] {
        self.torn
    }

    /// Iterates the complete records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = Record> + 'a {
        self.complete
            .split_inclusive(|b| *b == TERMINATOR)
            .map(|line| Record::new(Bytes::copy_from_slice(line)))
    }
}

impl From<&'static str> for Record {
    fn from(s: &'static str) -> Self {
        Self::new(Bytes::from_static(s.as_bytes()))
    }
}

impl From<Vec<u8>> for Record {
    fn from(v: Vec<u8>) -> Self {
        Self::new(v)
    }
}

impl AsRef<[u8]> for Record {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Record")
            .field(&String::from_utf8_lossy(&self.data))
            .finish()
    }
}

/// Names an appended record by its global append sequence.
///
/// Sequences start at zero for an empty log and increase by one per append;
/// they are never reused. Resolve a handle to its current logical index with
/// [`crate::RecordStore::index_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordHandle(u64);

impl RecordHandle {
    /// Creates a handle from a sequence number.
    #[must_use]
    pub const fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    /// Returns the append sequence number.
    #[must_use]
    pub const fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_length_includes_terminator() {
        let record = Record::from("abc\n");
        assert_eq!(record.len(), 4);
        assert!(record.is_terminated());
        assert!(!Record::from("abc").is_terminated());
    }

    #[test]
    fn validate_accepts_single_lines_only() {
        assert!(Record::from("abc\n").validate().is_ok());
        assert!(Record::from("\n").validate().is_ok());

        for bad in ["", "abc", "ab\ncd\n"] {
            assert!(matches!(
                Record::from(bad).validate(),
                Err(CoreError::MalformedRecord { .. })
            ));
        }
    }

    #[test]
    fn frames_split_at_last_terminator() {
        let frames = RecordFrames::split(b"a\n\nbb\ntail");
        let records: Vec<_> = frames.records().collect();
        assert_eq!(
            records,
            vec![Record::from("a\n"), Record::from("\n"), Record::from("bb\n")]
        );
        assert_eq!(frames.complete(), b"a\n\nbb\n");
        assert_eq!(frames.torn(), b"tail");

        let only_torn = RecordFrames::split(b"no newline");
        assert_eq!(only_torn.records().count(), 0);
        assert_eq!(only_torn.torn(), b"no newline");

        let empty = RecordFrames::split(b"");
        assert!(empty.complete().is_empty() && empty.torn().is_empty());
    }

    #[test]
    fn clone_shares_bytes() {
        let record = Record::from(b"shared\n".to_vec());
        let copy = record.clone();
        assert_eq!(record.as_bytes().as_ptr(), copy.as_bytes().as_ptr());
    }

    #[test]
    fn debug_is_readable() {
        assert_eq!(format!("{:?}", Record::from("hi\n")), "Record(\"hi\\n\")");
    }
}
