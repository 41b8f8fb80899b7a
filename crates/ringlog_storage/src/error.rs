//! Error types for journal storage.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while touching a journal backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the journal.
    #[error("read beyond end of journal: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current journal size.
        size: u64,
    },

    /// Attempted to grow the journal through `truncate`.
    #[error("cannot truncate journal to {requested} bytes, current size is {size}")]
    TruncateBeyondEnd {
        /// The requested size.
        requested: u64,
        /// The current journal size.
        size: u64,
    },

    /// Another process holds the journal lock.
    #[error("journal {0:?} is locked by another process")]
    Locked(PathBuf),
}
