//! Error types for the record log.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse classification of failures.
///
/// Callers use the category to decide how far a failure reaches: an
/// addressing or protocol failure ends one client's command cycle, an
/// allocation failure ends the affected session, and none of them touch
/// other clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection-level failure.
    Transport,
    /// Resource exhaustion or a configured size limit.
    Allocation,
    /// Client asked for a position outside the retained window.
    Addressing,
    /// Malformed control command.
    Protocol,
    /// The durable journal failed.
    Storage,
    /// Invalid configuration.
    Config,
}

/// Errors that can occur in record log operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Journal backend error.
    #[error("storage error: {0}")]
    Storage(#[from] ringlog_storage::StorageError),

    /// Absolute offset is not inside the whole-log view.
    #[error("offset {offset} out of range, log holds {total} bytes")]
    OutOfRange {
        /// The requested absolute offset.
        offset: u64,
        /// Current whole-log length.
        total: u64,
    },

    /// `(record_index, intra_offset)` does not name a retained byte.
    #[error("invalid address ({record_index}, {intra_offset}) with {count} records retained")]
    InvalidAddress {
        /// Logical record index requested.
        record_index: usize,
        /// Offset inside that record.
        intra_offset: usize,
        /// Records currently retained.
        count: usize,
    },

    /// Control command payload could not be parsed.
    #[error("malformed command: {message}")]
    Protocol {
        /// What was wrong with the payload.
        message: String,
    },

    /// A record handed to the log is not exactly one terminated line.
    #[error("malformed record of {len} bytes: {message}")]
    MalformedRecord {
        /// Length of the rejected record.
        len: usize,
        /// What was wrong with it.
        message: String,
    },

    /// A pending record grew past the configured limit.
    #[error("record of {len} bytes exceeds limit of {limit} bytes")]
    RecordTooLarge {
        /// Bytes the record would hold.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Memory could not be reserved.
    #[error("failed to allocate {requested} bytes")]
    Allocation {
        /// Bytes requested from the allocator.
        requested: usize,
    },

    /// A seek would move before the start of the log.
    #[error("invalid seek: {message}")]
    InvalidSeek {
        /// Description of the rejected seek.
        message: String,
    },

    /// Configuration rejected.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Which setting was rejected.
        message: String,
    },
}

impl CoreError {
    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an invalid seek error.
    pub fn invalid_seek(message: impl Into<String>) -> Self {
        Self::InvalidSeek {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Storage(_) => ErrorCategory::Storage,
            CoreError::OutOfRange { .. }
            | CoreError::InvalidAddress { .. }
            | CoreError::InvalidSeek { .. } => ErrorCategory::Addressing,
            CoreError::Protocol { .. } | CoreError::MalformedRecord { .. } => {
                ErrorCategory::Protocol
            }
            CoreError::RecordTooLarge { .. } | CoreError::Allocation { .. } => {
                ErrorCategory::Allocation
            }
            CoreError::InvalidConfig { .. } => ErrorCategory::Config,
        }
    }

    /// Returns true if the client caused this error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Addressing | ErrorCategory::Protocol
        )
    }
}

impl From<CoreError> for io::Error {
    fn from(err: CoreError) -> Self {
        let kind = match &err {
            CoreError::Storage(ringlog_storage::StorageError::Io(e)) => e.kind(),
            CoreError::Storage(_) => io::ErrorKind::Other,
            CoreError::Allocation { .. } | CoreError::RecordTooLarge { .. } => {
                io::ErrorKind::OutOfMemory
            }
            CoreError::OutOfRange { .. }
            | CoreError::InvalidAddress { .. }
            | CoreError::Protocol { .. }
            | CoreError::MalformedRecord { .. }
            | CoreError::InvalidSeek { .. }
            | CoreError::InvalidConfig { .. } => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        let addressing = CoreError::InvalidAddress {
            record_index: 5,
            intra_offset: 0,
            count: 2,
        };
        assert_eq!(addressing.category(), ErrorCategory::Addressing);
        assert!(addressing.is_client_error());

        assert_eq!(
            CoreError::protocol("bad").category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            CoreError::Allocation { requested: 1 }.category(),
            ErrorCategory::Allocation
        );
        assert!(!CoreError::RecordTooLarge { len: 2, limit: 1 }.is_client_error());

        let malformed = CoreError::MalformedRecord {
            len: 3,
            message: "missing terminator".into(),
        };
        assert_eq!(malformed.category(), ErrorCategory::Protocol);
        let err: io::Error = malformed.into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn io_conversion_keeps_kind() {
        let err: io::Error = CoreError::OutOfRange {
            offset: 9,
            total: 3,
        }
        .into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(err.to_string().contains("9"));
    }
}
