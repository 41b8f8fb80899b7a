//! Error types for the log server.

use ringlog_core::{CoreError, ErrorCategory};
use ringlog_storage::StorageError;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the log server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Socket send or receive failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Record log error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Data file could not be opened.
    #[error("data file error: {0}")]
    Storage(#[from] StorageError),

    /// Listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The listener kept failing to accept connections.
    #[error("listener failed {failures} times in a row: {source}")]
    Listener {
        /// Consecutive failures observed.
        failures: u32,
        /// The last accept error.
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A blocking journal append could not be joined.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServerError {
    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ServerError::Transport(_) | ServerError::Bind { .. } | ServerError::Listener { .. } => {
                ErrorCategory::Transport
            }
            ServerError::Core(err) => err.category(),
            ServerError::Storage(_) | ServerError::Task(_) => ErrorCategory::Storage,
            ServerError::Config(_) => ErrorCategory::Config,
        }
    }

    /// Returns true if the client caused this error.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServerError::Core(err) if err.is_client_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn error_classification() {
        let err = ServerError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert!(!err.is_client_error());

        let err = ServerError::from(CoreError::protocol("bad"));
        assert_eq!(err.category(), ErrorCategory::Protocol);
        assert!(err.is_client_error());

        let err = ServerError::from(CoreError::Allocation { requested: 8 });
        assert_eq!(err.category(), ErrorCategory::Allocation);
    }

    #[test]
    fn error_display() {
        let err = ServerError::Listener {
            failures: 3,
            source: io::Error::new(io::ErrorKind::Other, "boom"),
        };
        let msg = err.to_string();
        assert!(msg.contains("3"));
        assert!(msg.contains("boom"));
    }
}
