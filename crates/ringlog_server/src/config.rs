//! Server configuration.

use crate::error::{ServerError, ServerResult};
use ringlog_core::LogConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Address the server listens on by default.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9000";

/// Data file used by [`ServerConfig::default`].
pub const DEFAULT_DATA_PATH: &str = "/var/tmp/aesdsocketdata";

/// Configuration for the log server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Journal file; `None` keeps the log in memory only.
    pub data_path: Option<PathBuf>,
    /// Whether the data file is deleted after shutdown.
    pub remove_data_on_shutdown: bool,
    /// Bytes requested from the socket per receive.
    pub recv_chunk_size: usize,
    /// Maximum concurrent sessions.
    pub max_sessions: usize,
    /// Accept errors in a row after which the listener is considered dead.
    pub max_consecutive_accept_failures: u32,
    /// Record log settings.
    pub log: LogConfig,
}

impl ServerConfig {
    /// Creates a configuration bound to `bind_addr` with an in-memory log.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            data_path: None,
            remove_data_on_shutdown: true,
            recv_chunk_size: 1024,
            max_sessions: 1000,
            max_consecutive_accept_failures: 64,
            log: LogConfig::default(),
        }
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the journal file.
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    /// Keeps the log in memory only.
    pub fn without_data_file(mut self) -> Self {
        self.data_path = None;
        self
    }

    /// Sets whether the data file is deleted after shutdown.
    pub fn with_remove_data_on_shutdown(mut self, remove: bool) -> Self {
        self.remove_data_on_shutdown = remove;
        self
    }

    /// Sets the receive chunk size.
    pub fn with_recv_chunk_size(mut self, bytes: usize) -> Self {
        self.recv_chunk_size = bytes;
        self
    }

    /// Sets the maximum concurrent sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Sets how many listener failures in a row stop the server.
    pub fn with_max_consecutive_accept_failures(mut self, max: u32) -> Self {
        self.max_consecutive_accept_failures = max;
        self
    }

    /// Sets the record log configuration.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Sets the ring capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.log.capacity = capacity;
        self
    }

    /// Checks that every setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] for a zero chunk size, session limit or
    /// failure limit, and a core error for an invalid log configuration.
    pub fn validate(&self) -> ServerResult<()> {
        if self.recv_chunk_size == 0 {
            return Err(ServerError::Config(
                "recv_chunk_size must be at least 1".into(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(ServerError::Config("max_sessions must be at least 1".into()));
        }
        if self.max_consecutive_accept_failures == 0 {
            return Err(ServerError::Config(
                "max_consecutive_accept_failures must be at least 1".into(),
            ));
        }
        self.log.validate()?;
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], 9000))).with_data_path(DEFAULT_DATA_PATH)
    }
}
