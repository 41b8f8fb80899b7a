//! # Ringlog Server
//!
//! Line-protocol TCP server in front of a shared [`ringlog_core::RecordLog`].
//!
//! This crate provides:
//! - A per-connection session state machine (assemble, commit or command,
//!   respond)
//! - A connection supervisor that accepts, registers and reaps sessions and
//!   drains them gracefully on shutdown
//! - [`LogServer`], which opens the optional data file and ties both together
//!
//! # Protocol
//!
//! Clients send newline-terminated records. Each plain record is committed
//! and answered with the whole retained log. A line starting with
//! [`ringlog_core::SEEKTO_PREFIX`] followed by `<record_index>,<intra_offset>`
//! is not stored; the answer is the log tail starting at that address. An
//! invalid address or malformed command closes the connection without a
//! response.
//!
//! ```rust,no_run
//! use ringlog_server::{LogServer, ServerConfig};
//!
//! # async fn run() -> ringlog_server::ServerResult<()> {
//! let config = ServerConfig::default().with_bind_addr("127.0.0.1:9000".parse().unwrap());
//! let server = LogServer::bind(config).await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod server;
mod session;
mod supervisor;

pub use config::{ServerConfig, DEFAULT_BIND_ADDR, DEFAULT_DATA_PATH};
pub use error::{ServerError, ServerResult};
pub use server::LogServer;
pub use session::{SessionCoordinator, SessionReport, SessionState, Termination};
pub use supervisor::{ConnectionSupervisor, SupervisorReport};
