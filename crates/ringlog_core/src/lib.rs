//! # ringlog Core
//!
//! A fixed-depth history of newline-terminated records.
//!
//! The pieces, leaves first:
//!
//! - [`RecordStore`] - ring of at most `capacity` records with oldest-first
//!   eviction and absolute/relative offset addressing
//! - [`WriteAssembler`] - turns arbitrarily fragmented writes into records
//! - [`ReadMaterializer`] - renders the whole log or its tail from an address
//! - [`RecordLog`] - the store behind a single lock, optionally mirrored into
//!   a durable journal
//! - [`LogDevice`] - file-like read/write/seek access to a shared log
//!
//! ## Example
//!
//! ```rust
//! use ringlog_core::{LogConfig, RecordLog, Record, SeekTo};
//!
//! let log = RecordLog::in_memory(LogConfig::new().capacity(2)).unwrap();
//! log.append(Record::from("a\n")).unwrap();
//! log.append(Record::from("bb\n")).unwrap();
//! log.append(Record::from("ccc\n")).unwrap();
//!
//! assert_eq!(log.read_all().unwrap(), b"bb\nccc\n");
//! assert_eq!(log.read_from_command(SeekTo::new(0, 1)).unwrap(), b"b\nccc\n");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod assembler;
mod command;
mod config;
mod device;
mod error;
mod log;
mod reader;
mod record;
mod store;

pub use assembler::{AssemblerOutcome, WriteAssembler};
pub use command::{Inbound, SeekTo, SEEKTO_PREFIX};
pub use config::{LogConfig, DEFAULT_CAPACITY, DEFAULT_MAX_RECORD_LEN, DEFAULT_SCRATCH_INCREMENT};
pub use device::{DeviceFile, LogDevice};
pub use error::{CoreError, CoreResult, ErrorCategory};
pub use log::{LogStats, RecordLog, RecoveryReport};
pub use reader::{ReadMaterializer, ReadRequest};
pub use record::{Record, RecordFrames, RecordHandle, TERMINATOR};
pub use store::{RecordStore, Snapshot};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
