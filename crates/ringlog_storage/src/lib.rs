//! # ringlog Storage
//!
//! Durable media for the ringlog record journal.
//!
//! A ringlog server can mirror every committed record into an append-only
//! journal so that a response is never sent for data that is not on stable
//! storage. The backends in this crate are **opaque byte journals**: they
//! know nothing about records, terminators or the retention window. The
//! core crate owns all interpretation of the bytes.
//!
//! ## Design Principles
//!
//! - Backends only append, read back, flush, sync and truncate
//! - `sync` is the durability point; `append` alone promises nothing
//! - Must be `Send + Sync` so a journal can live behind the log lock
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and journal-less deployments
//! - [`FileBackend`] - A single file, optionally locked exclusively
//!
//! ## Example
//!
//! ```rust
//! use ringlog_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut journal = InMemoryBackend::new();
//! journal.append(b"first\n").unwrap();
//! journal.append(b"second\n").unwrap();
//! assert_eq!(journal.read_all().unwrap(), b"first\nsecond\n");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
