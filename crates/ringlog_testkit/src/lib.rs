//! # Ringlog Testkit
//!
//! Test utilities for ringlog.
//!
//! This crate provides:
//! - Fixtures for in-memory and file-backed logs
//! - Property-based test generators using proptest
//! - Concurrent append stress helpers
//! - A line-protocol client and a throwaway server for network tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ringlog_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn round_trip() {
//!     let server = TestServer::start(4).await;
//!     let mut client = LineClient::connect(server.addr()).await.unwrap();
//!     assert_eq!(client.exchange(b"hi\n", 3).await.unwrap(), b"hi\n");
//!     server.stop().await;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use client::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
