//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records, chunked streams
//! and addresses that maintain the line-protocol invariants.

use proptest::prelude::*;
use ringlog_core::{Record, SeekTo, SEEKTO_PREFIX, TERMINATOR};

/// Strategy for record payloads without a terminator.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>().prop_filter("no terminator", |b| *b != TERMINATOR), 0..64)
        .prop_filter("must not look like a command", |p| !p.starts_with(SEEKTO_PREFIX))
}

/// Strategy for complete records.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    payload_strategy().prop_map(|mut payload| {
        payload.push(TERMINATOR);
        Record::new(payload)
    })
}

/// Strategy for a sequence of records.
pub fn records_strategy(max: usize) -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(record_strategy(), 0..max)
}

/// Strategy for a byte stream of records together with chunk sizes to cut
/// it into.
pub fn chunked_stream_strategy() -> impl Strategy<Value = (Vec<Record>, Vec<usize>)> {
    (
        prop::collection::vec(record_strategy(), 1..16),
        prop::collection::vec(1usize..32, 1..32),
    )
}

/// Cuts `stream` into chunks, cycling through `sizes`.
pub fn split_into_chunks<'a>(stream: &'a [u8], sizes: &[usize]) -> Vec<&'a [u8]> {
    let mut chunks = Vec::new();
    let mut rest = stream;
    let mut sizes = sizes.iter().copied().filter(|n| *n > 0).cycle();

    while !rest.is_empty() {
        let n = sizes.next().unwrap_or(rest.len()).min(rest.len());
        let (chunk, tail) = rest.split_at(n);
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}

/// Strategy for seek addresses, valid or not.
pub fn seek_strategy(max_index: usize, max_offset: usize) -> impl Strategy<Value = SeekTo> {
    (0..=max_index, 0..=max_offset).prop_map(|(i, o)| SeekTo::new(i, o))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
