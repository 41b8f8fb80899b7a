//! Stress helpers for the record log.
//!
//! These helpers hammer a shared log from several threads and check that
//! no append is lost, duplicated or torn.

use ringlog_core::{Record, RecordLog};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Appends per writer thread.
    pub appends_per_thread: usize,
    /// Number of writer threads.
    pub threads: usize,
    /// Number of reader threads checking consistency while writers run.
    pub readers: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            appends_per_thread: 1_000,
            threads: 4,
            readers: 2,
        }
    }
}

/// Record written by `thread` as its `seq`-th append.
pub fn stress_record(thread: usize, seq: usize) -> Record {
    Record::new(format!("t{thread:02}-r{seq:06}\n").into_bytes())
}

/// Appends from several threads while readers check that every whole-log
/// read splits into well-formed records.
///
/// Failed appends and malformed reads both count as failures.
pub fn stress_concurrent_appends(log: &Arc<RecordLog>, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..config.readers)
        .map(|_| {
            let log = Arc::clone(log);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut torn = 0usize;
                while !done.load(Ordering::Acquire) {
                    match log.read_all() {
                        Ok(bytes) if is_well_formed(&bytes) => {}
                        _ => torn += 1,
                    }
                }
                torn
            })
        })
        .collect();

    let writers: Vec<_> = (0..config.threads)
        .map(|t| {
            let log = Arc::clone(log);
            let n = config.appends_per_thread;
            thread::spawn(move || {
                let mut ok = 0usize;
                for i in 0..n {
                    if log.append(stress_record(t, i)).is_ok() {
                        ok += 1;
                    }
                }
                (ok, n - ok)
            })
        })
        .collect();

    let mut successful = 0;
    let mut failed = 0;
    for writer in writers {
        let (ok, err) = writer.join().unwrap_or((0, 0));
        successful += ok;
        failed += err;
    }

    done.store(true, Ordering::Release);
    for reader in readers {
        failed += reader.join().unwrap_or(1);
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Checks that the retained window holds no duplicate and that each
/// writer's records appear in the order it appended them.
pub fn verify_retained_order(log: &RecordLog) -> bool {
    let snapshot = log.snapshot();
    let mut seen = HashSet::new();
    let mut last_seq: HashMap<String, usize> = HashMap::new();

    for record in snapshot.iter() {
        let text = String::from_utf8_lossy(record.as_bytes()).into_owned();
        if !seen.insert(text.clone()) {
            return false;
        }
        let Some((thread, seq)) = text.trim_end().split_once("-r") else {
            return false;
        };
        let Ok(seq) = seq.parse::<usize>() else {
            return false;
        };
        if let Some(prev) = last_seq.insert(thread.to_string(), seq) {
            if prev >= seq {
                return false;
            }
        }
    }
    true
}

fn is_well_formed(bytes: &[u8]) -> bool {
    bytes.is_empty()
        || (bytes.ends_with(b"\n")
            && bytes
                .split(|b| *b == b'\n')
                .filter(|line| !line.is_empty())
                .all(|line| line.len() == "t00-r000000".len() && line.starts_with(b"t")))
}
