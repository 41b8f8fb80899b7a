//! Dump command implementation.

use ringlog_core::{RecordFrames, RecordStore};
use ringlog_storage::{FileBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;

/// One retained record.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Logical index, 0 = oldest retained.
    pub index: usize,
    /// Position of the record in the data file, counting evicted ones.
    pub sequence: u64,
    /// Absolute offset in the whole-log view.
    pub offset: u64,
    /// Length in bytes, terminator included.
    pub length: usize,
    /// Record contents with invalid UTF-8 replaced.
    pub text: String,
}

/// Everything the dump command reports about a data file.
#[derive(Debug, Serialize)]
pub struct DumpReport {
    /// Ring capacity used for the view.
    pub capacity: usize,
    /// Complete records in the file.
    pub records_found: u64,
    /// Bytes after the last terminator.
    pub torn_bytes: usize,
    /// Length of the whole-log view.
    pub total_length: u64,
    /// Retained records, oldest first.
    pub records: Vec<RecordInfo>,
}

/// Runs the dump command.
pub fn run(path: &Path, capacity: usize, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("data file not found: {}", path.display()).into());
    }

    let backend = FileBackend::open(path)?;
    let report = load(&backend, capacity)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    Ok(())
}

/// Reads the data file into the ring view without modifying it.
pub fn load(
    backend: &dyn StorageBackend,
    capacity: usize,
) -> Result<DumpReport, Box<dyn std::error::Error>> {
    let data = backend.read_all()?;
    let mut store = RecordStore::new(capacity)?;
    let frames = RecordFrames::split(&data);
    let torn_bytes = frames.torn().len();

    for record in frames.records() {
        store.append(record);
    }

    let snapshot = store.snapshot_for_read();
    let first = snapshot.first_handle().sequence();
    let records = snapshot
        .with_offsets()
        .enumerate()
        .map(|(index, (offset, record))| RecordInfo {
            index,
            sequence: first + index as u64,
            offset,
            length: record.len(),
            text: String::from_utf8_lossy(record.as_bytes()).into_owned(),
        })
        .collect();

    Ok(DumpReport {
        capacity,
        records_found: store.appended(),
        torn_bytes,
        total_length: store.total_length(),
        records,
    })
}

fn print_text_output(report: &DumpReport) {
    println!(
        "Records ({} retained of {} found, capacity {})",
        report.records.len(),
        report.records_found,
        report.capacity
    );
    println!("================");
    println!();

    for record in &report.records {
        println!(
            "[{:3}] seq={:<6} offset={:<8} len={:<6} {}",
            record.index,
            record.sequence,
            record.offset,
            record.length,
            record.text.trim_end_matches('\n')
        );
    }

    if report.torn_bytes > 0 {
        println!();
        println!("{} bytes after the last terminator", report.torn_bytes);
    }
}
