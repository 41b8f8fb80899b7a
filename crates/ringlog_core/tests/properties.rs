//! Log, device and assembler behavior driven by the shared testkit.

use proptest::prelude::*;
use ringlog_core::{AssemblerOutcome, LogDevice, Record, SeekTo, WriteAssembler};
use ringlog_testkit::{
    chunked_stream_strategy, evicted_pair, records_strategy, seek_strategy, split_into_chunks,
    stress_concurrent_appends, stress_record, verify_retained_order, PropTestConfig, StressConfig,
    TestLog,
};
use std::io::Read;
use std::sync::Arc;

fn stream_of(records: &[Record]) -> Vec<u8> {
    records.iter().flat_map(|r| r.as_bytes().to_vec()).collect()
}

#[test]
fn device_seek_over_evicted_pair() {
    let fixture = evicted_pair();
    let device = LogDevice::new(Arc::clone(&fixture.log));
    let mut file = device.open();

    assert_eq!(file.seek_to(SeekTo::new(1, 2)).unwrap(), 5);
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    assert_eq!(out, b"c\n");

    assert!(file.seek_to(SeekTo::new(2, 0)).is_err());
}

#[test]
fn journaled_appends_under_contention() {
    let fixture = TestLog::file(32);
    let config = StressConfig {
        appends_per_thread: 25,
        threads: 4,
        readers: 1,
    };

    let result = stress_concurrent_appends(&fixture.log, &config);
    assert_eq!(result.failed_ops, 0);
    assert_eq!(result.successful_ops, 100);
    assert_eq!(fixture.len(), 32);
    assert!(verify_retained_order(&fixture));

    // Every append reached the journal, evicted ones included.
    let record_len = stress_record(0, 0).len() as u64;
    assert_eq!(fixture.stats().journal_bytes, Some(100 * record_len));
}

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn assembler_output_ignores_chunking((records, sizes) in chunked_stream_strategy()) {
        let stream = stream_of(&records);
        let mut assembler = WriteAssembler::with_limits(8, 64);
        let mut out = Vec::new();

        for chunk in split_into_chunks(&stream, &sizes) {
            let mut outcome = assembler.feed(chunk).unwrap();
            while let AssemblerOutcome::RecordReady(record) = outcome {
                out.push(record);
                outcome = assembler.poll();
            }
        }
        prop_assert_eq!(out, records);
        prop_assert!(assembler.is_empty());
    }

    #[test]
    fn device_writes_commit_each_record((records, sizes) in chunked_stream_strategy()) {
        let fixture = TestLog::memory(16);
        let device = LogDevice::new(Arc::clone(&fixture.log));
        let mut file = device.open();

        let stream = stream_of(&records);
        for chunk in split_into_chunks(&stream, &sizes) {
            prop_assert_eq!(file.write(chunk).unwrap(), chunk.len());
        }

        let stored: Vec<Record> = fixture.snapshot().iter().cloned().collect();
        prop_assert_eq!(stored, records);
        prop_assert_eq!(device.pending_len(), 0);
    }

    #[test]
    fn command_reads_match_absolute_reads(
        records in records_strategy(12),
        seek in seek_strategy(6, 40),
    ) {
        let fixture = TestLog::memory(4);
        for record in records {
            fixture.append(record).unwrap();
        }

        match fixture.locate_by_command(seek.record_index, seek.intra_offset) {
            Ok(offset) => prop_assert_eq!(
                fixture.read_from_command(seek).unwrap(),
                fixture.read_from(offset).unwrap()
            ),
            Err(_) => prop_assert!(fixture.read_from_command(seek).is_err()),
        }
    }
}
