//! Tests for WAL Reader
//!
//! These tests verify:
//! - Sequential reading of entries
//! - Torn tails end the log quietly
//! - Corrupted frames surface as errors

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use ledgerkv::config::WalSyncStrategy;
use ledgerkv::wal::{Operation, WalEntry, WalReader, WalWriter, HEADER_SIZE};
use ledgerkv::LedgerError;
use tempfile::TempDir;

fn setup_wal_with_entries(count: usize) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("ledger.wal");

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(Operation::Put {
                key: format!("key{}", i).into_bytes(),
                value: format!("value{}", i).into_bytes(),
            })
            .unwrap();
    }

    (temp_dir, wal_path)
}

#[test]
fn test_read_empty_wal() {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("empty.wal");
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert!(!reader.has_torn_tail());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_read_entries_in_order() {
    let (_temp, wal_path) = setup_wal_with_entries(10);

    let entries: Vec<WalEntry> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(entries.len(), 10);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.lsn, i as u64 + 1);
        assert_eq!(entry.operation.key(), format!("key{}", i).as_bytes());
    }
}

#[test]
fn test_position_tracks_file_length() {
    let (_temp, wal_path) = setup_wal_with_entries(3);
    let file_len = std::fs::metadata(&wal_path).unwrap().len();

    let mut reader = WalReader::open(&wal_path).unwrap();
    while reader.next_entry().unwrap().is_some() {}

    assert_eq!(reader.position(), file_len);
}

#[test]
fn test_partial_header_is_torn_tail() {
    let (_temp, wal_path) = setup_wal_with_entries(2);
    {
        let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
        file.write_all(&[0u8; HEADER_SIZE / 2]).unwrap();
    }

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.has_torn_tail());
}

#[test]
fn test_partial_body_is_torn_tail() {
    let (_temp, wal_path) = setup_wal_with_entries(1);
    let frame = WalEntry::new(
        2,
        Operation::Put {
            key: b"late".to_vec(),
            value: b"never finished".to_vec(),
        },
    )
    .serialize()
    .unwrap();
    {
        let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
        file.write_all(&frame[..frame.len() - 3]).unwrap();
    }

    let entries: Vec<_> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_corrupted_frame_is_error() {
    let (_temp, wal_path) = setup_wal_with_entries(2);
    {
        let mut bytes = std::fs::read(&wal_path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&wal_path, bytes).unwrap();
    }

    let mut iter = WalReader::open(&wal_path).unwrap().entries();
    assert!(iter.next().unwrap().is_ok());
    assert!(matches!(iter.next(), Some(Err(LedgerError::WalCorruption(_)))));
    assert!(iter.next().is_none());
}
