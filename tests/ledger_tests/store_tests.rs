//! Tests for the LedgerStore operations
//!
//! These tests verify:
//! - Point reads and existence checks
//! - Update/delete preconditions and their history effects
//! - Range scans (bounds, ordering, snapshot reads)
//! - History scans (ordering, deletions, cursor release)
//! - Read-modify-write under the write lock
//! - Concurrent readers and writers

use std::sync::{Arc, Barrier};
use std::thread;

use ledgerkv::contract::sample_accreditations;
use ledgerkv::ledger::MAX_KEY_SIZE;
use ledgerkv::protocol::Command;
use ledgerkv::{Accreditation, Contract, LedgerError, LedgerStore, TxId};

fn keys(store: &LedgerStore, start: &[u8], end: &[u8]) -> Vec<Vec<u8>> {
    store.range_scan(start, end).map(|(k, _)| k).collect()
}

// =============================================================================
// Point Operation Tests
// =============================================================================

#[test]
fn test_never_written_key() {
    let store = LedgerStore::in_memory();

    assert!(!store.exists(b"acc1").unwrap());
    let err = store.get(b"acc1").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "The asset acc1 does not exist");
}

#[test]
fn test_put_then_get() {
    let store = LedgerStore::in_memory();

    store.put(b"acc1", b"v1").unwrap();

    assert_eq!(store.get(b"acc1").unwrap(), b"v1");
    assert!(store.exists(b"acc1").unwrap());
}

#[test]
fn test_put_overwrites() {
    let store = LedgerStore::in_memory();

    store.put(b"acc1", b"v1").unwrap();
    store.put(b"acc1", b"v2").unwrap();

    assert_eq!(store.get(b"acc1").unwrap(), b"v2");
    assert_eq!(store.history_len(b"acc1"), 2);
    assert_eq!(store.live_count(), 1);
}

#[test]
fn test_empty_value_is_live() {
    let store = LedgerStore::in_memory();

    store.put(b"blank", b"").unwrap();

    assert!(store.exists(b"blank").unwrap());
    assert_eq!(store.get(b"blank").unwrap(), Vec::<u8>::new());
}

#[test]
fn test_tx_ids_increase() {
    let store = LedgerStore::in_memory();
    assert_eq!(store.last_tx(), None);

    let first = store.put(b"a", b"1").unwrap();
    let second = store.put(b"b", b"2").unwrap();
    let third = store.delete(b"a").unwrap();

    assert!(first < second && second < third);
    assert_eq!(store.last_tx(), Some(third));
    assert_eq!(TxId(1).to_string(), "0000000000000001");
}

#[test]
fn test_invalid_keys_rejected() {
    let store = LedgerStore::in_memory();
    let too_long = vec![b'k'; MAX_KEY_SIZE + 1];

    assert!(matches!(store.put(b"", b"v"), Err(LedgerError::InvalidKey(_))));
    assert!(matches!(store.get(b""), Err(LedgerError::InvalidKey(_))));
    assert!(matches!(store.exists(b""), Err(LedgerError::InvalidKey(_))));
    assert!(matches!(store.update(b"", b"v"), Err(LedgerError::InvalidKey(_))));
    assert!(matches!(store.delete(b""), Err(LedgerError::InvalidKey(_))));
    assert!(matches!(store.history_of(b""), Err(LedgerError::InvalidKey(_))));
    assert!(matches!(store.put(&too_long, b"v"), Err(LedgerError::InvalidKey(_))));

    assert_eq!(store.key_count(), 0);
    assert_eq!(store.last_tx(), None);
}

#[test]
fn test_max_size_key_accepted() {
    let store = LedgerStore::in_memory();
    let key = vec![b'k'; MAX_KEY_SIZE];

    store.put(&key, b"v").unwrap();
    assert_eq!(store.get(&key).unwrap(), b"v");
}

// =============================================================================
// Update / Delete Precondition Tests
// =============================================================================

#[test]
fn test_update_requires_live_key() {
    let store = LedgerStore::in_memory();

    let err = store.update(b"acc9", b"v").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.history_len(b"acc9"), 0);
    assert!(!store.exists(b"acc9").unwrap());
}

#[test]
fn test_delete_never_written_key() {
    let store = LedgerStore::in_memory();

    let err = store.delete(b"acc2").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.history_of(b"acc2").unwrap().count(), 0);
    assert_eq!(store.last_tx(), None);
}

#[test]
fn test_delete_then_read() {
    let store = LedgerStore::in_memory();

    for i in 0..3 {
        store.put(b"acc1", format!("v{}", i).as_bytes()).unwrap();
    }
    store.delete(b"acc1").unwrap();

    assert!(store.get(b"acc1").unwrap_err().is_not_found());
    assert!(!store.exists(b"acc1").unwrap());
    assert_eq!(store.history_len(b"acc1"), 4);
    assert_eq!(store.live_count(), 0);
    assert_eq!(store.key_count(), 1);
}

#[test]
fn test_update_and_delete_after_delete_fail() {
    let store = LedgerStore::in_memory();

    store.put(b"acc1", b"v").unwrap();
    store.delete(b"acc1").unwrap();

    assert!(store.update(b"acc1", b"v2").unwrap_err().is_not_found());
    assert!(store.delete(b"acc1").unwrap_err().is_not_found());
    assert_eq!(store.history_len(b"acc1"), 2);
}

#[test]
fn test_put_revives_deleted_key() {
    let store = LedgerStore::in_memory();

    store.put(b"acc1", b"v1").unwrap();
    store.delete(b"acc1").unwrap();
    store.put(b"acc1", b"v2").unwrap();

    assert_eq!(store.get(b"acc1").unwrap(), b"v2");
    assert_eq!(store.live_count(), 1);

    let history: Vec<_> = store.history_of(b"acc1").unwrap().collect();
    assert_eq!(history.len(), 3);
    assert!(!history[0].is_delete());
    assert!(history[1].is_delete());
    assert_eq!(history[2].value.as_deref(), Some(&b"v2"[..]));
}

#[test]
fn test_update_scenario_on_accreditation() {
    let store = LedgerStore::in_memory();
    let mut acc = Accreditation::new("acc1", "A", "Jane", "Applied", "X");

    store.put(b"acc1", &acc.to_bytes().unwrap()).unwrap();
    acc.status = "Closed".to_string();
    store.update(b"acc1", &acc.to_bytes().unwrap()).unwrap();

    let read = Accreditation::from_bytes(&store.get(b"acc1").unwrap()).unwrap();
    assert_eq!(read.status, "Closed");
    assert_eq!(read.clinic, "A");
    assert_eq!(store.history_of(b"acc1").unwrap().count(), 2);
}

// =============================================================================
// Modify Tests
// =============================================================================

#[test]
fn test_modify_rewrites_from_current_value() {
    let store = LedgerStore::in_memory();
    store.put(b"counter", b"1").unwrap();

    store
        .modify(b"counter", |current| {
            let mut next = current.to_vec();
            next.push(b'1');
            Ok(next)
        })
        .unwrap();

    assert_eq!(store.get(b"counter").unwrap(), b"11");
    assert_eq!(store.history_len(b"counter"), 2);
}

#[test]
fn test_modify_requires_live_key() {
    let store = LedgerStore::in_memory();
    store.put(b"gone", b"v").unwrap();
    store.delete(b"gone").unwrap();

    let err = store.modify(b"gone", |v| Ok(v.to_vec())).unwrap_err();
    assert!(err.is_not_found());
    assert!(store.modify(b"never", |v| Ok(v.to_vec())).unwrap_err().is_not_found());
    assert_eq!(store.history_len(b"gone"), 2);
}

#[test]
fn test_modify_closure_error_writes_nothing() {
    let store = LedgerStore::in_memory();
    store.put(b"acc1", b"v").unwrap();

    let err = store
        .modify(b"acc1", |_| Err(LedgerError::InvalidArgument("rejected".to_string())))
        .unwrap_err();

    assert!(matches!(err, LedgerError::InvalidArgument(_)));
    assert_eq!(store.history_len(b"acc1"), 1);
    assert_eq!(store.last_tx(), Some(TxId(1)));
}

#[test]
fn test_status_change_races_full_update() {
    for _ in 0..100 {
        let store = Arc::new(LedgerStore::in_memory());
        Contract::new(&store)
            .create_asset("acc1", "Clinic A", "Jane Doe", "Surgery")
            .unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let status = {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                Contract::new(&store).update_status("acc1", "Closed").unwrap();
            })
        };
        let full = {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let replacement =
                    Accreditation::new("acc1", "Clinic B", "Jane Doe", "Applied", "Surgery");
                Contract::new(&store).update_asset(&replacement).unwrap();
            })
        };
        status.join().unwrap();
        full.join().unwrap();

        // Either serial order keeps Clinic B; only a lost update brings back A
        let acc = Contract::new(&store).read_accreditation("acc1").unwrap();
        assert_eq!(acc.clinic, "Clinic B");
        assert_eq!(store.history_len(b"acc1"), 3);
    }
}

// =============================================================================
// Range Scan Tests
// =============================================================================

#[test]
fn test_range_scan_full_matches_live_keys() {
    let store = LedgerStore::in_memory();
    for key in ["c", "a", "b", "d"] {
        store.put(key.as_bytes(), b"v").unwrap();
    }
    store.delete(b"b").unwrap();

    let scanned = keys(&store, b"", b"");
    assert_eq!(scanned, vec![b"a".to_vec(), b"c".to_vec(), b"d".to_vec()]);
    assert_eq!(scanned.len(), store.live_count());
}

#[test]
fn test_range_scan_is_half_open() {
    let store = LedgerStore::in_memory();
    for key in ["acc1", "acc2", "acc3", "acc4"] {
        store.put(key.as_bytes(), b"v").unwrap();
    }

    assert_eq!(
        keys(&store, b"acc2", b"acc4"),
        vec![b"acc2".to_vec(), b"acc3".to_vec()]
    );
    assert_eq!(keys(&store, b"acc3", b""), vec![b"acc3".to_vec(), b"acc4".to_vec()]);
    assert_eq!(keys(&store, b"", b"acc2"), vec![b"acc1".to_vec()]);
}

#[test]
fn test_range_scan_empty_and_inverted() {
    let store = LedgerStore::in_memory();
    store.put(b"m", b"v").unwrap();

    assert!(keys(&store, b"m", b"m").is_empty());
    assert!(keys(&store, b"z", b"a").is_empty());
    assert!(keys(&LedgerStore::in_memory(), b"", b"").is_empty());
}

#[test]
fn test_range_scan_byte_order() {
    let store = LedgerStore::in_memory();
    for key in [&b"B"[..], &b"a"[..], &b"\x00"[..], &b"\xff"[..], &b"A"[..]] {
        store.put(key, b"v").unwrap();
    }

    assert_eq!(
        keys(&store, b"", b""),
        vec![
            b"\x00".to_vec(),
            b"A".to_vec(),
            b"B".to_vec(),
            b"a".to_vec(),
            b"\xff".to_vec()
        ]
    );
}

#[test]
fn test_range_scan_is_a_snapshot() {
    let store = LedgerStore::in_memory();
    store.put(b"a", b"1").unwrap();
    store.put(b"c", b"3").unwrap();

    let mut scan = store.range_scan(b"", b"");
    assert_eq!(scan.next(), Some((b"a".to_vec(), b"1".to_vec())));

    // Writes after the scan opened stay invisible to it
    store.put(b"b", b"2").unwrap();
    store.put(b"c", b"changed").unwrap();
    store.put(b"d", b"4").unwrap();

    assert_eq!(scan.next(), Some((b"c".to_vec(), b"3".to_vec())));
    assert_eq!(scan.next(), None);

    // A new scan sees them
    assert_eq!(keys(&store, b"", b"").len(), 4);
}

#[test]
fn test_range_scan_snapshot_sees_deleted_key() {
    let store = LedgerStore::in_memory();
    store.put(b"a", b"1").unwrap();
    store.put(b"b", b"2").unwrap();

    let scan = store.range_scan(b"", b"");
    store.delete(b"b").unwrap();

    assert_eq!(scan.count(), 2);
    assert_eq!(keys(&store, b"", b""), vec![b"a".to_vec()]);
}

#[test]
fn test_range_scan_is_restartable() {
    let store = LedgerStore::in_memory();
    store.init_seed([("k1", "v1"), ("k2", "v2")]).unwrap();

    let first: Vec<_> = store.range_scan(b"", b"").collect();
    let second: Vec<_> = store.range_scan(b"", b"").collect();
    assert_eq!(first, second);
}

// =============================================================================
// History Tests
// =============================================================================

#[test]
fn test_history_oldest_first() {
    let store = LedgerStore::in_memory();
    let tx1 = store.put(b"acc1", b"v1").unwrap();
    let tx2 = store.update(b"acc1", b"v2").unwrap();
    let tx3 = store.delete(b"acc1").unwrap();

    let history: Vec<_> = store.history_of(b"acc1").unwrap().collect();

    assert_eq!(
        history.iter().map(|h| h.tx_id).collect::<Vec<_>>(),
        vec![tx1, tx2, tx3]
    );
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(history[0].value.as_deref(), Some(&b"v1"[..]));
    assert_eq!(history[1].value.as_deref(), Some(&b"v2"[..]));
    assert!(history[2].is_delete());
}

#[test]
fn test_history_of_unknown_key_is_empty() {
    let store = LedgerStore::in_memory();
    assert_eq!(store.history_of(b"nobody").unwrap().count(), 0);
}

#[test]
fn test_history_is_a_snapshot() {
    let store = LedgerStore::in_memory();
    store.put(b"acc1", b"v1").unwrap();

    let history = store.history_of(b"acc1").unwrap();
    store.put(b"acc1", b"v2").unwrap();

    assert_eq!(history.count(), 1);
    assert_eq!(store.history_of(b"acc1").unwrap().count(), 2);
}

#[test]
fn test_cursors_released_on_drop() {
    let store = LedgerStore::in_memory();
    store.init_seed([("a", "1"), ("b", "2"), ("c", "3")]).unwrap();

    {
        let mut scan = store.range_scan(b"", b"");
        let history = store.history_of(b"a").unwrap();
        assert_eq!(store.open_cursors(), 2);

        // Early termination
        scan.next();
        drop(history);
        assert_eq!(store.open_cursors(), 1);
    }
    assert_eq!(store.open_cursors(), 0);

    // Exhausted scans release too
    let _: Vec<_> = store.range_scan(b"", b"").collect();
    assert_eq!(store.open_cursors(), 0);
}

#[test]
fn test_scan_does_not_block_writer() {
    let store = LedgerStore::in_memory();
    store.put(b"a", b"1").unwrap();

    let mut scan = store.range_scan(b"", b"");
    let _ = scan.next();

    store.put(b"b", b"2").unwrap();
    store.delete(b"a").unwrap();
    assert_eq!(scan.next(), None);
}

// =============================================================================
// Seed Tests
// =============================================================================

#[test]
fn test_init_seed_twice_same_live_state() {
    let seed: Vec<(String, Vec<u8>)> = sample_accreditations()
        .into_iter()
        .map(|a| (a.id.clone(), a.to_bytes().unwrap()))
        .collect();

    let once = LedgerStore::in_memory();
    assert_eq!(once.init_seed(seed.clone()).unwrap(), 3);

    let twice = LedgerStore::in_memory();
    twice.init_seed(seed.clone()).unwrap();
    twice.init_seed(seed).unwrap();

    let once_records: Vec<_> = once.range_scan(b"", b"").collect();
    let twice_records: Vec<_> = twice.range_scan(b"", b"").collect();
    assert_eq!(once_records, twice_records);

    // History length differs
    assert_eq!(once.history_len(b"acc1"), 1);
    assert_eq!(twice.history_len(b"acc1"), 2);
}

#[test]
fn test_init_seed_stops_at_invalid_key() {
    let store = LedgerStore::in_memory();

    let result = store.init_seed([("ok", "v"), ("", "v"), ("never", "v")]);

    assert!(matches!(result, Err(LedgerError::InvalidKey(_))));
    assert!(store.exists(b"ok").unwrap());
    assert!(!store.exists(b"never").unwrap());
}

// =============================================================================
// Command Routing Tests
// =============================================================================

#[test]
fn test_execute_routes_commands() {
    let store = LedgerStore::in_memory();

    assert_eq!(store.execute(Command::Ping).unwrap(), Some(b"PONG".to_vec()));
    assert_eq!(
        store
            .execute(Command::Put {
                key: b"acc1".to_vec(),
                value: b"{\"ID\":\"acc1\"}".to_vec(),
            })
            .unwrap(),
        None
    );
    assert_eq!(
        store.execute(Command::Exists { key: b"acc1".to_vec() }).unwrap(),
        Some(b"true".to_vec())
    );

    let range = store
        .execute(Command::Range {
            start: Vec::new(),
            end: Vec::new(),
        })
        .unwrap()
        .unwrap();
    assert_eq!(
        String::from_utf8(range).unwrap(),
        r#"[{"Key":"acc1","Record":{"ID":"acc1"}}]"#
    );

    let err = store
        .execute(Command::Update {
            key: b"acc9".to_vec(),
            value: b"v".to_vec(),
        })
        .unwrap_err();
    assert!(err.is_not_found());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_distinct_keys() {
    let store = Arc::new(LedgerStore::in_memory());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("t{}-k{:03}", t, i);
                    store.put(key.as_bytes(), b"v").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.live_count(), 400);
    assert_eq!(store.last_tx(), Some(TxId(400)));
}

#[test]
fn test_concurrent_update_delete_same_key() {
    let store = Arc::new(LedgerStore::in_memory());
    store.put(b"shared", b"v0").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut written = 0usize;
                for i in 0..50 {
                    let result = if (t + i) % 5 == 0 {
                        store.delete(b"shared")
                    } else if i % 3 == 0 {
                        store.put(b"shared", b"revive")
                    } else {
                        store.update(b"shared", b"v")
                    };
                    match result {
                        Ok(_) => written += 1,
                        Err(e) => assert!(e.is_not_found()),
                    }
                }
                written
            })
        })
        .collect();
    let written: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    // Failed updates/deletes leave no history
    assert_eq!(store.history_len(b"shared"), written + 1);

    let history: Vec<_> = store.history_of(b"shared").unwrap().collect();
    assert_eq!(store.exists(b"shared").unwrap(), !history[history.len() - 1].is_delete());
    assert!(history.windows(2).all(|w| w[0].tx_id < w[1].tx_id));
}
