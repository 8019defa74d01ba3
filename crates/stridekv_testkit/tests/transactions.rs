//! Transaction behavior through the public batch API.

use stridekv_core::{ErrorKind, Key, Options, TransactionState, DEFAULT_COLLECTION};
use stridekv_testkit::prelude::*;

const C: stridekv_core::CollectionId = DEFAULT_COLLECTION;

#[test]
fn staged_writes_are_private_until_commit() {
    let db = TestDatabase::memory();
    let mut txn = db.begin(0, Options::NONE).unwrap();
    try_write(&db, Some(&mut txn), C, &[(1, Some(b"staged"))]).unwrap();

    assert_eq!(read_values(&db, C, &[1]), vec![None]);
    assert_eq!(
        try_read(&db, Some(&mut txn), C, &[1], Options::NONE).unwrap(),
        vec![Some(b"staged".to_vec())]
    );

    txn.commit(Options::NONE).unwrap();
    assert_eq!(txn.state(), TransactionState::Committed);
    assert_eq!(read_values(&db, C, &[1]), vec![Some(b"staged".to_vec())]);
}

#[test]
fn staged_deletes_hide_keys_from_scans() {
    let db = TestDatabase::memory();
    put_all(&db, C, &[(1, b"a"), (2, b"b"), (3, b"c")]);

    let mut txn = db.begin(0, Options::NONE).unwrap();
    try_write(&db, Some(&mut txn), C, &[(2, None), (5, Some(b"e"))]).unwrap();
    assert_eq!(try_scan(&db, Some(&mut txn), C, Key::MIN, 10).unwrap(), vec![1, 3, 5]);
    assert_eq!(scan_keys(&db, C, Key::MIN, 10), vec![1, 2, 3]);
}

#[test]
fn stale_tracked_read_aborts_commit() {
    let db = TestDatabase::memory();
    put_all(&db, C, &[(1, b"v1")]);

    let mut txn = db.begin(0, Options::NONE).unwrap();
    try_read(&db, Some(&mut txn), C, &[1], Options::TRACK_READS).unwrap();
    try_write(&db, Some(&mut txn), C, &[(2, Some(b"derived"))]).unwrap();

    put_all(&db, C, &[(1, b"v2")]);

    let err = txn.commit(Options::NONE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.is_retryable());
    assert_eq!(txn.state(), TransactionState::Aborted);
    let conflict = txn.conflict().unwrap();
    assert_eq!(conflict.key, 1);
    assert!(conflict.current > conflict.observed);

    // Nothing from the aborted transaction reached the store.
    assert_eq!(read_values(&db, C, &[2]), vec![None]);
}

#[test]
fn untracked_reads_do_not_conflict() {
    let db = TestDatabase::memory();
    put_all(&db, C, &[(1, b"v1")]);

    let mut txn = db.begin(0, Options::NONE).unwrap();
    try_read(&db, Some(&mut txn), C, &[1], Options::NONE).unwrap();
    try_write(&db, Some(&mut txn), C, &[(2, Some(b"x"))]).unwrap();
    put_all(&db, C, &[(1, b"v2")]);

    txn.commit(Options::NONE).unwrap();
    assert_eq!(read_values(&db, C, &[2]), vec![Some(b"x".to_vec())]);
}

#[test]
fn snapshot_ignores_later_commits() {
    let db = TestDatabase::memory();
    put_all(&db, C, &[(1, b"old"), (2, b"old")]);

    let mut txn = db.begin(0, Options::SNAPSHOT).unwrap();
    assert!(txn.snapshot().is_some());
    put_all(&db, C, &[(1, b"new"), (3, b"new")]);
    delete_all(&db, C, &[2]);

    assert_eq!(
        try_read(&db, Some(&mut txn), C, &[1, 2, 3], Options::NONE).unwrap(),
        vec![Some(b"old".to_vec()), Some(b"old".to_vec()), None]
    );
    assert_eq!(try_scan(&db, Some(&mut txn), C, Key::MIN, 10).unwrap(), vec![1, 2]);
    assert_eq!(scan_keys(&db, C, Key::MIN, 10), vec![1, 3]);
}

#[test]
fn reset_reuses_a_finished_transaction() {
    let db = TestDatabase::memory();
    let mut txn = db.begin(7, Options::NONE).unwrap();
    assert_eq!(txn.generation(), 7);
    try_write(&db, Some(&mut txn), C, &[(1, Some(b"a"))]).unwrap();
    txn.commit(Options::NONE).unwrap();

    let err = txn.commit(Options::NONE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    txn.reset(0, Options::NONE).unwrap();
    assert!(txn.is_active());
    assert_eq!(txn.write_count(), 0);
    assert_ne!(txn.generation(), 7);
}

#[test]
fn closure_transaction_commits_on_success() {
    let db = TestDatabase::memory();
    db.transaction(Options::NONE, |txn| {
        try_write(&db, Some(txn), C, &[(10, Some(b"ten"))])
    })
    .unwrap();
    assert_eq!(read_values(&db, C, &[10]), vec![Some(b"ten".to_vec())]);
}

#[test]
fn closed_database_rejects_transactions() {
    let db = TestDatabase::memory();
    let mut txn = db.begin(0, Options::NONE).unwrap();
    db.close().unwrap();

    assert_eq!(txn.commit(Options::NONE).unwrap_err().kind(), ErrorKind::Closed);
    assert_eq!(db.begin(0, Options::NONE).unwrap_err().kind(), ErrorKind::Closed);
}

#[test]
fn transactions_are_tied_to_their_database() {
    let first = TestDatabase::memory();
    let second = TestDatabase::memory();
    let mut txn = first.begin(0, Options::NONE).unwrap();
    assert!(first.owns(&txn));
    assert!(!second.owns(&txn));

    let err = try_write(&second, Some(&mut txn), C, &[(1, Some(b"x"))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn concurrent_increments_lose_no_updates() {
    let db = TestDatabase::memory();
    let config = StressConfig {
        operations: 100,
        threads: 8,
        ..StressConfig::small()
    };
    let result = stress_concurrent_increments(&db, 0, &config);
    assert_eq!(result.failed_ops, 0);
    assert_eq!(read_counter(&db, 0), 800);
}
