//! Journaled databases across restarts.

use stridekv_core::{Config, Database, ErrorKind, Key, Options, DEFAULT_COLLECTION};
use stridekv_testkit::prelude::*;

#[test]
fn named_collections_survive_reopen() {
    let db = TestDatabase::journal();
    let users = db.collection("users").unwrap();
    put_all(&db, users, &[(1, b"ann"), (2, b"bob")]);
    put_all(&db, DEFAULT_COLLECTION, &[(1, b"root")]);

    let db = db.reopen();
    assert_eq!(db.find_collection("users").unwrap(), Some(users));
    assert_eq!(scan_keys(&db, users, Key::MIN, 10), vec![1, 2]);
    assert_eq!(
        read_values(&db, DEFAULT_COLLECTION, &[1]),
        vec![Some(b"root".to_vec())]
    );
}

#[test]
fn removed_collection_stays_removed() {
    let db = TestDatabase::journal();
    let temp = db.collection("temp").unwrap();
    put_all(&db, temp, &[(1, b"x")]);
    db.remove_collection("temp").unwrap();

    let db = db.reopen();
    assert_eq!(db.find_collection("temp").unwrap(), None);
    assert!(db.collections().unwrap().is_empty());
}

#[test]
fn committed_transaction_survives_reopen() {
    let db = TestDatabase::journal();
    let mut txn = db.begin(0, Options::NONE).unwrap();
    try_write(&db, Some(&mut txn), DEFAULT_COLLECTION, &[(5, Some(b"five")), (6, Some(b""))]).unwrap();
    txn.commit(Options::FLUSH).unwrap();

    let mut open = db.begin(0, Options::NONE).unwrap();
    try_write(&db, Some(&mut open), DEFAULT_COLLECTION, &[(7, Some(b"lost"))]).unwrap();
    drop(open);

    let db = db.reopen();
    assert_eq!(
        read_values(&db, DEFAULT_COLLECTION, &[5, 6, 7]),
        vec![Some(b"five".to_vec()), Some(Vec::new()), None]
    );
}

#[test]
fn compaction_keeps_latest_values() {
    let db = TestDatabase::journal();
    for round in 0..10u8 {
        put_all(&db, DEFAULT_COLLECTION, &[(1, &[round])]);
    }
    let response: serde_json::Value = serde_json::from_str(&db.control("compact").unwrap()).unwrap();
    assert_eq!(response["versions_removed"], 9);

    let db = db.reopen();
    assert_eq!(read_values(&db, DEFAULT_COLLECTION, &[1]), vec![Some(vec![9])]);
}

#[test]
fn reset_command_is_durable() {
    let db = TestDatabase::journal();
    let a = db.collection("a").unwrap();
    put_all(&db, a, &[(1, b"x")]);
    put_all(&db, DEFAULT_COLLECTION, &[(1, b"y")]);
    db.control("reset").unwrap();

    let db = db.reopen();
    assert!(db.collections().unwrap().is_empty());
    assert_eq!(read_values(&db, DEFAULT_COLLECTION, &[1]), vec![None]);
}

#[test]
fn second_handle_on_same_directory_is_refused() {
    with_journal_db(|_db, path| {
        let err = Database::open_with_config(Config::journal(path)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    });
}

#[test]
fn json_configuration_opens_journal() {
    let dir = tempfile::tempdir().unwrap();
    let config = serde_json::json!({
        "backend": "journal",
        "path": dir.path().join("db"),
        "sync_on_commit": true,
    });
    {
        let db = Database::open(&config.to_string()).unwrap();
        put_all(&db, DEFAULT_COLLECTION, &[(3, b"three")]);
        db.close().unwrap();
    }
    let db = Database::open(&config.to_string()).unwrap();
    assert_eq!(
        read_values(&db, DEFAULT_COLLECTION, &[3]),
        vec![Some(b"three".to_vec())]
    );
}
