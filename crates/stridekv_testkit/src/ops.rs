//! Owned-result wrappers around the batch API.
//!
//! Tests mostly want `Vec`s back rather than arena views. These helpers
//! allocate a fresh arena per call and panic on engine errors, except for
//! the `try_` variants.

use stridekv_core::{
    Arena, CollectionId, CoreResult, Database, Estimate, Key, Options, ReadRequest, ScanRequest,
    SizeRequest, Strided, Transaction, WriteRequest,
};

/// Writes `keys[i] = values[i]` in `collection`; `None` deletes.
pub fn try_write(
    db: &Database,
    txn: Option<&mut Transaction>,
    collection: CollectionId,
    entries: &[(Key, Option<&[u8]>)],
) -> CoreResult<()> {
    let keys: Vec<Key> = entries.iter().map(|(k, _)| *k).collect();
    let values: Vec<Option<&[u8]>> = entries.iter().map(|(_, v)| *v).collect();
    let request = WriteRequest::new(keys.len(), Strided::slice(&keys))
        .in_collections(Strided::repeat(collection))
        .with_values(stridekv_core::ValueView::new(Strided::slice(&values)));
    db.write(txn, &request, Options::NONE)
}

/// Puts every pair in one head batch.
pub fn put_all(db: &Database, collection: CollectionId, pairs: &[(Key, &[u8])]) {
    let entries: Vec<(Key, Option<&[u8]>)> = pairs.iter().map(|(k, v)| (*k, Some(*v))).collect();
    try_write(db, None, collection, &entries).expect("write failed");
}

/// Deletes every key in one head batch.
pub fn delete_all(db: &Database, collection: CollectionId, keys: &[Key]) {
    let request = WriteRequest::deletes(keys).in_collections(Strided::repeat(collection));
    db.write(None, &request, Options::NONE).expect("delete failed");
}

/// Reads values of `keys`.
pub fn try_read(
    db: &Database,
    txn: Option<&mut Transaction>,
    collection: CollectionId,
    keys: &[Key],
    options: Options,
) -> CoreResult<Vec<Option<Vec<u8>>>> {
    let mut arena = Arena::new();
    let request = ReadRequest::from_keys(keys).in_collections(Strided::repeat(collection));
    let out = db.read(txn, &request, options, &mut arena)?;
    Ok(out.values().map(|v| v.map(<[u8]>::to_vec)).collect())
}

/// Reads values of `keys` at the head.
pub fn read_values(db: &Database, collection: CollectionId, keys: &[Key]) -> Vec<Option<Vec<u8>>> {
    try_read(db, None, collection, keys, Options::NONE).expect("read failed")
}

/// Scans up to `limit` keys from `min_key`.
pub fn try_scan(
    db: &Database,
    txn: Option<&mut Transaction>,
    collection: CollectionId,
    min_key: Key,
    limit: u32,
) -> CoreResult<Vec<Key>> {
    let mut arena = Arena::new();
    let request = ScanRequest::single(min_key, limit).in_collections(Strided::repeat(collection));
    let out = db.scan(txn, &request, Options::NONE, &mut arena)?;
    Ok(out.keys(0).to_vec())
}

/// Scans up to `limit` keys from `min_key` at the head.
pub fn scan_keys(db: &Database, collection: CollectionId, min_key: Key, limit: u32) -> Vec<Key> {
    try_scan(db, None, collection, min_key, limit).expect("scan failed")
}

/// Estimates `[min_key, max_key)` at the head.
pub fn estimate(db: &Database, collection: CollectionId, min_key: Key, max_key: Key) -> Estimate {
    let mut arena = Arena::new();
    let request = SizeRequest::single(min_key, max_key).in_collections(Strided::repeat(collection));
    db.size(None, &request, Options::NONE, &mut arena)
        .expect("size failed")
        .get(0)
        .expect("one estimate per task")
}

#[cfg(test)]
mod tests {
    use super::*;
    use stridekv_core::DEFAULT_COLLECTION;

    #[test]
    fn helpers_round_trip() {
        let db = Database::open_in_memory().unwrap();
        put_all(&db, DEFAULT_COLLECTION, &[(1, b"a"), (2, b"")]);
        assert_eq!(
            read_values(&db, DEFAULT_COLLECTION, &[1, 2, 3]),
            vec![Some(b"a".to_vec()), Some(Vec::new()), None]
        );
        delete_all(&db, DEFAULT_COLLECTION, &[1]);
        assert_eq!(scan_keys(&db, DEFAULT_COLLECTION, Key::MIN, 10), vec![2]);
        let e = estimate(&db, DEFAULT_COLLECTION, 0, 10);
        assert!(e.cardinality.contains(1));
    }
}
