//! Database lifecycle, collections and administrative commands.

use crate::error::{guard, FfiError, SkvError};
use crate::raw;
use crate::types::{SkvArena, SkvCollection, SkvDatabase};
use std::ffi::{c_char, CString};
use std::ptr;
use stridekv_core::Database;
use tracing::warn;

/// Opens a database.
///
/// `config` is a JSON object, or null/empty for an in-memory database.
///
/// # Safety
///
/// - `config` must be null or a valid NUL-terminated string
/// - `db` must be valid for writes
/// - `error` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn skv_open(
    config: *const c_char,
    db: *mut *mut SkvDatabase,
    error: *mut SkvError,
) {
    // SAFETY: pointers are validated inside; see the contract above.
    unsafe {
        guard(error, || {
            if db.is_null() {
                return Err(FfiError::NullPointer("db"));
            }
            let config = raw::text(config, "config")?;
            let handle = Box::new(SkvDatabase::new(Database::open(config)?));
            *db = Box::into_raw(handle);
            Ok(())
        });
    }
}

/// Closes and releases a database. Null is a no-op.
///
/// Transactions and arenas of the database stay valid to free, but every
/// further call with them fails.
///
/// # Safety
///
/// `db` must be null or a handle from [`skv_open`] that has not been freed.
#[no_mangle]
pub unsafe extern "C" fn skv_free(db: *mut SkvDatabase) {
    if db.is_null() {
        return;
    }
    // SAFETY: produced by `Box::into_raw` in `skv_open`.
    let handle = unsafe { Box::from_raw(db) };
    if let Err(err) = handle.db.close() {
        warn!(%err, "failed to flush database on free");
    }
}

/// Opens or creates a named collection and exports its id.
///
/// A null or empty `name` yields the default collection. `config` is
/// accepted for compatibility and ignored.
///
/// # Safety
///
/// - `db` must be a live database handle
/// - `name` and `config` must be null or valid NUL-terminated strings
/// - `id` must be valid for writes
/// - `error` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn skv_collection_open(
    db: *const SkvDatabase,
    name: *const c_char,
    _config: *const c_char,
    id: *mut SkvCollection,
    error: *mut SkvError,
) {
    // SAFETY: see the contract above.
    unsafe {
        guard(error, || {
            let db = raw::database(db)?;
            if id.is_null() {
                return Err(FfiError::NullPointer("id"));
            }
            let name = raw::text(name, "name")?;
            *id = db.db.collection(name)?.as_u64();
            Ok(())
        });
    }
}

/// Lists the named collections.
///
/// Names are exported as `count` consecutive NUL-terminated strings in the
/// arena, valid until the arena's next use.
///
/// # Safety
///
/// - `db` must be a live database handle
/// - `count` and `names` must be null or valid for writes
/// - `arena` must point to null or a live arena
/// - `error` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn skv_collection_list(
    db: *const SkvDatabase,
    count: *mut usize,
    names: *mut *const c_char,
    arena: *mut *mut SkvArena,
    error: *mut SkvError,
) {
    // SAFETY: see the contract above.
    unsafe {
        guard(error, || {
            let db = raw::database(db)?;
            let arena = raw::arena(&db.db, arena)?;
            let listed = db.db.collections()?;
            arena.names.clear();
            for name in &listed {
                arena.names.extend_from_slice(name.as_bytes());
                arena.names.push(0);
            }
            raw::export(count, listed.len());
            raw::export(names, raw::head(&arena.names).cast::<c_char>());
            Ok(())
        });
    }
}

/// Removes a named collection and its contents.
///
/// A null or empty `name` clears the default collection instead.
///
/// # Safety
///
/// - `db` must be a live database handle
/// - `name` must be null or a valid NUL-terminated string
/// - `error` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn skv_collection_remove(
    db: *const SkvDatabase,
    name: *const c_char,
    error: *mut SkvError,
) {
    // SAFETY: see the contract above.
    unsafe {
        guard(error, || {
            let db = raw::database(db)?;
            db.db.remove_collection(raw::text(name, "name")?)?;
            Ok(())
        });
    }
}

/// Runs an administrative command (`clear`, `reset`, `compact`, `info`,
/// `usage`).
///
/// The JSON response is owned by the database and stays valid until the
/// next `skv_control` call on it or until it is freed.
///
/// # Safety
///
/// - `db` must be a live database handle
/// - `request` must be a valid NUL-terminated string
/// - `response` must be null or valid for writes
/// - `error` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn skv_control(
    db: *const SkvDatabase,
    request: *const c_char,
    response: *mut *const c_char,
    error: *mut SkvError,
) {
    // SAFETY: see the contract above.
    unsafe {
        raw::export(response, ptr::null());
        guard(error, || {
            let db = raw::database(db)?;
            if request.is_null() {
                return Err(FfiError::NullPointer("request"));
            }
            let text = db.db.control(raw::text(request, "request")?)?;
            let text = CString::new(text).map_err(|_| FfiError::InvalidUtf8("response"))?;
            let mut slot = db.response.lock();
            raw::export(response, text.as_ptr());
            *slot = Some(text);
            Ok(())
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::arena::skv_arena_free;
    use crate::error::tests::take;
    use std::ffi::CStr;

    pub(crate) fn open_memory() -> *mut SkvDatabase {
        let mut db = ptr::null_mut();
        let mut error: SkvError = ptr::null();
        unsafe { skv_open(ptr::null(), &mut db, &mut error) };
        assert!(error.is_null());
        assert!(!db.is_null());
        db
    }

    fn open_collection(db: *const SkvDatabase, name: &CStr) -> SkvCollection {
        let mut id = u64::MAX;
        let mut error: SkvError = ptr::null();
        unsafe { skv_collection_open(db, name.as_ptr(), ptr::null(), &mut id, &mut error) };
        assert_eq!(take(&mut error), None);
        id
    }

    fn list(db: *const SkvDatabase, arena: &mut *mut SkvArena) -> Vec<String> {
        let mut count = 0usize;
        let mut names: *const c_char = ptr::null();
        let mut error: SkvError = ptr::null();
        unsafe { skv_collection_list(db, &mut count, &mut names, arena, &mut error) };
        assert_eq!(take(&mut error), None);
        let mut out = Vec::new();
        let mut cursor = names;
        for _ in 0..count {
            let name = unsafe { CStr::from_ptr(cursor) };
            out.push(name.to_str().unwrap().to_string());
            cursor = unsafe { cursor.add(name.to_bytes().len() + 1) };
        }
        out
    }

    #[test]
    fn open_rejects_bad_config() {
        let mut db = ptr::null_mut();
        let mut error: SkvError = ptr::null();
        unsafe { skv_open(c"{\"backend\": \"tape\"}".as_ptr(), &mut db, &mut error) };
        assert!(take(&mut error).is_some());
        assert!(db.is_null());
    }

    #[test]
    fn open_journal_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = serde_json::json!({
            "backend": "journal",
            "path": dir.path().join("db"),
        })
        .to_string();
        let config = CString::new(config).unwrap();

        let mut db = ptr::null_mut();
        let mut error: SkvError = ptr::null();
        unsafe { skv_open(config.as_ptr(), &mut db, &mut error) };
        assert_eq!(take(&mut error), None);
        unsafe { skv_free(db) };
    }

    #[test]
    fn collections_round_trip() {
        let db = open_memory();
        let mut arena = ptr::null_mut();
        assert!(list(db, &mut arena).is_empty());

        assert_eq!(open_collection(db, c""), 0);
        let users = open_collection(db, c"users");
        assert_ne!(users, 0);
        assert_eq!(open_collection(db, c"users"), users);
        open_collection(db, c"accounts");
        assert_eq!(list(db, &mut arena), vec!["accounts", "users"]);

        let mut error: SkvError = ptr::null();
        unsafe { skv_collection_remove(db, c"users".as_ptr(), &mut error) };
        assert_eq!(take(&mut error), None);
        assert_eq!(list(db, &mut arena), vec!["accounts"]);

        unsafe { skv_collection_remove(db, c"users".as_ptr(), &mut error) };
        assert!(take(&mut error).unwrap().contains("users"));

        unsafe { skv_collection_remove(db, ptr::null(), &mut error) };
        assert_eq!(take(&mut error), None);

        unsafe {
            skv_arena_free(arena);
            skv_free(db);
        }
    }

    #[test]
    fn collection_config_is_ignored() {
        let db = open_memory();
        let users = open_collection(db, c"users");
        let mut id = u64::MAX;
        let mut error: SkvError = ptr::null();
        unsafe {
            skv_collection_open(db, c"users".as_ptr(), c"not json".as_ptr(), &mut id, &mut error);
        }
        assert_eq!(take(&mut error), None);
        assert_eq!(id, users);
        unsafe { skv_free(db) };
    }

    #[test]
    fn control_response_is_json() {
        let db = open_memory();
        let mut response: *const c_char = ptr::null();
        let mut error: SkvError = ptr::null();
        unsafe { skv_control(db, c"info".as_ptr(), &mut response, &mut error) };
        assert_eq!(take(&mut error), None);
        let text = unsafe { CStr::from_ptr(response) }.to_str().unwrap();
        let info: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(info["backend"], "memory");

        unsafe { skv_control(db, c"explode".as_ptr(), &mut response, &mut error) };
        assert!(take(&mut error).is_some());
        assert!(response.is_null());

        unsafe { skv_control(db, ptr::null(), &mut response, &mut error) };
        assert_eq!(take(&mut error).unwrap(), "null pointer passed as request");
        unsafe { skv_free(db) };
    }

    #[test]
    fn null_handles_are_rejected() {
        let mut id = 0;
        let mut error: SkvError = ptr::null();
        unsafe { skv_collection_open(ptr::null(), c"x".as_ptr(), ptr::null(), &mut id, &mut error) };
        assert_eq!(take(&mut error).unwrap(), "null pointer passed as database");
        unsafe { skv_free(ptr::null_mut()) };
    }
}
