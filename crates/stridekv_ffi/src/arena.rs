//! Arena release.

use crate::types::SkvArena;

/// Releases an arena and every output exported through it. Null is a
/// no-op.
///
/// # Safety
///
/// `arena` must be null or an arena allocated by a batch call that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn skv_arena_free(arena: *mut SkvArena) {
    if !arena.is_null() {
        // SAFETY: produced by `Box::into_raw` when the slot was filled.
        drop(unsafe { Box::from_raw(arena) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw;
    use stridekv_core::Database;

    #[test]
    fn lazily_allocated_once() {
        let db = Database::open_in_memory().unwrap();
        let mut slot: *mut SkvArena = std::ptr::null_mut();
        let first = unsafe { raw::arena(&db, &mut slot) }.unwrap() as *mut SkvArena;
        let second = unsafe { raw::arena(&db, &mut slot) }.unwrap() as *mut SkvArena;
        assert_eq!(first, second);
        assert_eq!(first, slot);
        unsafe { skv_arena_free(slot) };
    }

    #[test]
    fn free_null_is_noop() {
        unsafe { skv_arena_free(std::ptr::null_mut()) };
    }
}
