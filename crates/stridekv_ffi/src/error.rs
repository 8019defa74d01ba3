//! Error reporting across the C boundary.
//!
//! Every entry point takes a trailing `SkvError*` out-parameter. It is set
//! to null on entry and, on failure, to a heap-allocated message that the
//! caller releases with [`skv_error_free`].

use std::any::Any;
use std::ffi::{c_char, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use stridekv_core::CoreError;
use thiserror::Error;
use tracing::debug;

/// An owned, NUL-terminated error message; null means success.
pub type SkvError = *const c_char;

/// Failures raised by the adapter itself or by the engine.
#[derive(Debug, Error)]
pub(crate) enum FfiError {
    /// A required pointer was null.
    #[error("null pointer passed as {0}")]
    NullPointer(&'static str),

    /// A string argument was not UTF-8.
    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    /// The engine rejected the call.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The call panicked.
    #[error("internal panic: {0}")]
    Panic(String),
}

pub(crate) type FfiResult<T> = Result<T, FfiError>;

/// Runs `body`, reporting its failure through `error`.
///
/// Panics are caught and reported like any other failure.
///
/// # Safety
///
/// `error` must be null or valid for writes.
pub(crate) unsafe fn guard(error: *mut SkvError, body: impl FnOnce() -> FfiResult<()>) {
    if !error.is_null() {
        // SAFETY: non-null and writable per the caller contract.
        unsafe { *error = ptr::null() };
    }
    let outcome = catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|payload| Err(FfiError::Panic(panic_message(payload.as_ref()))));
    if let Err(err) = outcome {
        debug!(%err, "ffi call failed");
        if !error.is_null() {
            // SAFETY: as above.
            unsafe { *error = into_message(&err) };
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn into_message(err: &FfiError) -> SkvError {
    let text = err.to_string().replace('\0', " ");
    CString::new(text).unwrap_or_default().into_raw()
}

/// Releases an error message. Null is a no-op.
///
/// # Safety
///
/// `error` must be null or a message produced by this library that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn skv_error_free(error: SkvError) {
    if !error.is_null() {
        // SAFETY: produced by `CString::into_raw` in `into_message`.
        drop(unsafe { CString::from_raw(error.cast_mut()) });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::ffi::CStr;

    /// Takes ownership of a reported message, if any.
    pub(crate) fn take(error: &mut SkvError) -> Option<String> {
        if error.is_null() {
            return None;
        }
        let text = unsafe { CStr::from_ptr(*error) }.to_string_lossy().into_owned();
        unsafe { skv_error_free(*error) };
        *error = ptr::null();
        Some(text)
    }

    #[test]
    fn success_clears_previous_pointer() {
        let mut error: SkvError = c"stale".as_ptr();
        unsafe { guard(&mut error, || Ok(())) };
        assert!(error.is_null());
    }

    #[test]
    fn failure_sets_message() {
        let mut error: SkvError = ptr::null();
        unsafe { guard(&mut error, || Err(FfiError::NullPointer("keys"))) };
        assert_eq!(take(&mut error).unwrap(), "null pointer passed as keys");
    }

    #[test]
    fn engine_errors_keep_their_text() {
        let mut error: SkvError = ptr::null();
        unsafe {
            guard(&mut error, || {
                Err(CoreError::invalid_argument("bad stride").into())
            });
        };
        assert!(take(&mut error).unwrap().contains("bad stride"));
    }

    #[test]
    fn panics_are_reported() {
        let mut error: SkvError = ptr::null();
        unsafe { guard(&mut error, || panic!("boom")) };
        assert_eq!(take(&mut error).unwrap(), "internal panic: boom");
    }

    #[test]
    fn null_error_slot_is_tolerated() {
        unsafe { guard(ptr::null_mut(), || Err(FfiError::InvalidUtf8("name"))) };
        unsafe { skv_error_free(ptr::null()) };
    }
}
